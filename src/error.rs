use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Failures that are reported to the caller rather than logged and skipped.
///
/// Projection and event capture never produce these; they tolerate missing nodes and model elements.
#[derive(Debug, Error)]
pub enum Error {
	#[error("JavaScript exception: {0}")]
	Js(String),

	#[error("failed to decode {what}: {source}")]
	Decode {
		what: &'static str,
		#[source]
		source: serde_wasm_bindgen::Error,
	},

	#[error("failed to encode {what}: {source}")]
	Encode {
		what: &'static str,
		#[source]
		source: serde_wasm_bindgen::Error,
	},

	#[error("invalid JSON: {0}")]
	Json(#[from] serde_json::Error),

	#[error("prefill request failed with HTTP status {0}")]
	PrefillStatus(u16),

	#[error("no global `window` available")]
	NoWindow,

	#[error("model restoration failed: {0}")]
	Restore(String),
}

impl Error {
	pub(crate) fn decode(what: &'static str) -> impl FnOnce(serde_wasm_bindgen::Error) -> Self {
		move |source| Self::Decode { what, source }
	}

	pub(crate) fn encode(what: &'static str) -> impl FnOnce(serde_wasm_bindgen::Error) -> Self {
		move |source| Self::Encode { what, source }
	}
}

/// The message of a thrown JavaScript value.
pub(crate) fn js_message(value: &JsValue) -> String {
	if let Some(error) = value.dyn_ref::<js_sys::Error>() {
		return error.message().into();
	}
	value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

impl From<JsValue> for Error {
	fn from(value: JsValue) -> Self {
		Self::Js(js_message(&value))
	}
}

impl From<Error> for JsValue {
	fn from(error: Error) -> Self {
		js_sys::Error::new(&error.to_string()).into()
	}
}
