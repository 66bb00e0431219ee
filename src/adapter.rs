//! The boundary to the rule engine and the other external collaborators.
//!
//! Everything here is implemented for the JavaScript runtime in [`crate::js`],
//! and can be implemented in Rust for tests or native engines.

use crate::{
	model::{ModelEvent, ModelEventKind},
	LocalBoxFuture, Result,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::rc::Rc;
use wasm_bindgen::JsValue;
use web_sys::{Element, File};

/// A value written into a model element.
#[derive(Debug, Clone)]
pub enum FieldValue {
	Json(Value),
	/// Selected files, for file inputs.
	Files(Vec<File>),
	/// Clears the value entirely (`undefined` on the JavaScript side).
	Unset,
}

impl From<Value> for FieldValue {
	fn from(value: Value) -> Self {
		Self::Json(value)
	}
}

impl From<String> for FieldValue {
	fn from(value: String) -> Self {
		Self::Json(Value::String(value))
	}
}

/// An action dispatched to a model element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
	Click,
}

impl Action {
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Click => "click",
		}
	}
}

/// One element of a live model, as returned by [`FormInstance::get_element`].
pub trait FieldHandle {
	fn id(&self) -> String;
	fn value(&self) -> Value;
	fn set_value(&self, value: FieldValue);
	fn focus(&self);
	fn dispatch(&self, action: Action);

	/// The element as handed to JavaScript subscribers. By default a plain `{ id, value }` snapshot.
	fn to_js(&self) -> JsValue {
		json!({ "id": self.id(), "value": self.value() })
			.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
			.unwrap_or(JsValue::UNDEFINED)
	}
}

pub type EventHandler = Box<dyn Fn(ModelEvent)>;

/// A restored, live form model.
pub trait FormInstance {
	/// Looks up a model element by id.
	///
	/// `None` is an expected outcome while DOM and model are briefly out of step.
	fn get_element(&self, id: &str) -> Option<Rc<dyn FieldHandle>>;

	/// Registers `handler` for the stream `kind` for the rest of the instance's lifetime.
	fn subscribe(&self, kind: ModelEventKind, handler: EventHandler);
}

/// Restores live form models from their definition.
pub trait ModelRuntime {
	/// # Errors
	///
	/// Iff the engine rejects the definition or data.
	fn restore_form_instance(&self, definition: &Value, data: Option<&Value>) -> Result<Rc<dyn FormInstance>>;
}

/// Supplies captcha tokens that must be present before a submit click reaches the model.
pub trait CaptchaProvider {
	/// The id of the model element that receives the token.
	fn field_id(&self) -> String;

	/// Resolves to a fresh token. Any timeout is up to the implementation.
	fn get_token(&self) -> LocalBoxFuture<'static, Result<String>>;
}

/// Renders model items (as `{ "items": [...] }`) into a container, for dynamically added repeatable instances.
pub trait RenderChildren {
	fn render(&self, items: &Value, container: &Element);
}

impl<F: Fn(&Value, &Element)> RenderChildren for F {
	fn render(&self, items: &Value, container: &Element) {
		self(items, container);
	}
}

/// Receives the outcome of a submission, which the bridge doesn't handle itself.
pub trait SubmitHandler {
	fn submit_success(&self, payload: &Value, form: &Element);
	fn submit_failure(&self, payload: &Value, form: &Element);

	/// Network-level errors. By default, these are treated like failures.
	fn submit_error(&self, payload: &Value, form: &Element) {
		self.submit_failure(payload, form);
	}
}

/// Loads externally supplied custom functions into the rule engine before the form is built.
pub trait FunctionRegistrar {
	/// # Errors
	///
	/// Iff loading the functions failed. The form is built without them in that case.
	fn register(&self, functions_path: Option<&str>, code_base_path: Option<&str>) -> LocalBoxFuture<'_, Result<()>>;
}

/// Builds the runtime form from its definition, with any prefill data merged in as `data`.
pub trait FormFactory {
	type Form;

	/// # Errors
	///
	/// Iff the form couldn't be built.
	fn create_form(&self, definition: Value) -> LocalBoxFuture<'_, Result<Self::Form>>;
}
