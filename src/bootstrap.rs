//! Bringing a rendered form and its model together.

use crate::{
	adapter::{CaptchaProvider, FormFactory, FormInstance, FunctionRegistrar, ModelRuntime, RenderChildren, SubmitHandler},
	capture::EventCapture,
	config::Config,
	model::{ModelEvent, ModelEventKind},
	projector::ChangeProjector,
	registry::{SubscriptionCallback, SubscriptionRegistry},
	Error, Result,
};
use serde_json::Value;
use std::{
	cell::{Cell, RefCell},
	rc::Rc,
};
use tracing::{debug, info, instrument, trace, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Element, Response};

/// Owns everything that outlives a single model instance of one page:
/// configuration, the [`SubscriptionRegistry`], and the wiring of the current model.
///
/// Each [`wire`](`Bridge::wire`) starts a new generation. Model events of earlier generations are discarded
/// and their DOM listeners removed, so overlapping restorations can't project stale state.
pub struct Bridge {
	config: Config,
	runtime: Rc<dyn ModelRuntime>,
	registry: SubscriptionRegistry,
	submit_handler: Option<Rc<dyn SubmitHandler>>,
	generation: Rc<Cell<u64>>,
	capture: RefCell<Option<EventCapture>>,
}

impl Bridge {
	#[must_use]
	pub fn new(config: Config, runtime: Rc<dyn ModelRuntime>) -> Self {
		Self {
			config,
			runtime,
			registry: SubscriptionRegistry::new(),
			submit_handler: None,
			generation: Rc::new(Cell::new(0)),
			capture: RefCell::new(None),
		}
	}

	#[must_use]
	pub fn with_submit_handler(mut self, submit_handler: Rc<dyn SubmitHandler>) -> Self {
		self.submit_handler = Some(submit_handler);
		self
	}

	#[must_use]
	pub fn registry(&self) -> &SubscriptionRegistry {
		&self.registry
	}

	/// See [`SubscriptionRegistry::subscribe`].
	pub fn subscribe(&self, field_div: &Element, form_id: &str, callback: SubscriptionCallback) {
		self.registry.subscribe(field_div, form_id, callback);
	}

	/// How many models were wired so far.
	#[must_use]
	pub fn generation(&self) -> u64 {
		self.generation.get()
	}

	/// Fetches prefill data, registers custom functions and builds the form with the data merged in as `data`.
	///
	/// Neither missing prefill data nor failed function registration stop the form from being built.
	///
	/// # Errors
	///
	/// Iff `factory` fails.
	#[instrument(skip(self, definition, functions, factory))]
	pub async fn initialize<F: FormFactory>(&self, definition: Value, functions: &dyn FunctionRegistrar, factory: &F) -> Result<F::Form> {
		let data = match definition.get("id").and_then(Value::as_str) {
			Some(form_id) => fetch_prefill(&self.config, form_id).await,
			None => {
				debug!("Form definition has no id. Not fetching prefill data.");
				None
			}
		};

		let functions_path = definition.pointer("/properties/customFunctionsPath").and_then(Value::as_str);
		if let Err(error) = functions.register(functions_path, self.config.code_base_path.as_deref()).await {
			warn!("Custom functions unavailable: {}", error);
		}

		factory.create_form(with_data(definition, data)).await
	}

	/// Restores the model for `definition`, hands it to subscribed fields,
	/// and starts syncing it with `dom_root` in both directions.
	///
	/// # Errors
	///
	/// Iff the model can't be restored. The previous wiring (if any) stays in place in that case.
	#[instrument(skip(self, definition, dom_root, captcha, renderer, data), fields(form = ?dom_root.get_attribute("data-id")))]
	pub fn wire(
		&self,
		definition: &Value,
		dom_root: &Element,
		captcha: Option<Rc<dyn CaptchaProvider>>,
		renderer: Rc<dyn RenderChildren>,
		data: Option<&Value>,
	) -> Result<Rc<dyn FormInstance>> {
		let instance = self.runtime.restore_form_instance(definition, data)?;

		let generation = self.generation.get() + 1;
		self.generation.set(generation);
		info!(generation, "Restored form model.");

		match dom_root.get_attribute("data-id") {
			Some(form_id) => self.registry.notify_on_restore(&form_id, &*instance),
			None => trace!("Form root has no `data-id`. Skipping subscriptions."),
		}

		let projector = Rc::new(ChangeProjector::new(dom_root.clone(), renderer));
		for kind in ModelEventKind::ALL {
			let current = Rc::clone(&self.generation);
			let projector = Rc::clone(&projector);
			let submit_handler = self.submit_handler.clone();
			instance.subscribe(
				kind,
				Box::new(move |event| {
					if current.get() != generation {
						return trace!(generation, current = current.get(), "Discarding {:?} of a superseded model.", event.kind());
					}
					dispatch(&projector, submit_handler.as_deref(), event);
				}),
			);
		}

		// Replacing the capture detaches the previous generation's listeners.
		let capture = EventCapture::install(dom_root.clone(), Rc::clone(&instance), captcha);
		*self.capture.borrow_mut() = Some(capture);
		Ok(instance)
	}
}

fn dispatch(projector: &ChangeProjector, submit_handler: Option<&dyn SubmitHandler>, event: ModelEvent) {
	match (event, submit_handler) {
		(ModelEvent::FieldChanged(change), _) => projector.apply(&change),
		(ModelEvent::FormChanged(change), _) => projector.apply_form_change(&change),
		(ModelEvent::SubmitSuccess(payload), Some(handler)) => handler.submit_success(&payload, projector.form()),
		(ModelEvent::SubmitFailure(payload), Some(handler)) => handler.submit_failure(&payload, projector.form()),
		(ModelEvent::SubmitError(payload), Some(handler)) => handler.submit_error(&payload, projector.form()),
		(event, None) => debug!("No submit handler for {:?}.", event.kind()),
	}
}

/// `definition` with `data` set (to `null` if there is none).
fn with_data(definition: Value, data: Option<Value>) -> Value {
	match definition {
		Value::Object(mut object) => {
			object.insert("data".to_owned(), data.unwrap_or(Value::Null));
			Value::Object(object)
		}
		other => {
			warn!("Form definition is not an object. Passing it on without prefill data.");
			other
		}
	}
}

/// Fetches and [resolves](`resolve_prefill`) server-held prefill data for the form `form_id`.
///
/// The page's query string is passed on. Any failure means there is no prefill data.
#[instrument(skip(config))]
pub async fn fetch_prefill(config: &Config, form_id: &str) -> Option<Value> {
	match try_fetch_prefill(config, form_id).await {
		Ok(json) => {
			let data = resolve_prefill(json);
			debug!(found = data.is_some(), "Fetched prefill data.");
			data
		}
		Err(error) => {
			debug!("No prefill data: {}", error);
			None
		}
	}
}

async fn try_fetch_prefill(config: &Config, form_id: &str) -> Result<Value> {
	let window = web_sys::window().ok_or(Error::NoWindow)?;
	let search = window.location().search()?;
	let url = config.prefill_url(form_id, &search);

	let response: Response = JsFuture::from(window.fetch_with_str(&url)).await?.dyn_into()?;
	if !response.ok() {
		return Err(Error::PrefillStatus(response.status()));
	}
	let json = JsFuture::from(response.json()?).await?;
	serde_wasm_bindgen::from_value(json).map_err(Error::decode("prefill data"))
}

/// Picks the prefill data out of a response body.
///
/// Bound data at `data.afData.afBoundData.data` wins if it has any own keys (a non-empty object, array or string),
/// then a truthy top-level `data`, then the body itself.
/// Bodies that aren't objects carry no data, and neither do bodies with `null` anywhere along the bound data path.
#[must_use]
pub fn resolve_prefill(json: Value) -> Option<Value> {
	if !json.is_object() {
		trace!("Prefill body is not an object: {:?}", crate::log::Redacted(&json));
		return None;
	}

	let bound = match bound_data(&json) {
		Some(bound) => bound,
		None => {
			trace!("Prefill body has `null` along its bound data path.");
			return None;
		}
	};
	if let Some(bound) = bound.filter(|bound| has_own_keys(bound)) {
		return Some(bound.clone());
	}

	let data = json.get("data").filter(|data| is_truthy(data)).cloned();
	Some(data.unwrap_or(json))
}

/// Follows `data.afData.afBoundData.data` through `json`.
///
/// Missing steps end the walk with `Some(None)`. Stepping into (or ending on) `null` yields `None`.
fn bound_data(json: &Value) -> Option<Option<&Value>> {
	let mut current = json;
	for key in ["data", "afData", "afBoundData", "data"] {
		current = match current.get(key) {
			Some(Value::Null) => return None,
			Some(next) => next,
			None => return Some(None),
		};
	}
	Some(Some(current))
}

/// Whether `value` would list any keys as a JavaScript object.
fn has_own_keys(value: &Value) -> bool {
	match value {
		Value::Object(object) => !object.is_empty(),
		Value::Array(array) => !array.is_empty(),
		Value::String(string) => !string.is_empty(),
		Value::Null | Value::Bool(_) | Value::Number(_) => false,
	}
}

fn is_truthy(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Bool(boolean) => *boolean,
		Value::Number(number) => number.as_f64().map_or(true, |number| number != 0.0 && !number.is_nan()),
		Value::String(string) => !string.is_empty(),
		Value::Array(_) | Value::Object(_) => true,
	}
}
