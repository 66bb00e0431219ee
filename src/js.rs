//! Bindings to the JavaScript rule engine runtime, and the crate's JavaScript entry points.

use crate::{
	adapter::{Action, CaptchaProvider, FieldHandle, FieldValue, FormFactory, FormInstance, FunctionRegistrar, ModelRuntime, RenderChildren, SubmitHandler},
	bootstrap::Bridge,
	config::Config,
	dom::report,
	error::js_message,
	model::{ModelEvent, ModelEventKind},
	registry::SubscriptionCallback,
	Error, LocalBoxFuture,
};
use js_sys::{Array, Function, Object, Promise, Reflect};
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;
use tracing::{error, trace, warn};
use wasm_bindgen::{closure::Closure, prelude::*, JsCast};
use wasm_bindgen_futures::{future_to_promise, spawn_local, JsFuture};
use web_sys::Element;

#[wasm_bindgen]
extern "C" {
	/// The rule engine runtime module, which restores form models.
	pub type AfbRuntime;
	#[wasm_bindgen(method, catch, js_name = restoreFormInstance)]
	fn restore(this: &AfbRuntime, definition: &JsValue, data: &JsValue) -> Result<JsFormInstance, JsValue>;

	/// A live form model.
	pub type JsFormInstance;
	#[wasm_bindgen(method, js_name = getElement)]
	fn get_element(this: &JsFormInstance, id: &str) -> JsValue;
	#[wasm_bindgen(method)]
	fn subscribe(this: &JsFormInstance, handler: &Function, event_type: &str);

	/// One element of a live form model.
	pub type JsFieldModel;
	#[wasm_bindgen(method, getter)]
	fn id(this: &JsFieldModel) -> String;
	#[wasm_bindgen(method, getter)]
	fn value(this: &JsFieldModel) -> JsValue;
	#[wasm_bindgen(method, setter)]
	fn set_value(this: &JsFieldModel, value: &JsValue);
	#[wasm_bindgen(method)]
	fn focus(this: &JsFieldModel);
	#[wasm_bindgen(method)]
	fn dispatch(this: &JsFieldModel, action: &JsValue);

	/// A captcha widget that hands out tokens.
	pub type JsCaptcha;
	#[wasm_bindgen(method, getter)]
	fn id(this: &JsCaptcha) -> String;
	#[wasm_bindgen(method, catch, js_name = getToken)]
	fn token(this: &JsCaptcha) -> Result<Promise, JsValue>;
}

fn to_js(value: &Value) -> crate::Result<JsValue> {
	value.serialize(&serde_wasm_bindgen::Serializer::json_compatible()).map_err(Error::encode("JSON value"))
}

fn from_js(value: JsValue, what: &'static str) -> crate::Result<Value> {
	serde_wasm_bindgen::from_value(value).map_err(Error::decode(what))
}

fn is_absent(value: &JsValue) -> bool {
	value.is_undefined() || value.is_null()
}

/// Awaits `value` if it's a promise.
async fn settle(value: JsValue) -> crate::Result<JsValue> {
	match value.dyn_into::<Promise>() {
		Ok(promise) => Ok(JsFuture::from(promise).await?),
		Err(value) => Ok(value),
	}
}

impl ModelRuntime for AfbRuntime {
	fn restore_form_instance(&self, definition: &Value, data: Option<&Value>) -> crate::Result<Rc<dyn FormInstance>> {
		let definition = to_js(definition)?;
		let data = data.map(to_js).transpose()?.unwrap_or(JsValue::UNDEFINED);
		let instance = self.restore(&definition, &data).map_err(|error| Error::Restore(js_message(&error)))?;
		Ok(Rc::new(RuntimeForm(instance)))
	}
}

/// A restored [`JsFormInstance`].
///
/// Subscribed handlers belong to the engine and stay callable after this is dropped.
struct RuntimeForm(JsFormInstance);

impl FormInstance for RuntimeForm {
	fn get_element(&self, id: &str) -> Option<Rc<dyn FieldHandle>> {
		let element = self.0.get_element(id);
		if is_absent(&element) {
			return None;
		}
		Some(Rc::new(RuntimeField(element.unchecked_into())))
	}

	fn subscribe(&self, kind: ModelEventKind, handler: crate::adapter::EventHandler) {
		let closure = Closure::wrap(Box::new(move |action: JsValue| {
			let payload = Reflect::get(&action, &JsValue::from_str("payload")).unwrap_or(JsValue::UNDEFINED);
			let event = from_js(payload, "model event payload").and_then(|payload| Ok(ModelEvent::from_json(kind, payload)?));
			match event {
				Ok(event) => handler(event),
				Err(error) => warn!("Dropping malformed {:?} event: {}", kind, error),
			}
		}) as Box<dyn Fn(JsValue)>);
		let function = closure.into_js_value();
		self.0.subscribe(function.unchecked_ref(), kind.as_str());
	}
}

struct RuntimeField(JsFieldModel);

impl FieldHandle for RuntimeField {
	fn id(&self) -> String {
		self.0.id()
	}

	fn value(&self) -> Value {
		from_js(self.0.value(), "field value").unwrap_or_else(|error| {
			warn!("{}", error);
			Value::Null
		})
	}

	fn set_value(&self, value: FieldValue) {
		let value = match value {
			FieldValue::Json(value) => match to_js(&value) {
				Ok(value) => value,
				Err(error) => return error!("{}", error),
			},
			FieldValue::Files(files) => files.into_iter().collect::<Array>().into(),
			FieldValue::Unset => JsValue::UNDEFINED,
		};
		self.0.set_value(&value);
	}

	fn focus(&self) {
		self.0.focus();
	}

	fn dispatch(&self, action: Action) {
		let object = Object::new();
		if report(Reflect::set(&object, &JsValue::from_str("type"), &JsValue::from_str(action.as_str())), "build action").is_some() {
			self.0.dispatch(&object);
		}
	}

	fn to_js(&self) -> JsValue {
		let element: &JsValue = self.0.as_ref();
		element.clone()
	}
}

impl CaptchaProvider for JsCaptcha {
	fn field_id(&self) -> String {
		self.id()
	}

	fn get_token(&self) -> LocalBoxFuture<'static, crate::Result<String>> {
		let promise = self.token();
		Box::pin(async move {
			let token = JsFuture::from(promise?).await?;
			token.as_string().ok_or_else(|| Error::Js("captcha token is not a string".to_owned()))
		})
	}
}

/// A JavaScript function `(items, container)`, possibly returning a promise.
pub struct JsRenderer(pub Function);

impl RenderChildren for JsRenderer {
	fn render(&self, items: &Value, container: &Element) {
		let items = match to_js(items) {
			Ok(items) => items,
			Err(error) => return error!("{}", error),
		};
		if let Some(result) = report(self.0.call2(&JsValue::NULL, &items, container), "render items") {
			spawn_local(async move {
				if let Err(error) = settle(result).await {
					error!("Rendering items failed: {}", error);
				}
			});
		}
	}
}

/// An object with any of the methods `submitSuccess`, `submitFailure` and `submitError`, each called as `(payload, form)`.
pub struct JsSubmitHandler(pub Object);

impl JsSubmitHandler {
	fn call(&self, method: &str, payload: &Value, form: &Element) -> bool {
		let function = match Reflect::get(&self.0, &JsValue::from_str(method)).ok().and_then(|f| f.dyn_into::<Function>().ok()) {
			Some(function) => function,
			None => return false,
		};
		match to_js(payload) {
			Ok(payload) => {
				report(function.call2(&self.0, &payload, form), method);
			}
			Err(error) => error!("{}", error),
		}
		true
	}
}

impl SubmitHandler for JsSubmitHandler {
	fn submit_success(&self, payload: &Value, form: &Element) {
		if !self.call("submitSuccess", payload, form) {
			trace!("No `submitSuccess` handler.");
		}
	}

	fn submit_failure(&self, payload: &Value, form: &Element) {
		if !self.call("submitFailure", payload, form) {
			trace!("No `submitFailure` handler.");
		}
	}

	fn submit_error(&self, payload: &Value, form: &Element) {
		if !self.call("submitError", payload, form) {
			self.submit_failure(payload, form);
		}
	}
}

/// A JavaScript function `(functionsPath, codeBasePath)`, possibly returning a promise.
pub struct JsFunctionRegistrar(pub Function);

impl FunctionRegistrar for JsFunctionRegistrar {
	fn register(&self, functions_path: Option<&str>, code_base_path: Option<&str>) -> LocalBoxFuture<'_, crate::Result<()>> {
		let result = self.0.call2(&JsValue::NULL, &functions_path.into(), &code_base_path.into());
		Box::pin(async move {
			settle(result?).await?;
			Ok(())
		})
	}
}

/// A JavaScript function `(definition)` that builds the form, possibly returning a promise.
pub struct JsFormFactory(pub Function);

impl FormFactory for JsFormFactory {
	type Form = JsValue;

	fn create_form(&self, definition: Value) -> LocalBoxFuture<'_, crate::Result<JsValue>> {
		Box::pin(async move {
			let definition = to_js(&definition)?;
			settle(self.0.call1(&JsValue::NULL, &definition)?).await
		})
	}
}

/// The rule engine bridge of one page.
#[wasm_bindgen]
pub struct RuleBridge {
	bridge: Rc<Bridge>,
}

#[wasm_bindgen]
impl RuleBridge {
	/// `config` is a plain object (see [`Config`]) or `undefined`.
	/// `submitHandler` may have the methods `submitSuccess`, `submitFailure` and `submitError`.
	#[wasm_bindgen(constructor)]
	pub fn new(runtime: AfbRuntime, config: JsValue, submit_handler: Option<Object>) -> Result<RuleBridge, JsValue> {
		let config: Config = if is_absent(&config) {
			Config::default()
		} else {
			serde_wasm_bindgen::from_value(config).map_err(Error::decode("bridge config"))?
		};
		let mut bridge = Bridge::new(config, Rc::new(runtime));
		if let Some(submit_handler) = submit_handler {
			bridge = bridge.with_submit_handler(Rc::new(JsSubmitHandler(submit_handler)));
		}
		Ok(Self { bridge: Rc::new(bridge) })
	}

	/// Calls `callback(fieldDiv, element, "register")` with the field's model element each time `formId`'s model is restored.
	pub fn subscribe(&self, field_div: &Element, form_id: &str, callback: Function) {
		let callback: SubscriptionCallback = Rc::new(move |field_div, element, phase| {
			let element = element.map_or(JsValue::UNDEFINED, |element| element.to_js());
			report(callback.call3(&JsValue::NULL, field_div, &element, &JsValue::from_str(phase.as_str())), "subscription callback");
		});
		self.bridge.subscribe(field_div, form_id, callback);
	}

	/// Resolves to whatever `createForm` builds from `definition` and its prefill data.
	#[wasm_bindgen(js_name = initAdaptiveForm)]
	pub fn init_adaptive_form(&self, definition: JsValue, register_functions: Function, create_form: Function) -> Promise {
		let bridge = Rc::clone(&self.bridge);
		future_to_promise(async move {
			let definition = from_js(definition, "form definition")?;
			let form = bridge.initialize(definition, &JsFunctionRegistrar(register_functions), &JsFormFactory(create_form)).await?;
			Ok(form)
		})
	}

	/// Restores the model for `definition` and binds it to `domRoot`.
	///
	/// `render(items, container)` renders repeatable instances added later on.
	#[wasm_bindgen(js_name = loadRuleEngine)]
	pub fn load_rule_engine(&self, definition: JsValue, dom_root: &Element, captcha: Option<JsCaptcha>, render: Function, data: JsValue) -> Result<(), JsValue> {
		let definition = from_js(definition, "form definition")?;
		let data = if is_absent(&data) { None } else { Some(from_js(data, "form data")?) };
		let captcha = captcha.map(|captcha| Rc::new(captcha) as Rc<dyn CaptchaProvider>);
		self.bridge.wire(&definition, dom_root, captcha, Rc::new(JsRenderer(render)), data.as_ref())?;
		Ok(())
	}

	/// How many models were bound so far.
	#[wasm_bindgen(getter)]
	pub fn generation(&self) -> f64 {
		#[allow(clippy::cast_precision_loss)]
		{
			self.bridge.generation() as f64
		}
	}
}

/// Routes `tracing` output to the browser console.
#[cfg(feature = "console-log")]
#[wasm_bindgen(js_name = enableTracing)]
pub fn enable_tracing() {
	if tracing_wasm::try_set_as_global_default().is_err() {
		warn!("A global tracing subscriber is already installed.");
	}
}
