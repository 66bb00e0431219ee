//! In-memory rule engine stand-ins and DOM fixtures for the `web_*` tests.
#![allow(dead_code)]

use form_rules_dom::{
	adapter::{Action, CaptchaProvider, EventHandler, FieldHandle, FieldValue, FormInstance, ModelRuntime, RenderChildren},
	model::{ChangeEvent, ModelEvent, ModelEventKind},
	Error, LocalBoxFuture, Result,
};
use js_sys::Promise;
use serde_json::{json, Value};
use std::{
	cell::{Cell, RefCell},
	collections::HashMap,
	rc::{Rc, Weak},
	sync::Once,
};
use wasm_bindgen_futures::JsFuture;
use web_sys::{window, Element};

pub fn init_tracing() {
	static INIT: Once = Once::new();
	INIT.call_once(tracing_wasm::set_as_global_default);
}

/// A `<form>` appended to the document body, removed again on drop.
pub struct Mounted(pub Element);

impl Drop for Mounted {
	fn drop(&mut self) {
		self.0.remove();
	}
}

pub fn mount(html: &str) -> Mounted {
	init_tracing();
	let document = window().unwrap().document().unwrap();
	let form = document.create_element("form").unwrap();
	form.set_inner_html(html);
	document.body().unwrap().append_child(&form).unwrap();
	Mounted(form)
}

/// Resolves after pending tasks and microtasks ran.
pub async fn next_tick() {
	let promise = Promise::new(&mut |resolve, _| {
		window().unwrap().set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, 0).unwrap();
	});
	JsFuture::from(promise).await.unwrap();
}

pub fn field_change(field: Value, property_name: &str, current_value: Value, prev_value: Value) -> ChangeEvent {
	serde_json::from_value(json!({
		"field": field,
		"changes": [{ "propertyName": property_name, "currentValue": current_value, "prevValue": prev_value }],
	}))
	.unwrap()
}

/// What the bridge did to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
	/// `None` stands for an unset value.
	SetValue(String, Option<Value>),
	Focus(String),
	Dispatch(String, Action),
}

pub type CallLog = Rc<RefCell<Vec<Call>>>;

pub struct MockField {
	id: String,
	log: CallLog,
}

impl FieldHandle for MockField {
	fn id(&self) -> String {
		self.id.clone()
	}

	fn value(&self) -> Value {
		Value::Null
	}

	fn set_value(&self, value: FieldValue) {
		let value = match value {
			FieldValue::Json(value) => Some(value),
			FieldValue::Files(files) => Some(json!(files.iter().map(web_sys::File::name).collect::<Vec<_>>())),
			FieldValue::Unset => None,
		};
		self.log.borrow_mut().push(Call::SetValue(self.id.clone(), value));
	}

	fn focus(&self) {
		self.log.borrow_mut().push(Call::Focus(self.id.clone()));
	}

	fn dispatch(&self, action: Action) {
		self.log.borrow_mut().push(Call::Dispatch(self.id.clone(), action));
	}
}

/// The engine side of one restored model: its subscribers, and a log of what was done to its elements.
///
/// Like a real engine, this outlives the [`MockForm`] handle it was restored through.
#[derive(Default)]
pub struct MockEngine {
	pub log: CallLog,
	handlers: RefCell<HashMap<ModelEventKind, Vec<EventHandler>>>,
}

impl MockEngine {
	pub fn emit(&self, event: ModelEvent) {
		if let Some(handlers) = self.handlers.borrow().get(&event.kind()) {
			for handler in handlers {
				handler(event.clone());
			}
		}
	}

	pub fn calls(&self) -> Vec<Call> {
		self.log.borrow().clone()
	}
}

/// A model handle that knows the element ids it was created with.
pub struct MockForm {
	ids: Vec<String>,
	pub engine: Rc<MockEngine>,
}

impl MockForm {
	pub fn new(ids: &[&str]) -> Rc<Self> {
		Rc::new(Self {
			ids: ids.iter().map(|&id| id.to_owned()).collect(),
			engine: Rc::default(),
		})
	}

	pub fn emit(&self, event: ModelEvent) {
		self.engine.emit(event);
	}

	pub fn calls(&self) -> Vec<Call> {
		self.engine.calls()
	}
}

impl FormInstance for MockForm {
	fn get_element(&self, id: &str) -> Option<Rc<dyn FieldHandle>> {
		self.ids.iter().any(|known| known == id).then(|| {
			Rc::new(MockField {
				id: id.to_owned(),
				log: Rc::clone(&self.engine.log),
			}) as Rc<dyn FieldHandle>
		})
	}

	fn subscribe(&self, kind: ModelEventKind, handler: EventHandler) {
		self.engine.handlers.borrow_mut().entry(kind).or_default().push(handler);
	}
}

/// One restoration: its inputs, the handle given out (kept only as long as the caller keeps it) and the engine behind it.
pub struct Restored {
	pub definition: Value,
	pub data: Option<Value>,
	pub form: Weak<MockForm>,
	pub engine: Rc<MockEngine>,
}

/// Hands out a fresh [`MockForm`] per restoration, or fails while `reject` is set.
#[derive(Default)]
pub struct MockRuntime {
	pub ids: Vec<&'static str>,
	pub reject: Cell<bool>,
	pub restored: RefCell<Vec<Restored>>,
}

impl MockRuntime {
	pub fn new(ids: &[&'static str]) -> Rc<Self> {
		Rc::new(Self { ids: ids.to_vec(), ..Self::default() })
	}

	/// The engine of the most recent restoration.
	pub fn latest(&self) -> Rc<MockEngine> {
		Rc::clone(&self.restored.borrow().last().unwrap().engine)
	}

	/// How many of the handed out form handles are still referenced.
	pub fn live_forms(&self) -> usize {
		self.restored.borrow().iter().filter(|restored| restored.form.strong_count() > 0).count()
	}
}

impl ModelRuntime for MockRuntime {
	fn restore_form_instance(&self, definition: &Value, data: Option<&Value>) -> Result<Rc<dyn FormInstance>> {
		if self.reject.get() {
			return Err(Error::Restore("rejected".to_owned()));
		}
		let form = MockForm::new(&self.ids);
		self.restored.borrow_mut().push(Restored {
			definition: definition.clone(),
			data: data.cloned(),
			form: Rc::downgrade(&form),
			engine: Rc::clone(&form.engine),
		});
		Ok(form)
	}
}

/// Hands out `token-1` for the element `captcha` after a tick, or fails if `fail` is set.
pub struct MockCaptcha {
	pub fail: bool,
}

impl CaptchaProvider for MockCaptcha {
	fn field_id(&self) -> String {
		"captcha".to_owned()
	}

	fn get_token(&self) -> LocalBoxFuture<'static, Result<String>> {
		let fail = self.fail;
		Box::pin(async move {
			next_tick().await;
			if fail {
				Err(Error::Js("challenge failed".to_owned()))
			} else {
				Ok("token-1".to_owned())
			}
		})
	}
}

/// Records what it was asked to render and renders nothing.
#[derive(Default)]
pub struct RecordingRenderer {
	pub rendered: RefCell<Vec<(Value, String)>>,
}

impl RenderChildren for RecordingRenderer {
	fn render(&self, items: &Value, container: &Element) {
		self.rendered.borrow_mut().push((items.clone(), container.class_name()));
	}
}
