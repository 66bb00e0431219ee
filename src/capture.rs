//! Feeding user interaction on the rendered form back into the model.

use crate::{
	adapter::{Action, CaptchaProvider, FieldValue, FormInstance},
	dom,
	log::Redacted,
};
use js_sys::{Array, Reflect};
use serde_json::Value;
use std::rc::Rc;
use tracing::{debug, instrument, trace, trace_span, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use wasm_bindgen_futures::spawn_local;
use web_sys::{CustomEvent, Element, Event, File, FileList, HtmlButtonElement, HtmlInputElement};

/// The `change`, `focusin` and `click` listeners of one form root.
///
/// Listeners are removed when this is dropped, unless it was [`forget`](`EventCapture::forget`)-ed.
pub struct EventCapture {
	form: Element,
	listeners: Vec<(&'static str, Closure<dyn FnMut(Event)>)>,
}

impl core::fmt::Debug for EventCapture {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("EventCapture")
			.field("form", &self.form.id())
			.field("listeners", &self.listeners.iter().map(|(name, _)| name).collect::<Vec<_>>())
			.finish()
	}
}

impl EventCapture {
	/// Starts listening on `form`.
	///
	/// With a `captcha`, submit clicks first fetch a token and write it into the captcha field.
	#[must_use]
	#[instrument(skip(form, instance, captcha), fields(form = %form.id()))]
	pub fn install(form: Element, instance: Rc<dyn FormInstance>, captcha: Option<Rc<dyn CaptchaProvider>>) -> Self {
		let mut capture = Self { form, listeners: Vec::with_capacity(3) };

		capture.listen("change", {
			let form = capture.form.clone();
			let instance = Rc::clone(&instance);
			move |event| on_change(&form, &*instance, &event)
		});
		capture.listen("focusin", {
			let instance = Rc::clone(&instance);
			move |event| on_focus_in(&*instance, &event)
		});
		capture.listen("click", move |event| on_click(&instance, captcha.as_ref(), &event));

		capture
	}

	fn listen(&mut self, name: &'static str, handler: impl 'static + FnMut(Event)) {
		let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
		if dom::report(self.form.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref()), "add event listener").is_some() {
			self.listeners.push((name, closure));
		}
	}

	/// Leaves the listeners in place for as long as the form root exists.
	pub fn forget(mut self) {
		for (_, closure) in self.listeners.drain(..) {
			closure.forget();
		}
	}
}

impl Drop for EventCapture {
	fn drop(&mut self) {
		for (name, closure) in self.listeners.drain(..) {
			dom::report(self.form.remove_event_listener_with_callback(name, closure.as_ref().unchecked_ref()), "remove event listener");
		}
	}
}

fn target_element(event: &Event) -> Option<Element> {
	event.target().and_then(|target| target.dyn_into::<Element>().ok())
}

/// Writes the changed control's value into its model element.
pub fn on_change(form: &Element, instance: &dyn FormInstance, event: &Event) {
	let span = trace_span!("change");
	let _enter = span.enter();

	let target = match target_element(event) {
		Some(target) => target,
		None => return trace!("Change without element target."),
	};
	let id = match dom::closest_wrapper(&target).and_then(|wrapper| dom::wrapper_id(&wrapper)) {
		Some(id) => id,
		None => return trace!("Changed element is not inside a field wrapper."),
	};
	let element = match instance.get_element(&id) {
		Some(element) => element,
		None => return trace!("No model element {:?}.", id),
	};

	let value = captured_value(form, &target, event);
	debug!("Writing {:?} into {:?}.", FieldValueKind(&value), id);
	element.set_value(value);
}

/// The model value for a changed control, by its role.
#[must_use]
pub fn captured_value(form: &Element, target: &Element, event: &Event) -> FieldValue {
	let input = match target.dyn_ref::<HtmlInputElement>() {
		Some(input) => input,
		None => return dom::control_value(target).map_or(FieldValue::Unset, FieldValue::from),
	};

	let field_type = input.get_attribute("data-field-type");
	match (input.type_().as_str(), field_type.as_deref()) {
		("checkbox", Some("checkbox-group")) => {
			let checked = dom::checkbox_group_value(&input.name(), form);
			FieldValue::Json(Value::Array(checked.into_iter().map(Value::String).collect()))
		}
		("checkbox", _) => {
			if input.checked() {
				input.value().into()
			} else {
				input.get_attribute("data-unchecked-value").map_or(FieldValue::Unset, FieldValue::from)
			}
		}
		("file", _) => FieldValue::Files(event_files(event).or_else(|| input.files().map(|files| file_list(&files))).unwrap_or_default()),
		_ => input.value().into(),
	}
}

/// Files carried by a synthetic change event (as `detail.files`), which take precedence over the input's own selection.
fn event_files(event: &Event) -> Option<Vec<File>> {
	let detail = event.dyn_ref::<CustomEvent>()?.detail();
	if detail.is_undefined() || detail.is_null() {
		return None;
	}
	let files = Reflect::get(&detail, &JsValue::from_str("files")).ok()?;
	if let Some(list) = files.dyn_ref::<FileList>() {
		Some(file_list(list))
	} else if Array::is_array(&files) {
		Some(Array::from(&files).iter().filter_map(|file| file.dyn_into::<File>().ok()).collect())
	} else {
		None
	}
}

fn file_list(list: &FileList) -> Vec<File> {
	(0..list.length()).filter_map(|i| list.item(i)).collect()
}

/// Forwards focus to the model. Radio buttons and checkboxes stand for their group's wrapper.
pub fn on_focus_in(instance: &dyn FormInstance, event: &Event) {
	let target = match target_element(event) {
		Some(target) => target,
		None => return,
	};
	let id = match target.dyn_ref::<HtmlInputElement>().map(HtmlInputElement::type_).as_deref() {
		Some("radio" | "checkbox") => dom::closest_wrapper(&target).and_then(|wrapper| dom::wrapper_id(&wrapper)),
		_ => Some(target.id()),
	};
	match id.and_then(|id| instance.get_element(&id)) {
		Some(element) => element.focus(),
		None => trace!("Focus on an element without model counterpart."),
	}
}

/// Dispatches button clicks to the model.
///
/// Submit clicks wait for the captcha token (if any) to be written first, so that validation on submit sees it.
pub fn on_click(instance: &Rc<dyn FormInstance>, captcha: Option<&Rc<dyn CaptchaProvider>>, event: &Event) {
	let button = match event.target().and_then(|target| target.dyn_into::<HtmlButtonElement>().ok()) {
		Some(button) => button,
		None => return,
	};
	let element = instance.get_element(&button.id());

	let captcha = match captcha {
		Some(captcha) if button.type_() == "submit" => Rc::clone(captcha),
		_ => {
			match element {
				Some(element) => element.dispatch(Action::Click),
				None => trace!("Click on a button without model counterpart."),
			}
			return;
		}
	};

	let instance = Rc::clone(instance);
	spawn_local(async move {
		let token = match captcha.get_token().await {
			Ok(token) => token,
			Err(error) => return warn!("Captcha token unavailable, not submitting: {}", error),
		};
		match instance.get_element(&captcha.field_id()) {
			Some(captcha_field) => captcha_field.set_value(token.into()),
			None => warn!("Captcha field {:?} not found in the model.", captcha.field_id()),
		}
		if let Some(element) = element {
			element.dispatch(Action::Click);
		}
	});
}

/// Logs only the shape of a captured value.
struct FieldValueKind<'a>(&'a FieldValue);

impl core::fmt::Debug for FieldValueKind<'_> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self.0 {
			FieldValue::Json(value) => core::fmt::Debug::fmt(&Redacted(value), f),
			FieldValue::Files(files) => write!(f, "<{} file(s)>", files.len()),
			FieldValue::Unset => f.write_str("<unset>"),
		}
	}
}
