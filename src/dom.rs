//! DOM helpers shared by projection and capture.
//!
//! All lookups go through the live DOM. Nothing here caches nodes, since repeatable panels replace subtrees wholesale.

use crate::{
	compare::{group_contains, to_dom_string, ValueType},
	model::{FieldModel, FieldType, Label},
};
use serde_json::Value;
use tracing::{error, trace};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, HtmlButtonElement, HtmlElement, HtmlFieldSetElement, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement};

pub const WRAPPER_CLASS: &str = "field-wrapper";
pub const LABEL_CLASS: &str = "field-label";
pub const DESCRIPTION_CLASS: &str = "field-description";
pub const INVALID_CLASS: &str = "field-invalid";
pub const REPEAT_CONTAINER_CLASS: &str = "repeat-wrapper";

/// Logs a failed DOM write. DOM writes are never retried.
pub(crate) fn report<T>(result: Result<T, JsValue>, what: &str) -> Option<T> {
	match result {
		Ok(value) => Some(value),
		Err(error) => {
			error!("Failed to {}: {:?}", what, error);
			None
		}
	}
}

/// `[name="value"]`, with `value` quoted so that any id or name is matched literally.
#[must_use]
pub fn attribute_selector(name: &str, value: &str) -> String {
	let mut selector = String::with_capacity(name.len() + value.len() + 6);
	selector.push('[');
	selector.push_str(name);
	selector.push_str("=\"");
	for c in value.chars() {
		match c {
			'"' | '\\' => {
				selector.push('\\');
				selector.push(c);
			}
			'\n' => selector.push_str("\\a "),
			c => selector.push(c),
		}
	}
	selector.push_str("\"]");
	selector
}

#[must_use]
pub fn query(root: &Element, selector: &str) -> Option<Element> {
	match root.query_selector(selector) {
		Ok(found) => found,
		Err(error) => {
			error!("Invalid selector {:?}: {:?}", selector, error);
			None
		}
	}
}

#[must_use]
pub fn query_all(root: &Element, selector: &str) -> Vec<Element> {
	let list = match root.query_selector_all(selector) {
		Ok(list) => list,
		Err(error) => {
			error!("Invalid selector {:?}: {:?}", selector, error);
			return Vec::new();
		}
	};
	(0..list.length()).filter_map(|i| list.item(i)).filter_map(|node| node.dyn_into::<Element>().ok()).collect()
}

/// Finds the element with the given id below `root`.
#[must_use]
pub fn by_id(root: &Element, id: &str) -> Option<Element> {
	query(root, &attribute_selector("id", id))
}

/// The `.field-wrapper` that contains (or is) `element`.
#[must_use]
pub fn closest_wrapper(element: &Element) -> Option<Element> {
	element.closest(&format!(".{}", WRAPPER_CLASS)).ok().flatten()
}

/// The model element id a wrapper stands for.
#[must_use]
pub fn wrapper_id(wrapper: &Element) -> Option<String> {
	wrapper.get_attribute("data-id")
}

/// The member inputs of a radio or checkbox group called `name`, below `root`.
#[must_use]
pub fn group_inputs(root: &Element, name: &str) -> Vec<HtmlInputElement> {
	query_all(root, &format!("input{}", attribute_selector("name", name)))
		.into_iter()
		.filter_map(|element| element.dyn_into().ok())
		.collect()
}

/// Sets or removes a presence-based attribute.
pub fn set_flag(element: &Element, name: &str, on: bool) {
	report(element.toggle_attribute_with_force(name, on), "toggle attribute");
}

/// Disables a control and marks it read-only for assistive technology, or reverses both.
pub fn disable_element(element: &Element, disabled: bool) {
	set_flag(element, "disabled", disabled);
	set_flag(element, "aria-readonly", disabled);
}

pub(crate) fn set_attribute(element: &Element, name: &str, value: &str) {
	report(element.set_attribute(name, value), "set attribute");
}

/// Assigns a form control's live value. Elements without one are left alone.
pub fn set_control_value(element: &Element, value: &str) {
	if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
		input.set_value(value);
	} else if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
		select.set_value(value);
	} else if let Some(text_area) = element.dyn_ref::<HtmlTextAreaElement>() {
		text_area.set_value(value);
	} else if let Some(button) = element.dyn_ref::<HtmlButtonElement>() {
		button.set_value(value);
	} else {
		trace!("<{}> has no value to set.", element.tag_name());
	}
}

#[must_use]
pub fn control_value(element: &Element) -> Option<String> {
	if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
		Some(input.value())
	} else if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
		Some(select.value())
	} else if let Some(text_area) = element.dyn_ref::<HtmlTextAreaElement>() {
		Some(text_area.value())
	} else {
		element.dyn_ref::<HtmlButtonElement>().map(HtmlButtonElement::value)
	}
}

/// Sets the native constraint validation message. Returns `false` iff `element` doesn't take part in constraint validation.
pub fn set_custom_validity(element: &Element, message: &str) -> bool {
	if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
		input.set_custom_validity(message);
	} else if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
		select.set_custom_validity(message);
	} else if let Some(text_area) = element.dyn_ref::<HtmlTextAreaElement>() {
		text_area.set_custom_validity(message);
	} else if let Some(button) = element.dyn_ref::<HtmlButtonElement>() {
		button.set_custom_validity(message);
	} else if let Some(field_set) = element.dyn_ref::<HtmlFieldSetElement>() {
		field_set.set_custom_validity(message);
	} else {
		return false;
	}
	true
}

pub(crate) fn document_of(element: &Element) -> Option<Document> {
	let document = element.owner_document();
	if document.is_none() {
		error!("No owner document found for <{}>.", element.tag_name());
	}
	document
}

pub(crate) fn create(document: &Document, tag: &str) -> Option<Element> {
	report(document.create_element(tag), "create element")
}

/// Option captions may be given as plain values or as `{ "value": … }` objects.
#[must_use]
pub fn caption_of(name: &Value) -> String {
	match name {
		Value::Object(object) => object.get("value").map(to_dom_string).unwrap_or_default(),
		other => to_dom_string(other),
	}
	.trim()
	.to_owned()
}

/// `<label for="{id}" class="field-label">`.
#[must_use]
pub fn create_label(document: &Document, id: &str, label: &Label) -> Option<Element> {
	let element = create(document, "label")?;
	set_attribute(&element, "for", id);
	set_attribute(&element, "id", &format!("{}-label", id));
	element.set_class_name(LABEL_CLASS);
	element.set_text_content(Some(label.text()));
	if let Some(visible) = label.visible {
		set_attribute(&element, "data-visible", &visible.to_string());
	}
	Some(element)
}

/// `<div class="field-description">` with `description` as (trusted) markup.
#[must_use]
pub fn create_help_text(document: &Document, id: &str, description: &str) -> Option<Element> {
	let element = create(document, "div")?;
	set_attribute(&element, "id", &format!("{}-description", id));
	set_attribute(&element, "aria-live", "polite");
	element.set_class_name(DESCRIPTION_CLASS);
	element.set_inner_html(description);
	Some(element)
}

/// Shows `message` in place of the field's description, or restores the description (from `data-description`) if `message` is empty.
pub fn update_or_create_invalid_msg(field: &Element, message: &str) {
	let wrapper = match closest_wrapper(field) {
		Some(wrapper) => wrapper,
		None => return trace!("No wrapper to show a validation message in."),
	};
	let existing = query(&wrapper, &format!(":scope > .{}", DESCRIPTION_CLASS));
	let class_list = wrapper.class_list();

	if message.is_empty() {
		report(class_list.remove_1(INVALID_CLASS), "remove class");
		match (wrapper.get_attribute("data-description"), existing) {
			(Some(description), Some(element)) => element.set_inner_html(&description),
			(Some(description), None) => {
				if let Some(element) = document_of(&wrapper).and_then(|document| create_help_text(&document, &field.id(), &description)) {
					report(wrapper.append_with_node_1(&element), "append description");
				}
			}
			(None, Some(element)) => element.remove(),
			(None, None) => (),
		}
		return;
	}

	report(class_list.add_1(INVALID_CLASS), "add class");
	let element = match existing {
		Some(element) => element,
		None => {
			let element = match document_of(&wrapper).and_then(|document| create_help_text(&document, &field.id(), "")) {
				Some(element) => element,
				None => return,
			};
			report(wrapper.append_with_node_1(&element), "append validation message");
			element
		}
	};
	element.set_text_content(Some(message));
}

/// The values of all checked inputs called `name` below `form`.
#[must_use]
pub fn checkbox_group_value(name: &str, form: &Element) -> Vec<String> {
	group_inputs(form, name).into_iter().filter(HtmlInputElement::checked).map(|input| input.value()).collect()
}

fn selects(field: &FieldModel, option_value: &str) -> bool {
	let declared = field.value_type.as_deref();
	group_contains(&field.value, option_value, ValueType::of_items(declared), ValueType::of(declared))
}

/// Replaces a drop-down's options with the model's `enum`/`enumNames`.
///
/// `field` is either the `<select>` itself or contains it.
pub fn create_dropdown_using_enum(model: &FieldModel, field: &Element) {
	let select = match field.dyn_ref::<HtmlSelectElement>() {
		Some(select) => select.clone(),
		None => match query(field, "select").and_then(|select| select.dyn_into::<HtmlSelectElement>().ok()) {
			Some(select) => select,
			None => return trace!("No <select> found for drop-down {:?}.", model.id),
		},
	};
	let document = match document_of(&select) {
		Some(document) => document,
		None => return,
	};

	select.set_inner_html("");
	if let Some(placeholder) = &model.placeholder {
		if let Some(option) = create(&document, "option") {
			option.set_text_content(Some(placeholder));
			set_attribute(&option, "value", "");
			set_flag(&option, "disabled", true);
			report(select.append_with_node_1(&option), "append placeholder");
		}
	}

	for (value, name) in model.options() {
		let caption = caption_of(name);
		let value = match value {
			Value::String(value) if !value.trim().is_empty() => value.trim().to_owned(),
			Value::String(_) | Value::Null => caption.clone(),
			other => to_dom_string(other),
		};
		let option = match create(&document, "option") {
			Some(option) => option,
			None => continue,
		};
		option.set_text_content(Some(&caption));
		set_attribute(&option, "value", &value);
		if selects(model, &value) {
			set_flag(&option, "selected", true);
		}
		report(select.append_with_node_1(&option), "append option");
	}
}

/// Replaces a radio or checkbox group's member inputs with the model's `enum`/`enumNames`.
pub fn create_radio_or_checkbox_using_enum(model: &FieldModel, field: &Element) {
	let (input_type, field_type) = match model.field_type() {
		FieldType::RadioGroup => ("radio", "radio-group"),
		FieldType::CheckboxGroup => ("checkbox", "checkbox-group"),
		other => return trace!("{:?} has no enumerated inputs.", other),
	};
	let document = match document_of(field) {
		Some(document) => document,
		None => return,
	};
	let name = model.name.as_deref().unwrap_or(&model.id);
	let item_class = format!("{}-wrapper", input_type);

	for stale in query_all(field, &format!(":scope > .{}", item_class)) {
		stale.remove();
	}

	for (index, (value, caption)) in model.options().into_iter().enumerate() {
		let value = to_dom_string(value);
		let id = format!("{}-{}", model.id, index);
		let (item, input, label) = match (create(&document, "div"), create(&document, "input"), create(&document, "label")) {
			(Some(item), Some(input), Some(label)) => (item, input, label),
			_ => continue,
		};
		let input = match input.dyn_into::<HtmlInputElement>() {
			Ok(input) => input,
			Err(_) => continue,
		};

		item.set_class_name(&item_class);
		input.set_type(input_type);
		input.set_id(&id);
		input.set_name(name);
		input.set_value(&value);
		set_attribute(&input, "data-field-type", field_type);
		input.set_checked(selects(model, &value));
		if input_type == "checkbox" || index == 0 {
			input.set_required(model.required == Some(true));
		}
		if model.enabled == Some(false) || model.is_read_only() {
			set_flag(&input, "disabled", true);
		}
		set_attribute(&label, "for", &id);
		label.set_class_name(LABEL_CLASS);
		label.set_text_content(Some(&caption_of(caption)));

		report(item.append_with_node_2(&input, &label), "append option input");
		report(field.append_with_node_1(&item), "append option");
	}
}

/// The path part of an image source, and its extension.
fn split_source(src: &str) -> (&str, &str) {
	let path = src.split(|c| c == '?' || c == '#').next().unwrap_or(src);
	let extension = path.rsplit_once('.').map_or("", |(_, extension)| extension);
	(path, extension)
}

/// Builds a responsive `<picture>` for `src`: WebP sources for wide and narrow viewports plus an `<img>` fallback.
#[must_use]
pub fn create_optimized_picture(document: &Document, src: &str, alt: &str) -> Option<Element> {
	const WIDE: (&str, &str) = ("(min-width: 600px)", "2000");
	const NARROW: &str = "750";

	let picture = create(document, "picture")?;
	let img = create(document, "img")?;
	set_attribute(&img, "loading", "lazy");
	set_attribute(&img, "alt", alt);

	if src.starts_with("data:") || src.starts_with("blob:") {
		set_attribute(&img, "src", src);
		report(picture.append_with_node_1(&img), "append image");
		return Some(picture);
	}

	let (path, extension) = split_source(src);
	for (media, width) in [(Some(WIDE.0), WIDE.1), (None, NARROW)] {
		let source = create(document, "source")?;
		if let Some(media) = media {
			set_attribute(&source, "media", media);
		}
		set_attribute(&source, "type", "image/webp");
		set_attribute(&source, "srcset", &format!("{}?width={}&format=webply&optimize=medium", path, width));
		report(picture.append_with_node_1(&source), "append source");
	}
	let fallback = create(document, "source")?;
	set_attribute(&fallback, "media", WIDE.0);
	set_attribute(&fallback, "srcset", &format!("{}?width={}&format={}&optimize=medium", path, WIDE.1, extension));
	report(picture.append_with_node_1(&fallback), "append source");

	set_attribute(&img, "src", &format!("{}?width={}&format={}&optimize=medium", path, NARROW, extension));
	report(picture.append_with_node_1(&img), "append image");
	Some(picture)
}

/// Moves input focus to `element`, if it can take focus.
pub fn focus(element: &Element) {
	if let Some(element) = element.dyn_ref::<HtmlElement>() {
		report(element.focus(), "focus element");
	}
}
