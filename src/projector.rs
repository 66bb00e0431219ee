//! Projection of model changes onto the rendered form.

use crate::{
	adapter::RenderChildren,
	compare::{compare, group_contains, to_dom_string, ValueType},
	dom::{self, report, set_attribute, set_flag, DESCRIPTION_CLASS, LABEL_CLASS, REPEAT_CONTAINER_CLASS},
	log::Redacted,
	model::{id_of, Change, ChangeEvent, FieldModel, FieldType, Label, Property},
};
use serde_json::{json, Value};
use std::rc::Rc;
use tracing::{debug, instrument, trace, trace_span};
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlDialogElement, HtmlInputElement, Node, ScrollBehavior, ScrollIntoViewOptions};

/// Applies model change events to the DOM below one form root.
///
/// Fields are looked up by id for each event, so subtrees may be replaced freely between events.
/// Changes only ever touch the affected field's wrapper, except for `items`, which may render new subtrees,
/// and `activeChild`, which moves the active marker between two wrappers.
pub struct ChangeProjector {
	form: Element,
	renderer: Rc<dyn RenderChildren>,
}

impl ChangeProjector {
	#[must_use]
	pub fn new(form: Element, renderer: Rc<dyn RenderChildren>) -> Self {
		Self { form, renderer }
	}

	#[must_use]
	pub fn form(&self) -> &Element {
		&self.form
	}

	/// Applies each change of a `fieldChanged` event, in order.
	///
	/// Does nothing if the field isn't rendered (anymore). Unknown properties are skipped.
	#[instrument(skip(self, event), fields(id = %event.field.id, changes = event.changes.len()))]
	pub fn apply(&self, event: &ChangeEvent) {
		let model = &event.field;
		let field = match dom::by_id(&self.form, &model.id) {
			Some(field) => field,
			None => return trace!("Field is not rendered. Skipping."),
		};
		let wrapper = dom::closest_wrapper(&field);

		for change in &event.changes {
			let span = trace_span!("Projecting change", property = %change.property_name, current = ?Redacted(&change.current_value));
			let _enter = span.enter();
			self.apply_change(model, &field, wrapper.as_ref(), change);
		}
	}

	/// Applies a form-level `change` event. Only `activeChild` is reflected there.
	#[instrument(skip(self, event))]
	pub fn apply_form_change(&self, event: &ChangeEvent) {
		for change in &event.changes {
			match change.property() {
				Property::ActiveChild => match id_of(&change.current_value) {
					Some(id) => self.activate(id),
					None => trace!("Active child cleared."),
				},
				other => trace!("Ignoring form-level {:?} change.", other),
			}
		}
	}

	/// Makes the field `id` the form's only active one, focuses it and scrolls it into view.
	///
	/// Scrolling is skipped when focus already landed on (or inside) the field, since the browser scrolls for focus by itself.
	#[instrument(skip(self))]
	pub fn activate(&self, id: &str) {
		for active in dom::query_all(&self.form, "[data-active]") {
			report(active.remove_attribute("data-active"), "remove attribute");
		}

		let field = match dom::by_id(&self.form, id) {
			Some(field) => field,
			None => return trace!("Active child is not rendered."),
		};
		if let Some(wrapper) = dom::closest_wrapper(&field) {
			set_attribute(&wrapper, "data-active", "true");
		}
		dom::focus(&field);

		let active: Option<Node> = field.owner_document().and_then(|document| document.active_element()).map(Into::into);
		if !field.is_same_node(active.as_ref()) && !field.contains(active.as_ref()) {
			let options = ScrollIntoViewOptions::new();
			options.set_behavior(ScrollBehavior::Smooth);
			field.scroll_into_view_with_scroll_into_view_options(&options);
		}
	}

	fn apply_change(&self, model: &FieldModel, field: &Element, wrapper: Option<&Element>, change: &Change) {
		let Change { current_value: current, prev_value: previous, .. } = change;
		match change.property() {
			Property::Required => {
				if let Some(wrapper) = wrapper {
					set_flag(wrapper, "data-required", current == &Value::Bool(true));
				}
			}
			Property::ValidationMessage => {
				let validity = model.validity.clone().unwrap_or_default();
				if validity.expression_mismatch || validity.custom_constraint {
					let message = to_dom_string(current);
					if dom::set_custom_validity(field, &message) {
						dom::update_or_create_invalid_msg(field, &message);
					}
				}
			}
			Property::Value => project_value(model, field, current),
			Property::Visible => {
				if let Some(wrapper) = wrapper {
					project_visible(model, wrapper, current);
				}
			}
			Property::Enabled => project_enabled(model, field, wrapper, current),
			Property::ReadOnly => project_read_only(model, field, wrapper, current),
			Property::Label => {
				if let Some(wrapper) = wrapper {
					project_label(model, field, wrapper, current);
				}
			}
			Property::Description => {
				if let Some(wrapper) = wrapper {
					project_description(model, wrapper, current);
				}
			}
			Property::Items => self.project_items(field, current, previous),
			Property::ActiveChild => match model.active_child_id() {
				Some(id) => self.activate(id),
				None => trace!("Active child cleared."),
			},
			Property::Valid => {
				if current == &Value::Bool(true) {
					dom::update_or_create_invalid_msg(field, "");
				}
			}
			Property::Enum | Property::EnumNames => match model.field_type() {
				FieldType::RadioGroup | FieldType::CheckboxGroup => dom::create_radio_or_checkbox_using_enum(model, field),
				FieldType::DropDown => dom::create_dropdown_using_enum(model, field),
				_ => (),
			},
			Property::Unknown(name) => trace!("Ignoring unknown property {:?}.", name),
		}
	}

	/// `null` removes the instance named by `previous`. Anything else is a new instance to render into the repeat container.
	fn project_items(&self, field: &Element, current: &Value, previous: &Value) {
		if current.is_null() {
			match id_of(previous).and_then(|id| dom::by_id(field, id)) {
				Some(removed) => removed.remove(),
				None => trace!("Removed instance is not rendered."),
			}
			return;
		}

		match dom::query(field, &format!(".{}", REPEAT_CONTAINER_CLASS)) {
			Some(container) => self.renderer.render(&json!({ "items": [current] }), &container),
			None => debug!("No repeat container to render the new instance into."),
		}
	}
}

fn group_name(model: &FieldModel) -> &str {
	model.name.as_deref().unwrap_or(&model.id)
}

fn toggle_rating(wrapper: Option<&Element>, disabled: bool) {
	if let Some(rating) = wrapper.and_then(|wrapper| dom::query(wrapper, ".rating")) {
		report(rating.class_list().toggle_with_force("disabled", disabled), "toggle class");
	}
}

fn is_focused(element: &Element) -> bool {
	let active: Option<Node> = element.owner_document().and_then(|document| document.active_element()).map(Into::into);
	element.is_same_node(active.as_ref())
}

fn project_value(model: &FieldModel, field: &Element, current: &Value) {
	let field_type = model.field_type();
	let declared = model.value_type.as_deref();

	if field_type.is_formattable() && model.has_display_transform() {
		let display = model.display_value.as_ref().map(to_dom_string).unwrap_or_default();
		set_attribute(field, "edit-value", &to_dom_string(current));
		set_attribute(field, "display-value", &display);
		if is_focused(field) {
			trace!("Field has focus. Leaving its content alone.");
		} else {
			dom::set_control_value(field, &display);
		}
		return;
	}

	match field_type {
		FieldType::RadioGroup | FieldType::CheckboxGroup => {
			let (item_type, value_type) = (ValueType::of_items(declared), ValueType::of(declared));
			for input in dom::group_inputs(field, group_name(model)) {
				input.set_checked(group_contains(current, &input.value(), item_type, value_type));
			}
		}
		FieldType::Checkbox => {
			if let Some(input) = field.dyn_ref::<HtmlInputElement>() {
				input.set_checked(compare(current, &input.value(), ValueType::of(declared)));
			}
		}
		FieldType::PlainText => field.set_inner_html(&to_dom_string(current)),
		FieldType::Image => {
			let alt = dom::query(field, "img").and_then(|img| img.get_attribute("alt")).unwrap_or_default();
			let picture = dom::query(field, "picture");
			let replacement = field.owner_document().and_then(|document| dom::create_optimized_picture(&document, &to_dom_string(current), &alt));
			if let (Some(picture), Some(replacement)) = (picture, replacement) {
				report(picture.replace_with_with_node_1(&replacement), "replace picture");
			}
		}
		FieldType::FileInput => trace!("File selections can't be set programmatically."),
		_ => match field.dyn_ref::<HtmlInputElement>() {
			Some(input) if input.type_() == "file" => trace!("File selections can't be set programmatically."),
			_ => dom::set_control_value(field, &to_dom_string(current)),
		},
	}
}

/// Read-only groups, drop-downs and ratings stay disabled whatever `enabled` says.
fn project_enabled(model: &FieldModel, field: &Element, wrapper: Option<&Element>, current: &Value) {
	let enabled = current == &Value::Bool(true);
	let locked = model.is_read_only();
	match model.field_type() {
		FieldType::RadioGroup | FieldType::CheckboxGroup => {
			if !locked {
				for input in dom::group_inputs(field, group_name(model)) {
					dom::disable_element(&input, !enabled);
				}
			}
		}
		FieldType::DropDown => {
			if !locked {
				dom::disable_element(field, !enabled);
			}
		}
		_ if model.is_rating() => {
			if !locked {
				toggle_rating(wrapper, !enabled);
			}
		}
		_ => set_flag(field, "disabled", current == &Value::Bool(false)),
	}
}

fn project_read_only(model: &FieldModel, field: &Element, wrapper: Option<&Element>, current: &Value) {
	let read_only = current == &Value::Bool(true);
	match model.field_type() {
		FieldType::RadioGroup | FieldType::CheckboxGroup => {
			for input in dom::group_inputs(field, group_name(model)) {
				dom::disable_element(&input, read_only);
			}
		}
		FieldType::DropDown => dom::disable_element(field, read_only),
		_ if model.is_rating() => toggle_rating(wrapper, read_only),
		_ => set_flag(field, "disabled", read_only),
	}
}

/// Panels shown as dialogs are closed when hidden. The dialog's own `close` listeners take care of overlays.
fn project_visible(model: &FieldModel, wrapper: &Element, current: &Value) {
	set_attribute(wrapper, "data-visible", &to_dom_string(current));
	if model.field_type() == FieldType::Panel && current == &Value::Bool(false) {
		if let Some(dialog) = dom::query(wrapper, "dialog").and_then(|dialog| dialog.dyn_into::<HtmlDialogElement>().ok()) {
			if dialog.open() {
				dialog.close();
			}
		}
	}
}

fn project_label(model: &FieldModel, field: &Element, wrapper: &Element, current: &Value) {
	let label: Label = match serde_json::from_value(current.clone()) {
		Ok(label) => label,
		Err(error) => return debug!("Malformed label: {}", error),
	};

	if let Some(existing) = dom::query(wrapper, &format!(".{}", LABEL_CLASS)) {
		existing.set_text_content(Some(label.text()));
		if let Some(visible) = label.visible {
			set_attribute(&existing, "data-visible", &visible.to_string());
		}
	} else if model.field_type() == FieldType::Button {
		field.set_text_content(Some(label.text()));
	} else if !label.text().is_empty() {
		if let Some(created) = field.owner_document().and_then(|document| dom::create_label(&document, &model.id, &label)) {
			report(wrapper.prepend_with_node_1(&created), "prepend label");
		}
	}
}

fn project_description(model: &FieldModel, wrapper: &Element, current: &Value) {
	let description = to_dom_string(current);
	if let Some(existing) = dom::query(wrapper, &format!(".{}", DESCRIPTION_CLASS)) {
		existing.set_inner_html(&description);
	} else if !description.is_empty() {
		if let Some(created) = wrapper.owner_document().and_then(|document| dom::create_help_text(&document, &model.id, &description)) {
			report(wrapper.append_with_node_1(&created), "append description");
		}
	}
}
