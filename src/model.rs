//! Snapshots and events as emitted by the rule engine.

use serde::Deserialize;
use serde_json::Value;

/// The field types the projector distinguishes.
///
/// Short aliases (`text`, `number`, `date`, `file`) are accepted alongside the engine's own names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
	#[serde(alias = "text")]
	TextInput,
	#[serde(alias = "number")]
	NumberInput,
	#[serde(alias = "date")]
	DateInput,
	Email,
	TelephoneInput,
	MultilineInput,
	Checkbox,
	CheckboxGroup,
	RadioGroup,
	DropDown,
	PlainText,
	Image,
	Button,
	Panel,
	#[serde(alias = "file")]
	FileInput,
	Form,
	#[serde(other)]
	Other,
}

impl FieldType {
	#[must_use]
	pub fn is_group(self) -> bool {
		matches!(self, Self::RadioGroup | Self::CheckboxGroup)
	}

	/// Scalar inputs whose shown text may differ from their value when a display format applies.
	#[must_use]
	pub fn is_formattable(self) -> bool {
		matches!(self, Self::TextInput | Self::NumberInput | Self::DateInput | Self::Email)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Validity {
	pub valid: Option<bool>,
	pub expression_mismatch: bool,
	pub custom_constraint: bool,
}

/// A field's caption. The engine reports it as one value, so text and visibility change together.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Label {
	pub value: Option<String>,
	pub visible: Option<bool>,
}

impl Label {
	#[must_use]
	pub fn text(&self) -> &str {
		self.value.as_deref().unwrap_or_default()
	}
}

/// State snapshot of one model element, as carried by [`ChangeEvent`]s.
///
/// Everything but `id` is optional. Unknown keys are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldModel {
	pub id: String,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub field_type: Option<FieldType>,
	/// Component subtype, such as `rating`.
	#[serde(default, rename = ":type")]
	pub component_type: Option<String>,
	/// Declared value type, such as `number` or `string[]`.
	#[serde(default, rename = "type")]
	pub value_type: Option<String>,
	#[serde(default)]
	pub value: Value,
	#[serde(default)]
	pub display_value: Option<Value>,
	#[serde(default)]
	pub display_format: Option<String>,
	#[serde(default)]
	pub display_value_expression: Option<String>,
	#[serde(default)]
	pub read_only: Option<bool>,
	#[serde(default)]
	pub required: Option<bool>,
	#[serde(default)]
	pub enabled: Option<bool>,
	#[serde(default)]
	pub visible: Option<bool>,
	#[serde(default)]
	pub validation_message: Option<String>,
	#[serde(default)]
	pub validity: Option<Validity>,
	#[serde(default)]
	pub label: Option<Label>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub placeholder: Option<String>,
	#[serde(default, rename = "enum")]
	pub enum_values: Option<Vec<Value>>,
	#[serde(default)]
	pub enum_names: Option<Vec<Value>>,
	#[serde(default)]
	pub items: Option<Vec<Value>>,
	#[serde(default)]
	pub active_child: Option<Value>,
}

impl FieldModel {
	/// Missing field types are treated as [`FieldType::Other`].
	#[must_use]
	pub fn field_type(&self) -> FieldType {
		self.field_type.unwrap_or(FieldType::Other)
	}

	#[must_use]
	pub fn is_read_only(&self) -> bool {
		self.read_only.unwrap_or(false)
	}

	#[must_use]
	pub fn is_rating(&self) -> bool {
		self.component_type.as_deref() == Some("rating")
	}

	/// Whether a display format or expression makes the shown text differ from the raw value.
	#[must_use]
	pub fn has_display_transform(&self) -> bool {
		let present = |value: &Option<String>| value.as_deref().map_or(false, |value| !value.is_empty());
		present(&self.display_format) || present(&self.display_value_expression)
	}

	#[must_use]
	pub fn active_child_id(&self) -> Option<&str> {
		self.active_child.as_ref().and_then(id_of)
	}

	/// Option `(value, caption)` pairs. Captions fall back to the value.
	#[must_use]
	pub fn options(&self) -> Vec<(&Value, &Value)> {
		let values = self.enum_values.as_deref().unwrap_or_default();
		let names = self.enum_names.as_deref().unwrap_or_default();
		values.iter().enumerate().map(|(i, value)| (value, names.get(i).unwrap_or(value))).collect()
	}
}

/// Extracts an element id from either a plain id string or a model (snapshot) object carrying `id`.
#[must_use]
pub fn id_of(value: &Value) -> Option<&str> {
	match value {
		Value::String(id) => Some(id),
		Value::Object(object) => object.get("id").and_then(Value::as_str),
		_ => None,
	}
}

/// One property mutation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
	pub property_name: String,
	#[serde(default)]
	pub current_value: Value,
	#[serde(default)]
	pub prev_value: Value,
}

impl Change {
	#[must_use]
	pub fn property(&self) -> Property {
		Property::from(self.property_name.as_str())
	}
}

/// A batch of property mutations on one model element, applied in order.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeEvent {
	pub field: FieldModel,
	#[serde(default)]
	pub changes: Vec<Change>,
}

/// The properties the projector knows how to reflect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Property {
	Required,
	ValidationMessage,
	Value,
	Visible,
	Enabled,
	ReadOnly,
	Label,
	Description,
	Items,
	ActiveChild,
	Valid,
	Enum,
	EnumNames,
	/// Newer engines may report properties this crate doesn't know yet. These are ignored.
	Unknown(String),
}

impl From<&str> for Property {
	fn from(name: &str) -> Self {
		match name {
			"required" => Self::Required,
			"validationMessage" => Self::ValidationMessage,
			"value" => Self::Value,
			"visible" => Self::Visible,
			"enabled" => Self::Enabled,
			"readOnly" => Self::ReadOnly,
			"label" => Self::Label,
			"description" => Self::Description,
			"items" => Self::Items,
			"activeChild" => Self::ActiveChild,
			"valid" => Self::Valid,
			"enum" => Self::Enum,
			"enumNames" => Self::EnumNames,
			other => Self::Unknown(other.to_owned()),
		}
	}
}

/// The event streams a form instance can be subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelEventKind {
	FieldChanged,
	FormChanged,
	SubmitSuccess,
	SubmitFailure,
	SubmitError,
}

impl ModelEventKind {
	pub const ALL: [Self; 5] = [Self::FieldChanged, Self::FormChanged, Self::SubmitSuccess, Self::SubmitFailure, Self::SubmitError];

	/// The engine's name for this stream.
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Self::FieldChanged => "fieldChanged",
			Self::FormChanged => "change",
			Self::SubmitSuccess => "submitSuccess",
			Self::SubmitFailure => "submitFailure",
			Self::SubmitError => "submitError",
		}
	}

	#[must_use]
	pub fn parse(name: &str) -> Option<Self> {
		Self::ALL.iter().copied().find(|kind| kind.as_str() == name)
	}
}

#[derive(Debug, Clone)]
pub enum ModelEvent {
	FieldChanged(ChangeEvent),
	/// Changes to the form itself.
	FormChanged(ChangeEvent),
	SubmitSuccess(Value),
	SubmitFailure(Value),
	SubmitError(Value),
}

impl ModelEvent {
	#[must_use]
	pub fn kind(&self) -> ModelEventKind {
		match self {
			Self::FieldChanged(_) => ModelEventKind::FieldChanged,
			Self::FormChanged(_) => ModelEventKind::FormChanged,
			Self::SubmitSuccess(_) => ModelEventKind::SubmitSuccess,
			Self::SubmitFailure(_) => ModelEventKind::SubmitFailure,
			Self::SubmitError(_) => ModelEventKind::SubmitError,
		}
	}

	/// Decodes a payload of the given stream.
	///
	/// # Errors
	///
	/// Iff a change payload doesn't have the shape of a [`ChangeEvent`].
	pub fn from_json(kind: ModelEventKind, payload: Value) -> serde_json::Result<Self> {
		Ok(match kind {
			ModelEventKind::FieldChanged => Self::FieldChanged(serde_json::from_value(payload)?),
			ModelEventKind::FormChanged => Self::FormChanged(serde_json::from_value(payload)?),
			ModelEventKind::SubmitSuccess => Self::SubmitSuccess(payload),
			ModelEventKind::SubmitFailure => Self::SubmitFailure(payload),
			ModelEventKind::SubmitError => Self::SubmitError(payload),
		})
	}
}
