//! Matching model values against the string values of native options.
//!
//! Option inputs only ever hold strings, while the model holds typed values.
//! How the two are compared depends solely on the field's declared value type, never on what the value looks like.

use serde_json::Value;

/// How a model value is matched against an option's string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
	/// The option string is parsed as a number and compared numerically with a numeric model value.
	Number,
	/// The model value's string form is compared with the option string.
	Boolean,
	/// Only a string model value equal to the option string matches.
	Strict,
}

impl ValueType {
	/// Interprets a declared value type such as `"number"` or `"boolean"`.
	///
	/// Array types like `"number[]"` are [`Strict`](`ValueType::Strict`) here; see [`ValueType::of_items`].
	#[must_use]
	pub fn of(declared: Option<&str>) -> Self {
		match declared {
			Some("number") => Self::Number,
			Some("boolean") => Self::Boolean,
			_ => Self::Strict,
		}
	}

	/// Interprets the element type of a declared array type, so `"number[]"` becomes [`Number`](`ValueType::Number`).
	#[must_use]
	pub fn of_items(declared: Option<&str>) -> Self {
		Self::of(declared.map(|declared| declared.replacen("[]", "", 1)).as_deref())
	}
}

/// Whether `field_value` selects the option whose string value is `html_value`.
#[must_use]
pub fn compare(field_value: &Value, html_value: &str, value_type: ValueType) -> bool {
	match value_type {
		ValueType::Number => match field_value.as_f64() {
			Some(number) => number == parse_number(html_value),
			None => false,
		},
		ValueType::Boolean => match field_value {
			Value::Null => false,
			other => to_dom_string(other) == html_value,
		},
		ValueType::Strict => field_value.as_str() == Some(html_value),
	}
}

/// Whether `current` selects the option `html_value` of a radio or checkbox group.
///
/// Arrays select each of their elements (compared by `item_type`), and any value also selects by itself (compared by `value_type`).
#[must_use]
pub fn group_contains(current: &Value, html_value: &str, item_type: ValueType, value_type: ValueType) -> bool {
	let in_array = match current {
		Value::Array(items) => items.iter().any(|item| compare(item, html_value, item_type)),
		_ => false,
	};
	in_array || compare(current, html_value, value_type)
}

/// Numeric conversion of option strings: surrounding whitespace is ignored, blank is zero, anything unparsable never matches.
fn parse_number(text: &str) -> f64 {
	let text = text.trim();
	if text.is_empty() {
		0.0
	} else {
		text.parse().unwrap_or(f64::NAN)
	}
}

/// The string a JSON value turns into when it's written into a DOM property or attribute.
///
/// `null` becomes the empty string, and arrays are joined with commas.
#[must_use]
pub fn to_dom_string(value: &Value) -> String {
	match value {
		Value::Null => String::new(),
		Value::Bool(boolean) => boolean.to_string(),
		Value::Number(number) => match (number.as_i64(), number.as_u64(), number.as_f64()) {
			(Some(integer), _, _) => integer.to_string(),
			(None, Some(integer), _) => integer.to_string(),
			(None, None, Some(float)) if float.fract() == 0.0 && float.abs() < 1e21 => format!("{:.0}", float),
			_ => number.to_string(),
		},
		Value::String(string) => string.clone(),
		Value::Array(items) => items.iter().map(to_dom_string).collect::<Vec<_>>().join(","),
		Value::Object(_) => "[object Object]".to_owned(),
	}
}
