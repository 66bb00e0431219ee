use core::fmt::{self, Debug, Formatter};
use serde_json::Value;

/// Debug-formats a field value only with the `dangerous-logging` feature enabled; prints its JSON kind otherwise.
pub(crate) struct Redacted<'a>(pub &'a Value);

impl Debug for Redacted<'_> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		if cfg!(feature = "dangerous-logging") {
			return Debug::fmt(self.0, f);
		}

		f.write_str(match self.0 {
			Value::Null => "<null>",
			Value::Bool(_) => "<boolean>",
			Value::Number(_) => "<number>",
			Value::String(_) => "<string>",
			Value::Array(_) => "<array>",
			Value::Object(_) => "<object>",
		})
	}
}
