use serde::Deserialize;

/// Bridge settings, usually handed in from JavaScript as a plain object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	/// Path prefix of the prefill endpoint. The form id and the page's query string are appended.
	pub data_endpoint: String,
	/// Prepended to relative request URLs, for forms embedded on another origin than their backend.
	pub origin: Option<String>,
	/// Base path custom function modules are resolved against.
	pub code_base_path: Option<String>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			data_endpoint: "/adobe/forms/af/data/".to_owned(),
			origin: None,
			code_base_path: None,
		}
	}
}

impl Config {
	/// Makes a root-relative `path` absolute against [`origin`](`Config::origin`), if one is configured.
	#[must_use]
	pub fn externalize(&self, path: &str) -> String {
		match &self.origin {
			Some(origin) if path.starts_with('/') => format!("{}{}", origin.trim_end_matches('/'), path),
			_ => path.to_owned(),
		}
	}

	#[must_use]
	pub fn prefill_url(&self, form_id: &str, search: &str) -> String {
		self.externalize(&format!("{}{}{}", self.data_endpoint, form_id, search))
	}
}

#[cfg(test)]
mod tests {
	use super::Config;
	use serde_json::json;

	#[test]
	fn defaults() {
		let config: Config = serde_json::from_value(json!({})).unwrap();
		assert_eq!(config, Config::default());
		assert_eq!(config.prefill_url("L2NvbnRlbnQ", "?a=1"), "/adobe/forms/af/data/L2NvbnRlbnQ?a=1");
	}

	#[test]
	fn externalizes_against_origin() {
		let config: Config = serde_json::from_value(json!({ "origin": "https://forms.example.com/" })).unwrap();
		assert_eq!(config.prefill_url("f", ""), "https://forms.example.com/adobe/forms/af/data/f");
		assert_eq!(config.externalize("https://elsewhere/x"), "https://elsewhere/x");
	}
}
