use serde::Deserialize;

/// Registry behavior switches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
	/// Resubmit direct dependents after a reload.
	pub cascade: bool,
	/// Attach the base version as parent of a reload that names none.
	pub synthesize_parent: bool,
	/// Placed between an identity and the suffix of a reload's physical name.
	pub suffix_separator: String,
	/// Also normalize the escaped `\r\n` sequence of JSON payloads.
	pub unescape_newlines: bool,
}

impl Default for RegistryConfig {
	fn default() -> Self {
		Self {
			cascade: true,
			synthesize_parent: true,
			suffix_separator: "_".to_string(),
			unescape_newlines: true,
		}
	}
}
