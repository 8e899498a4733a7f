//! Console configuration file.
//!
//! ```toml
//! static_units = ["units/base.kiln"]
//! preload = ["units/greeter.kiln"]
//!
//! [registry]
//! cascade = true
//! suffix_separator = "_"
//!
//! [[static_instance]]
//! identity = "Greeter"
//! unit = "Base"
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::path::{Path, PathBuf};

use kiln_registry::RegistryConfig;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error reading {path}: {error}")]
	Io {
		path: PathBuf,
		error: std::io::Error,
	},

	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// A host default answering for `identity` until a unit is submitted for it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticInstance {
	pub identity: String,
	/// Static unit to instantiate.
	pub unit: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleConfig {
	pub registry: RegistryConfig,
	/// Unit files compiled as host-defined types, in order.
	pub static_units: Vec<PathBuf>,
	pub static_instance: Vec<StaticInstance>,
	/// Unit files submitted at startup, in order.
	pub preload: Vec<PathBuf>,
}

impl ConsoleConfig {
	pub fn parse(content: &str) -> Result<Self> {
		Ok(toml::from_str(content)?)
	}

	/// Loads the file at `path` and anchors its relative paths to the file's directory.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
			path: path.to_path_buf(),
			error: e,
		})?;
		let mut config = Self::parse(&content)?;
		if let Some(dir) = path.parent() {
			config.anchor(dir);
		}
		Ok(config)
	}

	fn anchor(&mut self, dir: &Path) {
		for file in self.static_units.iter_mut().chain(self.preload.iter_mut()) {
			if file.is_relative() {
				*file = dir.join(&*file);
			}
		}
	}
}
