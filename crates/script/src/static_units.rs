//! Units defined by the host rather than submitted at runtime.
//!
//! Static units resolve through the symbol resolver like any library type:
//! dynamic units may extend or call them, and the registry refuses dynamic
//! units that would take one of their names. They can also be instantiated as
//! static fallback instances for an identity.

use std::sync::Arc;

use kiln_registry::{
	Artifact, CompileUnit, Compiler, Component, Diagnostic, Dialect, Identity, LinkContext,
	Loader, PhysicalVersion, Symbol, SymbolResolver, TypeInfo,
};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::compile::ScriptCompiler;
use crate::dialect::ScriptDialect;
use crate::runtime::ScriptLoader;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StaticUnitError {
	#[error("source declares no unit")]
	NoUnit,

	#[error("static unit '{0}' is already defined")]
	Duplicate(String),

	#[error("static unit '{name}' does not compile:\n{}", render(.diagnostics))]
	Compile {
		name: String,
		diagnostics: Vec<Diagnostic>,
	},

	#[error("unknown static unit '{0}'")]
	Unknown(String),

	#[error("cannot instantiate static unit '{name}': {reason}")]
	Instantiate { name: String, reason: String },
}

fn render(diagnostics: &[Diagnostic]) -> String {
	diagnostics
		.iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join("\n")
}

/// Host-defined units, compiled once and served by name.
#[derive(Default)]
pub struct StaticUnits {
	units: RwLock<FxHashMap<String, Artifact>>,
}

impl StaticUnits {
	pub fn new() -> Self {
		Self::default()
	}

	/// Compiles and records a unit. Earlier definitions are visible to it.
	pub fn define(&self, source: &str) -> Result<Arc<TypeInfo>, StaticUnitError> {
		let name = ScriptDialect
			.self_name(source)
			.ok_or(StaticUnitError::NoUnit)?;
		if self.units.read().contains_key(&name) {
			return Err(StaticUnitError::Duplicate(name));
		}
		let identity = Identity::from(name.as_str());
		let physical = PhysicalVersion::from(name.as_str());
		let unit = CompileUnit {
			identity: &identity,
			physical: &physical,
			source,
		};
		let artifact = ScriptCompiler
			.compile(&unit, self)
			.map_err(|diagnostics| StaticUnitError::Compile {
				name: name.clone(),
				diagnostics,
			})?;
		let info = artifact.type_info().clone();
		tracing::debug!(unit = %name, "static unit defined");
		self.units.write().insert(name, artifact);
		Ok(info)
	}

	pub fn names(&self) -> Vec<String> {
		let mut names: Vec<_> = self.units.read().keys().cloned().collect();
		names.sort();
		names
	}

	/// Builds an instance of a static unit, for use as a fallback.
	pub fn instantiate(&self, name: &str, link: &LinkContext) -> Result<Arc<dyn Component>, StaticUnitError> {
		let artifact = self
			.units
			.read()
			.get(name)
			.cloned()
			.ok_or_else(|| StaticUnitError::Unknown(name.to_string()))?;
		let instantiate_error = |reason| StaticUnitError::Instantiate {
			name: name.to_string(),
			reason,
		};
		let factory = ScriptLoader.load(&artifact).map_err(instantiate_error)?;
		factory.instantiate(link).map_err(instantiate_error)
	}
}

impl SymbolResolver for StaticUnits {
	fn resolve(&self, import_path: &str) -> Vec<Symbol> {
		self.units
			.read()
			.get(import_path)
			.map(|artifact| vec![Symbol::Artifact(artifact.clone())])
			.unwrap_or_default()
	}
}
