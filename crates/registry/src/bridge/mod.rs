//! Adapter over the external compiler and loader.
//!
//! The bridge adds nothing to what the collaborators do except bookkeeping: it
//! turns their failures into [`RegistryError`]s and refuses to load the same
//! physical name into the process twice.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::component::{Component, Directory, TypeInfo};
use crate::error::RegistryError;
use crate::identity::{Identity, PhysicalVersion};
use crate::store::SourceStore;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
	Error,
	Warning,
}

impl fmt::Display for Severity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Error => "error",
			Self::Warning => "warning",
		})
	}
}

/// One compiler message, positioned in the rewritten source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
	pub severity: Severity,
	pub message: String,
	/// 1-based.
	pub line: usize,
	/// 1-based.
	pub column: usize,
}

impl Diagnostic {
	pub fn error(message: impl Into<String>, line: usize, column: usize) -> Self {
		Self {
			severity: Severity::Error,
			message: message.into(),
			line,
			column,
		}
	}
}

impl fmt::Display for Diagnostic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}:{}: {}: {}",
			self.line, self.column, self.severity, self.message
		)
	}
}

/// Input to [`Compiler::compile`].
#[derive(Clone, Copy, Debug)]
pub struct CompileUnit<'a> {
	pub identity: &'a Identity,
	pub physical: &'a PhysicalVersion,
	pub source: &'a str,
}

/// Compiled, not yet loaded, unit.
#[derive(Clone)]
pub struct Artifact {
	physical: PhysicalVersion,
	type_info: Arc<TypeInfo>,
	payload: Arc<dyn Any + Send + Sync>,
}

impl Artifact {
	pub fn new(
		physical: PhysicalVersion,
		type_info: Arc<TypeInfo>,
		payload: Arc<dyn Any + Send + Sync>,
	) -> Self {
		Self {
			physical,
			type_info,
			payload,
		}
	}

	pub fn physical(&self) -> &PhysicalVersion {
		&self.physical
	}

	pub fn type_info(&self) -> &Arc<TypeInfo> {
		&self.type_info
	}

	/// Compiler-specific payload, if it has type `T`.
	pub fn payload<T: Any + Send + Sync>(&self) -> Option<&T> {
		self.payload.downcast_ref::<T>()
	}

	/// Shared handle to the payload, if it has type `T`.
	pub fn payload_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
		self.payload.clone().downcast::<T>().ok()
	}
}

impl fmt::Debug for Artifact {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Artifact")
			.field("physical", &self.physical)
			.field("type", &self.type_info.name)
			.finish_non_exhaustive()
	}
}

/// One entry returned by a [`SymbolResolver`].
#[derive(Clone, Debug)]
pub enum Symbol {
	Artifact(Artifact),
	Source(Arc<str>),
}

/// Resolves import paths and unit names to compiled or source entries.
pub trait SymbolResolver: Send + Sync {
	fn resolve(&self, import_path: &str) -> Vec<Symbol>;

	/// Whether `name` is a unit defined outside the registry.
	fn is_static_unit(&self, name: &str) -> bool {
		!self.resolve(name).is_empty()
	}
}

/// Resolver that knows no symbols.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSymbols;

impl SymbolResolver for NoSymbols {
	fn resolve(&self, _import_path: &str) -> Vec<Symbol> {
		Vec::new()
	}
}

/// Symbols for the compiler: dynamic artifacts first, then the host's resolver.
pub struct DynamicSymbols {
	store: Arc<SourceStore>,
	external: Arc<dyn SymbolResolver>,
}

impl DynamicSymbols {
	pub fn new(store: Arc<SourceStore>, external: Arc<dyn SymbolResolver>) -> Self {
		Self { store, external }
	}
}

impl SymbolResolver for DynamicSymbols {
	fn resolve(&self, import_path: &str) -> Vec<Symbol> {
		match self.store.artifact(import_path) {
			Some(artifact) => vec![Symbol::Artifact(artifact)],
			None => self.external.resolve(import_path),
		}
	}

	fn is_static_unit(&self, name: &str) -> bool {
		self.external.is_static_unit(name)
	}
}

pub trait Compiler: Send + Sync {
	/// Compiles one unit. Diagnostics are returned verbatim to the submitter.
	fn compile(
		&self,
		unit: &CompileUnit<'_>,
		symbols: &dyn SymbolResolver,
	) -> Result<Artifact, Vec<Diagnostic>>;
}

pub trait Loader: Send + Sync {
	fn load(&self, artifact: &Artifact) -> Result<Arc<dyn InstanceFactory>, String>;
}

/// Builds instances of one loaded type.
pub trait InstanceFactory: Send + Sync {
	fn type_info(&self) -> &Arc<TypeInfo>;

	fn instantiate(&self, link: &LinkContext) -> Result<Arc<dyn Component>, String>;
}

/// What a new instance may reach at runtime.
#[derive(Clone)]
pub struct LinkContext {
	directory: Arc<dyn Directory>,
}

impl LinkContext {
	pub fn new(directory: Arc<dyn Directory>) -> Self {
		Self { directory }
	}

	pub fn directory(&self) -> &Arc<dyn Directory> {
		&self.directory
	}
}

pub struct Bridge {
	compiler: Arc<dyn Compiler>,
	loader: Arc<dyn Loader>,
	installed: Mutex<FxHashSet<PhysicalVersion>>,
}

impl Bridge {
	pub fn new(compiler: Arc<dyn Compiler>, loader: Arc<dyn Loader>) -> Self {
		Self {
			compiler,
			loader,
			installed: Mutex::new(FxHashSet::default()),
		}
	}

	pub fn build(
		&self,
		unit: &CompileUnit<'_>,
		symbols: &dyn SymbolResolver,
	) -> Result<Artifact, RegistryError> {
		self.compiler
			.compile(unit, symbols)
			.map_err(|diagnostics| RegistryError::Compile {
				physical: unit.physical.clone(),
				diagnostics,
			})
	}

	/// Loads an artifact into the process.
	///
	/// A physical name can be loaded once; a second attempt fails without
	/// reaching the loader.
	pub fn load(&self, artifact: &Artifact) -> Result<Arc<dyn InstanceFactory>, RegistryError> {
		let physical = artifact.physical();
		if !self.installed.lock().insert(physical.clone()) {
			tracing::error!(physical = %physical, "physical version already loaded");
			return Err(RegistryError::Load {
				physical: physical.clone(),
				reason: "a unit with this physical name is already loaded".into(),
			});
		}
		self.loader.load(artifact).map_err(|reason| {
			self.installed.lock().remove(physical);
			tracing::error!(physical = %physical, %reason, "load failed");
			RegistryError::Load {
				physical: physical.clone(),
				reason,
			}
		})
	}

	pub fn instantiate(
		&self,
		physical: &PhysicalVersion,
		factory: &dyn InstanceFactory,
		link: &LinkContext,
	) -> Result<Arc<dyn Component>, RegistryError> {
		factory
			.instantiate(link)
			.map_err(|reason| RegistryError::Load {
				physical: physical.clone(),
				reason,
			})
	}

	/// Releases the loaded-name guard for `physical`.
	pub fn forget(&self, physical: &str) {
		self.installed.lock().remove(physical);
	}

	pub fn is_loaded(&self, physical: &str) -> bool {
		self.installed.lock().contains(physical)
	}
}
