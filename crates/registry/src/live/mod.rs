//! The live registry service.
//!
//! # Mental model
//!
//! A submission runs the full pipeline: rewrite and reserve, compile, load,
//! instantiate, swap. Only rewrite-and-reserve runs under the identity's lock;
//! everything after it runs unlocked and relies on generation ordering in the
//! instance registry to keep a slow, older installation from replacing a newer
//! one. After a successful load the direct dependents are resubmitted once.
//!
//! # Invariants
//!
//! - A version is recorded before it is compiled and stays recorded when
//!   compilation fails, but a failed version is never current.
//! - A rejected replacement leaves the previous instance installed.
//! - An unregistered identity leaves no ledger entry, source, edge, loaded
//!   name or dynamic instance behind.

use std::sync::Arc;

use serde::Serialize;

use crate::bridge::{Bridge, CompileUnit, Compiler, DynamicSymbols, LinkContext, Loader, NoSymbols, SymbolResolver};
use crate::cascade::{CascadeReport, refresh_dependents};
use crate::component::{Component, Directory};
use crate::config::RegistryConfig;
use crate::dialect::Dialect;
use crate::error::RegistryError;
use crate::graph::ReferenceGraph;
use crate::identity::{Identity, PhysicalVersion};
use crate::instances::{Handle, InstanceRegistry, Installed};
use crate::ledger::{Removal, VersionEntry, VersionLedger, VersionState};
use crate::locks::NamedLocks;
use crate::processor::{InstanceProcessor, ProcessorChain};
use crate::rewrite::{Rewrite, Rewriter};
use crate::routes::{NoRoutes, Rebinder};
use crate::store::SourceStore;

mod directory;
#[cfg(test)]
mod tests;

use directory::UnitDirectory;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmitStatus {
	/// A new instance answers to the identity.
	Registered,
	/// The type was loaded but is not a component; nothing was instantiated.
	UpdatedOnly,
}

/// Result of a successful submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Submission {
	pub status: SubmitStatus,
	pub identity: Identity,
	pub physical: PhysicalVersion,
	pub cascade: Vec<CascadeReport>,
	pub warnings: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnregisterStatus {
	Ok,
	NotFound,
}

/// One row of [`LiveRegistry::list_units`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnitSummary {
	pub identity: Identity,
	/// Current version, if the identity has one.
	pub physical: Option<PhysicalVersion>,
	/// Something answers calls to the identity.
	pub live: bool,
	pub routable: bool,
}

pub struct LiveRegistryBuilder {
	dialect: Arc<dyn Dialect>,
	compiler: Arc<dyn Compiler>,
	loader: Arc<dyn Loader>,
	symbols: Arc<dyn SymbolResolver>,
	rebinder: Arc<dyn Rebinder>,
	processors: ProcessorChain,
	config: RegistryConfig,
}

impl LiveRegistryBuilder {
	/// Resolver for units defined outside the registry.
	pub fn symbols(mut self, symbols: Arc<dyn SymbolResolver>) -> Self {
		self.symbols = symbols;
		self
	}

	pub fn rebinder(mut self, rebinder: Arc<dyn Rebinder>) -> Self {
		self.rebinder = rebinder;
		self
	}

	pub fn processor(mut self, processor: Arc<dyn InstanceProcessor>) -> Self {
		self.processors.push(processor);
		self
	}

	pub fn config(mut self, config: RegistryConfig) -> Self {
		self.config = config;
		self
	}

	pub fn build(self) -> LiveRegistry {
		let ledger = Arc::new(VersionLedger::new());
		let graph = Arc::new(ReferenceGraph::new());
		let store = Arc::new(SourceStore::new());
		let instances = Arc::new(InstanceRegistry::new());
		let directory = Arc::new(UnitDirectory::new(&instances, &ledger));
		let rewriter = Rewriter::new(
			self.dialect,
			ledger.clone(),
			graph.clone(),
			store.clone(),
			self.symbols.clone(),
			self.config.clone(),
		);
		LiveRegistry {
			symbols: DynamicSymbols::new(store.clone(), self.symbols),
			bridge: Bridge::new(self.compiler, self.loader),
			rebinder: self.rebinder,
			processors: self.processors,
			config: self.config,
			locks: NamedLocks::new(),
			ledger,
			graph,
			store,
			instances,
			directory,
			rewriter,
		}
	}
}

/// Submission and inspection of live units.
pub struct LiveRegistry {
	config: RegistryConfig,
	ledger: Arc<VersionLedger>,
	graph: Arc<ReferenceGraph>,
	store: Arc<SourceStore>,
	instances: Arc<InstanceRegistry>,
	directory: Arc<UnitDirectory>,
	rewriter: Rewriter,
	bridge: Bridge,
	symbols: DynamicSymbols,
	rebinder: Arc<dyn Rebinder>,
	processors: ProcessorChain,
	locks: NamedLocks,
}

impl LiveRegistry {
	pub fn builder(
		dialect: Arc<dyn Dialect>,
		compiler: Arc<dyn Compiler>,
		loader: Arc<dyn Loader>,
	) -> LiveRegistryBuilder {
		LiveRegistryBuilder {
			dialect,
			compiler,
			loader,
			symbols: Arc::new(NoSymbols),
			rebinder: Arc::new(NoRoutes),
			processors: ProcessorChain::new(),
			config: RegistryConfig::default(),
		}
	}

	pub fn config(&self) -> &RegistryConfig {
		&self.config
	}

	pub fn ledger(&self) -> &VersionLedger {
		&self.ledger
	}

	pub fn instances(&self) -> &Arc<InstanceRegistry> {
		&self.instances
	}

	/// Name resolution for loaded code and route dispatch.
	pub fn directory(&self) -> Arc<dyn Directory> {
		self.directory.clone()
	}

	/// Compiles, loads and installs `source`, then refreshes direct dependents.
	///
	/// `identity`, when given, must match the unit the source declares.
	pub fn submit(&self, identity: Option<&str>, source: &str) -> Result<Submission, RegistryError> {
		let mut submission = self.install(identity, source)?;
		if self.config.cascade {
			submission.cascade = refresh_dependents(self, &submission.identity);
		}
		Ok(submission)
	}

	/// Resubmits the current source of `identity` without cascading.
	pub(crate) fn resubmit(&self, identity: &Identity) -> Result<PhysicalVersion, RegistryError> {
		let latest = self
			.ledger
			.latest(identity.as_str())
			.ok_or_else(|| RegistryError::NotFound(identity.to_string()))?;
		let source = self
			.store
			.source(latest.as_str())
			.ok_or_else(|| RegistryError::Integrity(format!("no source recorded for {latest}")))?;
		self.install(Some(identity.as_str()), &source)
			.map(|submission| submission.physical)
	}

	fn install(&self, requested: Option<&str>, source: &str) -> Result<Submission, RegistryError> {
		let lock_name = self.rewriter.identity_of(source)?;
		let rw = self
			.locks
			.with(lock_name.as_str(), || self.rewriter.rewrite(requested, source))?;

		let span = tracing::info_span!("install", identity = %rw.identity, physical = %rw.physical);
		let _guard = span.enter();

		let result = self.realize(&rw);
		if let Err(err) = &result {
			let state = match err {
				RegistryError::IncompatibleReplacement { .. } | RegistryError::Superseded { .. } => {
					VersionState::Rejected
				}
				_ => VersionState::Failed,
			};
			self.ledger.mark(rw.physical.as_str(), state);
			tracing::warn!(error = %err, state = ?state, "installation failed");
		}
		result
	}

	/// Everything after the reservation: compile, load, instantiate, swap.
	fn realize(&self, rw: &Rewrite) -> Result<Submission, RegistryError> {
		let unit = CompileUnit {
			identity: &rw.identity,
			physical: &rw.physical,
			source: &rw.source,
		};
		let artifact = self.bridge.build(&unit, &self.symbols)?;
		self.store.attach_artifact(rw.physical.as_str(), artifact.clone());
		let factory = self.bridge.load(&artifact)?;
		self.ledger.mark(rw.physical.as_str(), VersionState::Live);

		let mut submission = Submission {
			status: SubmitStatus::Registered,
			identity: rw.identity.clone(),
			physical: rw.physical.clone(),
			cascade: Vec::new(),
			warnings: Vec::new(),
		};

		let type_info = factory.type_info().clone();
		if !type_info.component {
			self.retire(&rw.identity);
			tracing::info!(generation = %rw.generation, "type updated");
			submission.status = SubmitStatus::UpdatedOnly;
			return Ok(submission);
		}

		self.instances.check(&rw.identity, &type_info)?;
		let link = LinkContext::new(self.directory());
		let instance = self.bridge.instantiate(&rw.physical, factory.as_ref(), &link)?;
		let instance = self.processors.install(&rw.identity, instance);

		// Unregister and discard drop versions under the same lock, so a
		// version still in the ledger here cannot vanish before the swap.
		let swapped = self.locks.with(rw.identity.as_str(), || {
			if self.ledger.entry(rw.physical.as_str()).is_none() {
				return Err(RegistryError::NotFound(rw.physical.to_string()));
			}
			self.instances.swap(
				&rw.identity,
				Installed {
					physical: rw.physical.clone(),
					generation: rw.generation,
					component: instance.clone(),
				},
			)
		});
		let previous = match swapped {
			Ok(previous) => previous,
			Err(err) => {
				self.processors.teardown(&rw.identity, instance);
				return Err(err);
			}
		};
		if let Some(previous) = previous {
			if self.rebinder.is_routable(previous.component.type_info()) {
				self.rebinder.unbind(&rw.identity);
			}
			self.processors.teardown(&rw.identity, previous.component);
		}
		if let Err(warning) = self.bind_routes(&rw.identity, instance.as_ref()) {
			submission.warnings.push(warning);
		}

		tracing::info!(generation = %rw.generation, reload = rw.reload, "unit installed");
		Ok(submission)
	}

	fn bind_routes(&self, identity: &Identity, instance: &dyn Component) -> Result<(), String> {
		if !self.rebinder.is_routable(instance.type_info()) {
			return Ok(());
		}
		let routes = self.rebinder.detect_routes(identity, instance);
		self.rebinder.bind(identity, routes).map_err(|err| {
			tracing::warn!(identity = %identity, error = %err, "route binding failed");
			err.to_string()
		})
	}

	/// Unbinds, removes and tears down the dynamic instance of `identity`.
	fn retire(&self, identity: &Identity) {
		let Some(current) = self.instances.installed(identity.as_str()) else {
			return;
		};
		if self.rebinder.is_routable(current.component.type_info()) {
			self.rebinder.unbind(identity);
		}
		self.instances.remove(identity);
		self.processors.teardown(identity, current.component);
		tracing::debug!(identity = %identity, physical = %current.physical, "instance retired");
	}

	/// Removes every trace of `identity`. A static fallback, if any, answers again.
	pub fn unregister(&self, identity: &str) -> UnregisterStatus {
		let Some(identity) = self.ledger.original_of(identity) else {
			return UnregisterStatus::NotFound;
		};
		self.locks.with(identity.as_str(), || {
			self.retire(&identity);
			self.drop_versions(&self.ledger.remove_identity(identity.as_str()));
			self.graph.remove_all_edges_involving(&identity);
		});
		self.locks.forget(identity.as_str());
		tracing::info!(identity = %identity, "unit unregistered");
		UnregisterStatus::Ok
	}

	fn drop_versions(&self, versions: &[PhysicalVersion]) {
		for physical in versions {
			self.store.remove(physical.as_str());
			self.bridge.forget(physical.as_str());
		}
	}

	/// Removes one version from its chain.
	///
	/// The installed version cannot be discarded. Discarding an identity's
	/// original version orphans the identity, which then goes away as if it
	/// had been unregistered.
	pub fn discard_version(&self, physical: &str) -> Result<Removal, RegistryError> {
		let identity = self
			.ledger
			.original_of(physical)
			.ok_or_else(|| RegistryError::NotFound(physical.to_string()))?;
		self.locks.with(identity.as_str(), || {
			if let Some(installed) = self.instances.installed(identity.as_str())
				&& installed.physical == physical
			{
				return Err(RegistryError::VersionLive {
					identity: identity.clone(),
					physical: installed.physical,
				});
			}
			let history = self.ledger.history(identity.as_str()).unwrap_or_default();
			let removal = self
				.ledger
				.remove(physical)
				.ok_or_else(|| RegistryError::NotFound(physical.to_string()))?;

			if removal.orphaned {
				self.retire(&identity);
				self.drop_versions(&history);
				self.graph.remove_all_edges_involving(&identity);
			} else {
				self.drop_versions(std::slice::from_ref(&removal.physical));
				if removal.was_current
					&& let Some(current) = &removal.new_current
					&& let Some(source) = self.store.source(current.as_str())
				{
					let references = self.rewriter.references_in(&identity, &source);
					self.graph.set_referrer_edges(&identity, references);
				}
			}
			tracing::info!(identity = %identity, physical = %removal.physical, orphaned = removal.orphaned, "version discarded");
			Ok(removal)
		})
	}

	/// Every known identity with its current version, sorted by identity.
	pub fn list_units(&self) -> Vec<UnitSummary> {
		let mut identities = self.ledger.all_identities();
		identities.extend(self.instances.identities());
		identities.sort();
		identities.dedup();
		identities
			.into_iter()
			.map(|identity| {
				let instance = self.instances.resolve(identity.as_str());
				UnitSummary {
					physical: self.ledger.latest(identity.as_str()),
					live: instance.is_some(),
					routable: instance.is_some_and(|i| self.rebinder.is_routable(i.type_info())),
					identity,
				}
			})
			.collect()
	}

	/// Source of a physical version, or of an identity's current version.
	pub fn get_source(&self, name: &str) -> Result<Arc<str>, RegistryError> {
		let physical = self
			.ledger
			.latest(name)
			.unwrap_or_else(|| PhysicalVersion::from(name));
		self.store
			.source(physical.as_str())
			.ok_or_else(|| RegistryError::NotFound(name.to_string()))
	}

	pub fn version_history(&self, identity: &str) -> Result<Vec<PhysicalVersion>, RegistryError> {
		self.ledger
			.history(identity)
			.ok_or_else(|| RegistryError::NotFound(identity.to_string()))
	}

	pub fn version_entries(&self, identity: &str) -> Result<Vec<VersionEntry>, RegistryError> {
		self.ledger
			.entries(identity)
			.ok_or_else(|| RegistryError::NotFound(identity.to_string()))
	}

	/// Direct referrers of `identity`, sorted.
	pub fn dependents_of(&self, identity: &str) -> Vec<Identity> {
		self.graph.dependents_of(identity)
	}

	/// Identities the current source of `identity` refers to.
	pub fn references_of(&self, identity: &str) -> Vec<Identity> {
		self.graph.references_of(identity)
	}

	/// Handle for an identity or any of its physical names.
	pub fn handle(&self, name: &str) -> Handle {
		let identity = self
			.ledger
			.original_of(name)
			.unwrap_or_else(|| Identity::from(name));
		self.instances.handle(&identity)
	}

	/// Registers a host default answering while no dynamic instance is installed.
	pub fn install_static(&self, identity: &str, instance: Arc<dyn Component>) {
		let identity = Identity::from(identity);
		tracing::info!(identity = %identity, unit_type = %instance.type_info(), "static instance installed");
		self.instances.install_static(&identity, instance);
	}
}
