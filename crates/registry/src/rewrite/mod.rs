//! Turns submitted source into a uniquely named, reference-resolved unit.
//!
//! # Steps
//!
//! 1. Normalize line endings.
//! 2. Extract the declared name and map it to its identity.
//! 3. Refuse identities owned by statically defined units.
//! 4. On reload, rename the unit to a fresh physical name and, if it names no
//!    parent, make the identity's base version its parent.
//! 5. Point every mention of another known unit at that unit's current
//!    version: physical names are first folded back to the identity, then the
//!    identity is replaced with its latest physical name.
//! 6. Reserve the version: source record, ledger entry and referrer edges.
//!
//! Steps 1-5 are pure; a failure there leaves no trace. Callers serialize
//! calls for one identity; see [`crate::live`].

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::bridge::SymbolResolver;
use crate::config::RegistryConfig;
use crate::dialect::Dialect;
use crate::error::RegistryError;
use crate::graph::ReferenceGraph;
use crate::identity::{Generation, GenerationClock, Identity, PhysicalVersion, SuffixClock};
use crate::ledger::VersionLedger;
use crate::store::{SourceRecord, SourceStore};
use crate::text::normalize_line_endings;

#[cfg(test)]
mod tests;

/// A reserved version, ready to compile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rewrite {
	pub identity: Identity,
	pub physical: PhysicalVersion,
	pub generation: Generation,
	/// Exactly the text to hand to the compiler.
	pub source: Arc<str>,
	/// Other identities the source names, sorted.
	pub references: Vec<Identity>,
	/// The identity already had versions.
	pub reload: bool,
}

pub struct Rewriter {
	dialect: Arc<dyn Dialect>,
	ledger: Arc<VersionLedger>,
	graph: Arc<ReferenceGraph>,
	store: Arc<SourceStore>,
	statics: Arc<dyn SymbolResolver>,
	suffixes: SuffixClock,
	generations: GenerationClock,
	config: RegistryConfig,
}

impl Rewriter {
	pub fn new(
		dialect: Arc<dyn Dialect>,
		ledger: Arc<VersionLedger>,
		graph: Arc<ReferenceGraph>,
		store: Arc<SourceStore>,
		statics: Arc<dyn SymbolResolver>,
		config: RegistryConfig,
	) -> Self {
		Self {
			dialect,
			ledger,
			graph,
			store,
			statics,
			suffixes: SuffixClock::new(),
			generations: GenerationClock::new(),
			config,
		}
	}

	pub fn dialect(&self) -> &Arc<dyn Dialect> {
		&self.dialect
	}

	/// Identity the source would be registered under, without reserving anything.
	pub fn identity_of(&self, raw: &str) -> Result<Identity, RegistryError> {
		let source = normalize_line_endings(raw, self.config.unescape_newlines);
		let self_name = self
			.dialect
			.self_name(&source)
			.ok_or_else(|| RegistryError::malformed("source declares no unit name"))?;
		Ok(self.identity_for(&self_name))
	}

	/// Renames mentions of `from` in place. Returns false when there are none.
	fn substitute(&self, source: &mut String, from: &str, to: &str) -> bool {
		let Some(renamed) = self.dialect.rename(source, from, to) else {
			return false;
		};
		*source = renamed;
		true
	}

	fn identity_for(&self, name: &str) -> Identity {
		self.ledger
			.original_of(name)
			.unwrap_or_else(|| Identity::from(name))
	}

	/// Rewrites and reserves one submission.
	///
	/// `requested`, when given, must name the same identity as the source.
	pub fn rewrite(&self, requested: Option<&str>, raw: &str) -> Result<Rewrite, RegistryError> {
		let mut source = normalize_line_endings(raw, self.config.unescape_newlines);

		let self_name = self
			.dialect
			.self_name(&source)
			.ok_or_else(|| RegistryError::malformed("source declares no unit name"))?;
		let identity = self.identity_for(&self_name);
		if let Some(requested) = requested
			&& self.identity_for(requested) != identity
		{
			return Err(RegistryError::malformed(format!(
				"source declares '{self_name}' but was submitted as '{requested}'"
			)));
		}

		let reload = self.ledger.contains(identity.as_str());
		if !reload && self.statics.is_static_unit(identity.as_str()) {
			return Err(RegistryError::IdentityConflict { identity });
		}

		let physical = if reload {
			let physical = PhysicalVersion::from(format!(
				"{identity}{}{}",
				self.config.suffix_separator,
				self.suffixes.next()
			));
			self.substitute(&mut source, &self_name, physical.as_str());
			if self.config.synthesize_parent
				&& let Some(base) = self.ledger.base(identity.as_str())
				&& !self.dialect.declares_parent(&source, physical.as_str())
			{
				tracing::debug!(identity = %identity, base = %base, "attaching base as parent");
				source = self
					.dialect
					.attach_parent(&source, physical.as_str(), base.as_str());
			}
			physical
		} else {
			PhysicalVersion::from(identity.as_str())
		};

		source = self.resolve_references(&identity, source);
		let references = self.references_in(&identity, &source);

		// The source is stored before the ledger names the version, so a reader
		// that finds it through `latest` always finds its source too.
		let source: Arc<str> = Arc::from(source);
		let stored = self.store.insert_new(SourceRecord {
			identity: identity.clone(),
			physical: physical.clone(),
			source: source.clone(),
			artifact: None,
		});
		if !stored {
			return Err(RegistryError::Integrity(format!(
				"source for {physical} is already recorded"
			)));
		}
		let generation = self.generations.next();
		if let Err(err) = self.ledger.register(&identity, &physical, generation) {
			self.store.remove(physical.as_str());
			return Err(err);
		}
		self.graph.set_referrer_edges(&identity, references.iter().cloned());

		tracing::debug!(
			identity = %identity,
			physical = %physical,
			generation = %generation,
			references = references.len(),
			"version reserved"
		);
		Ok(Rewrite {
			identity,
			physical,
			generation,
			source,
			references,
			reload,
		})
	}

	/// Points mentions of other units at their current versions.
	fn resolve_references(&self, own: &Identity, mut source: String) -> String {
		for (physical, identity) in self.ledger.physical_names() {
			if identity == *own || physical.is_original_of(&identity) {
				continue;
			}
			if self.substitute(&mut source, physical.as_str(), identity.as_str()) {
				tracing::trace!(from = %physical, to = %identity, "folded physical name");
			}
		}
		for identity in self.ledger.all_identities() {
			if identity == *own {
				continue;
			}
			let Some(latest) = self.ledger.latest(identity.as_str()) else {
				continue;
			};
			if latest.is_original_of(&identity) {
				continue;
			}
			if self.substitute(&mut source, identity.as_str(), latest.as_str()) {
				tracing::trace!(from = %identity, to = %latest, "pointed at latest version");
			}
		}
		source
	}

	/// Identities other than `own` whose name or any physical name appears in `source`.
	pub fn references_in(&self, own: &Identity, source: &str) -> Vec<Identity> {
		let mut found = BTreeSet::new();
		for (physical, identity) in self.ledger.physical_names() {
			if identity != *own && self.dialect.mentions(source, physical.as_str()) {
				found.insert(identity);
			}
		}
		for identity in self.ledger.all_identities() {
			if identity != *own && self.dialect.mentions(source, identity.as_str()) {
				found.insert(identity);
			}
		}
		found.into_iter().collect()
	}
}
