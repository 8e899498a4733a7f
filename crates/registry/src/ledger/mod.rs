//! Identity to physical-version bookkeeping.
//!
//! # Mental model
//!
//! * Each [`Identity`] owns a [`VersionChain`], oldest version first.
//! * Every physical name maps back to exactly one identity.
//! * The *current* version is the newest entry still eligible to answer for the
//!   identity ([`VersionState::Reserved`] or [`VersionState::Live`]).
//! * The *base* is the first version that loaded successfully; reloads descend
//!   from it.
//!
//! # Concurrency
//!
//! Both maps live behind one `RwLock`, so a reader never sees a chain append
//! without its reverse mapping (or the other way around).

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::RegistryError;
use crate::identity::{Generation, Identity, PhysicalVersion};


/// Pipeline state of one physical version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionState {
	/// Minted and recorded; compilation has not finished yet.
	Reserved,
	/// Compiled and loaded into the process.
	Live,
	/// Compilation or loading failed. Kept for history, never current.
	Failed,
	/// Loaded, but the instance registry refused the replacement.
	Rejected,
}

impl VersionState {
	/// Whether a version in this state may be treated as the identity's current one.
	pub const fn is_eligible(self) -> bool {
		matches!(self, Self::Reserved | Self::Live)
	}
}

/// One version in a chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VersionEntry {
	pub physical: PhysicalVersion,
	pub generation: Generation,
	pub state: VersionState,
}

/// Ordered versions of one identity, oldest first.
#[derive(Clone, Debug)]
pub struct VersionChain {
	identity: Identity,
	entries: Vec<VersionEntry>,
}

impl VersionChain {
	fn new(identity: Identity) -> Self {
		Self {
			identity,
			entries: Vec::new(),
		}
	}

	pub fn identity(&self) -> &Identity {
		&self.identity
	}

	pub fn entries(&self) -> &[VersionEntry] {
		&self.entries
	}

	/// Newest entry eligible to answer for the identity.
	pub fn current(&self) -> Option<&VersionEntry> {
		self.entries.iter().rev().find(|e| e.state.is_eligible())
	}

	/// First entry that loaded successfully.
	pub fn base(&self) -> Option<&VersionEntry> {
		self.entries.iter().find(|e| e.state == VersionState::Live)
	}

	fn position(&self, physical: &str) -> Option<usize> {
		self.entries.iter().position(|e| e.physical == physical)
	}
}

/// What [`VersionLedger::remove`] did to the chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Removal {
	pub identity: Identity,
	pub physical: PhysicalVersion,
	/// The removed version was the chain's first entry; the identity is gone.
	pub orphaned: bool,
	/// The removed version was current before removal.
	pub was_current: bool,
	/// Current version after removal, if the identity survives.
	pub new_current: Option<PhysicalVersion>,
}

#[derive(Default)]
struct LedgerState {
	chains: FxHashMap<Identity, VersionChain>,
	origins: FxHashMap<PhysicalVersion, Identity>,
}

/// Maps identities to their version chains.
#[derive(Default)]
pub struct VersionLedger {
	inner: RwLock<LedgerState>,
}

impl VersionLedger {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends `physical` to the identity's chain, creating the chain if absent.
	///
	/// The entry starts out [`VersionState::Reserved`].
	pub fn register(
		&self,
		identity: &Identity,
		physical: &PhysicalVersion,
		generation: Generation,
	) -> Result<(), RegistryError> {
		let mut state = self.inner.write();
		if let Some(owner) = state.origins.get(physical) {
			return Err(RegistryError::Integrity(format!(
				"physical version {physical} already belongs to '{owner}'"
			)));
		}
		state.origins.insert(physical.clone(), identity.clone());
		state
			.chains
			.entry(identity.clone())
			.or_insert_with(|| VersionChain::new(identity.clone()))
			.entries
			.push(VersionEntry {
				physical: physical.clone(),
				generation,
				state: VersionState::Reserved,
			});
		Ok(())
	}

	/// Records the pipeline outcome for a version. Returns false if it is unknown.
	pub fn mark(&self, physical: &str, new_state: VersionState) -> bool {
		let mut state = self.inner.write();
		let Some(identity) = state.origins.get(physical).cloned() else {
			return false;
		};
		let Some(chain) = state.chains.get_mut(&identity) else {
			return false;
		};
		match chain.entries.iter_mut().find(|e| e.physical == physical) {
			Some(entry) => {
				entry.state = new_state;
				true
			}
			None => false,
		}
	}

	/// Current physical version of an identity.
	pub fn latest(&self, identity: &str) -> Option<PhysicalVersion> {
		let state = self.inner.read();
		state
			.chains
			.get(identity)?
			.current()
			.map(|e| e.physical.clone())
	}

	/// First successfully loaded version of an identity.
	pub fn base(&self, identity: &str) -> Option<PhysicalVersion> {
		let state = self.inner.read();
		state.chains.get(identity)?.base().map(|e| e.physical.clone())
	}

	/// Identity a physical version belongs to.
	pub fn original_of(&self, physical: &str) -> Option<Identity> {
		self.inner.read().origins.get(physical).cloned()
	}

	/// Returns true when the identity has a chain.
	pub fn contains(&self, identity: &str) -> bool {
		self.inner.read().chains.contains_key(identity)
	}

	/// Returns the recorded entry for one physical version.
	pub fn entry(&self, physical: &str) -> Option<VersionEntry> {
		let state = self.inner.read();
		let identity = state.origins.get(physical)?;
		let chain = state.chains.get(identity)?;
		chain.entries.iter().find(|e| e.physical == physical).cloned()
	}

	/// All identities, sorted. The returned snapshot can be walked repeatedly.
	pub fn all_identities(&self) -> Vec<Identity> {
		let mut identities: Vec<_> = self.inner.read().chains.keys().cloned().collect();
		identities.sort();
		identities
	}

	/// Every physical name together with its identity, sorted by physical name.
	pub fn physical_names(&self) -> Vec<(PhysicalVersion, Identity)> {
		let mut names: Vec<_> = self
			.inner
			.read()
			.origins
			.iter()
			.map(|(p, i)| (p.clone(), i.clone()))
			.collect();
		names.sort();
		names
	}

	/// Version history of an identity, oldest first.
	pub fn history(&self, identity: &str) -> Option<Vec<PhysicalVersion>> {
		let state = self.inner.read();
		let chain = state.chains.get(identity)?;
		Some(chain.entries.iter().map(|e| e.physical.clone()).collect())
	}

	/// Version history with pipeline states, oldest first.
	pub fn entries(&self, identity: &str) -> Option<Vec<VersionEntry>> {
		let state = self.inner.read();
		state.chains.get(identity).map(|c| c.entries.to_vec())
	}

	/// Removes one version from its chain.
	///
	/// Removing the chain's first entry orphans the identity: the whole chain and
	/// every reverse mapping go with it. Callers must drop the identity's edges
	/// from the reference graph when [`Removal::orphaned`] is set, and recompute
	/// the identity's referrer edges when [`Removal::was_current`] is set.
	pub fn remove(&self, physical: &str) -> Option<Removal> {
		let mut state = self.inner.write();
		let identity = state.origins.get(physical)?.clone();
		let chain = state.chains.get_mut(&identity)?;
		let idx = chain.position(physical)?;
		let was_current = chain.current().is_some_and(|e| e.physical == physical);
		let removed = chain.entries.remove(idx);

		if idx == 0 {
			let chain = state.chains.remove(&identity)?;
			state.origins.remove(physical);
			for entry in chain.entries {
				state.origins.remove(&entry.physical);
			}
			return Some(Removal {
				identity,
				physical: removed.physical,
				orphaned: true,
				was_current,
				new_current: None,
			});
		}

		let new_current = chain.current().map(|e| e.physical.clone());
		state.origins.remove(physical);
		Some(Removal {
			identity,
			physical: removed.physical,
			orphaned: false,
			was_current,
			new_current,
		})
	}

	/// Drops an identity's whole chain and returns its versions, oldest first.
	pub fn remove_identity(&self, identity: &str) -> Vec<PhysicalVersion> {
		let mut state = self.inner.write();
		let Some(chain) = state.chains.remove(identity) else {
			return Vec::new();
		};
		let versions: Vec<_> = chain.entries.into_iter().map(|e| e.physical).collect();
		for physical in &versions {
			state.origins.remove(physical);
		}
		versions
	}
}
