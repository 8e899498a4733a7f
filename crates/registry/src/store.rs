//! Rewritten sources and compiled artifacts, keyed by physical version.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::bridge::Artifact;
use crate::identity::{Identity, PhysicalVersion};

/// Everything kept for one physical version.
#[derive(Clone, Debug)]
pub struct SourceRecord {
	pub identity: Identity,
	pub physical: PhysicalVersion,
	/// Exactly the text handed to the compiler.
	pub source: Arc<str>,
	/// Set once compilation succeeds.
	pub artifact: Option<Artifact>,
}

#[derive(Default)]
pub struct SourceStore {
	records: RwLock<FxHashMap<PhysicalVersion, SourceRecord>>,
}

impl SourceStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, record: SourceRecord) {
		self.records.write().insert(record.physical.clone(), record);
	}

	/// Inserts `record` unless its physical version is already stored.
	pub fn insert_new(&self, record: SourceRecord) -> bool {
		let mut records = self.records.write();
		if records.contains_key(&record.physical) {
			return false;
		}
		records.insert(record.physical.clone(), record);
		true
	}

	pub fn record(&self, physical: &str) -> Option<SourceRecord> {
		self.records.read().get(physical).cloned()
	}

	pub fn source(&self, physical: &str) -> Option<Arc<str>> {
		self.records.read().get(physical).map(|r| r.source.clone())
	}

	/// Attaches a compiled artifact. Returns false if the version is unknown.
	pub fn attach_artifact(&self, physical: &str, artifact: Artifact) -> bool {
		match self.records.write().get_mut(physical) {
			Some(record) => {
				record.artifact = Some(artifact);
				true
			}
			None => false,
		}
	}

	pub fn artifact(&self, physical: &str) -> Option<Artifact> {
		self.records.read().get(physical)?.artifact.clone()
	}

	pub fn remove(&self, physical: &str) -> Option<SourceRecord> {
		self.records.write().remove(physical)
	}

	/// Stored physical names, sorted.
	pub fn names(&self) -> Vec<PhysicalVersion> {
		let mut names: Vec<_> = self.records.read().keys().cloned().collect();
		names.sort();
		names
	}
}
