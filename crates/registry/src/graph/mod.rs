//! Textual dependency edges between units.
//!
//! An edge `referrer -> referenced` exists when the referrer's current source
//! names the referenced unit. Edges are only ever replaced wholesale per
//! referrer, so the graph always mirrors the latest rewrite of each unit.

use std::collections::BTreeSet;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::identity::Identity;


#[derive(Default)]
struct Edges {
	/// referenced -> referrers
	dependents: FxHashMap<Identity, BTreeSet<Identity>>,
	/// referrer -> referenced
	references: FxHashMap<Identity, BTreeSet<Identity>>,
}

impl Edges {
	fn clear_referrer(&mut self, referrer: &Identity) {
		let Some(old) = self.references.remove(referrer) else {
			return;
		};
		for referenced in old {
			if let Some(set) = self.dependents.get_mut(&referenced) {
				set.remove(referrer);
				if set.is_empty() {
					self.dependents.remove(&referenced);
				}
			}
		}
	}
}

/// Referrer/referenced index over identities.
#[derive(Default)]
pub struct ReferenceGraph {
	inner: RwLock<Edges>,
}

impl ReferenceGraph {
	pub fn new() -> Self {
		Self::default()
	}

	/// Replaces every edge where `referrer` is the referrer.
	///
	/// Self-references are dropped.
	pub fn set_referrer_edges<I>(&self, referrer: &Identity, referenced: I)
	where
		I: IntoIterator<Item = Identity>,
	{
		let mut edges = self.inner.write();
		edges.clear_referrer(referrer);

		let targets: BTreeSet<Identity> = referenced.into_iter().filter(|r| r != referrer).collect();
		if targets.is_empty() {
			return;
		}
		for target in &targets {
			edges
				.dependents
				.entry(target.clone())
				.or_default()
				.insert(referrer.clone());
		}
		edges.references.insert(referrer.clone(), targets);
	}

	/// Direct referrers of `identity`, sorted. One hop only.
	pub fn dependents_of(&self, identity: &str) -> Vec<Identity> {
		self.inner
			.read()
			.dependents
			.get(identity)
			.map(|set| set.iter().cloned().collect())
			.unwrap_or_default()
	}

	/// Identities the current source of `identity` refers to, sorted.
	pub fn references_of(&self, identity: &str) -> Vec<Identity> {
		self.inner
			.read()
			.references
			.get(identity)
			.map(|set| set.iter().cloned().collect())
			.unwrap_or_default()
	}

	/// Drops every edge where `identity` is either end.
	pub fn remove_all_edges_involving(&self, identity: &Identity) {
		let mut edges = self.inner.write();
		edges.clear_referrer(identity);
		if let Some(referrers) = edges.dependents.remove(identity) {
			for referrer in referrers {
				if let Some(set) = edges.references.get_mut(&referrer) {
					set.remove(identity);
					if set.is_empty() {
						edges.references.remove(&referrer);
					}
				}
			}
		}
	}
}
