//! Live instances per identity, published atomically.
//!
//! # Mental model
//!
//! Each identity owns a [`Slot`]: an optional host-installed *fallback* and an
//! optional dynamic [`Installed`] instance. The dynamic instance answers when
//! present; otherwise the fallback does.
//!
//! # Invariants
//!
//! - The whole map is an immutable snapshot behind an `ArcSwap`. Writers build
//!   the next snapshot and publish it with a compare-and-swap retry loop, so
//!   readers never block and never see a partial update.
//! - A replacement must be substitutable for whatever currently answers.
//! - Installations of one identity never go backwards in [`Generation`].

use std::sync::Arc;

use arc_swap::ArcSwap;
use rustc_hash::FxHashMap;

use crate::component::{Component, TypeInfo};
use crate::error::RegistryError;
use crate::identity::{Generation, Identity, PhysicalVersion};

mod handle;

pub use handle::Handle;

/// A dynamic instance together with the version it was built from.
#[derive(Clone, Debug)]
pub struct Installed {
	pub physical: PhysicalVersion,
	pub generation: Generation,
	pub component: Arc<dyn Component>,
}

#[derive(Clone, Debug, Default)]
struct Slot {
	fallback: Option<Arc<dyn Component>>,
	dynamic: Option<Installed>,
}

impl Slot {
	fn answering(&self) -> Option<&Arc<dyn Component>> {
		self.dynamic
			.as_ref()
			.map(|i| &i.component)
			.or(self.fallback.as_ref())
	}

	fn is_empty(&self) -> bool {
		self.fallback.is_none() && self.dynamic.is_none()
	}
}

#[derive(Clone, Default)]
struct InstanceSnapshot {
	slots: FxHashMap<Identity, Slot>,
}

/// Whether `new` may replace an instance of type `existing`.
///
/// `existing` must appear in the new type's ancestry, or, when `existing` is
/// itself a replacement, its root ancestor must. The new capability set must
/// cover the old one.
pub fn is_compatible(existing: &TypeInfo, new: &TypeInfo) -> bool {
	let substitutable = existing.is_assignable_from(new)
		|| existing
			.root_ancestor()
			.is_some_and(|root| root.is_assignable_from(new));
	substitutable && new.capabilities.is_superset(&existing.capabilities)
}

fn incompatible(identity: &Identity, existing: &TypeInfo, new: &TypeInfo) -> RegistryError {
	RegistryError::IncompatibleReplacement {
		identity: identity.clone(),
		existing_type: existing.to_string(),
		new_type: new.to_string(),
	}
}

#[derive(Default)]
pub struct InstanceRegistry {
	snap: ArcSwap<InstanceSnapshot>,
}

impl InstanceRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Copy-on-write update of one slot.
	///
	/// `f` may run several times if other writers race; it must be pure.
	fn update<R>(
		&self,
		identity: &Identity,
		mut f: impl FnMut(&mut Slot) -> Result<R, RegistryError>,
	) -> Result<R, RegistryError> {
		loop {
			let old = self.snap.load_full();
			let mut slot = old.slots.get(identity).cloned().unwrap_or_default();
			let out = f(&mut slot)?;

			let mut next = InstanceSnapshot::clone(&old);
			if slot.is_empty() {
				next.slots.remove(identity);
			} else {
				next.slots.insert(identity.clone(), slot);
			}
			let prev = self.snap.compare_and_swap(&old, Arc::new(next));
			if Arc::ptr_eq(&prev, &old) {
				return Ok(out);
			}
		}
	}

	/// Registers a host default for `identity`.
	///
	/// Returns the fallback it replaced.
	pub fn install_static(&self, identity: &Identity, instance: Arc<dyn Component>) -> Option<Arc<dyn Component>> {
		self.update(identity, |slot| Ok(slot.fallback.replace(instance.clone())))
			.ok()
			.flatten()
	}

	/// Runs the replacement checks for a type without installing anything.
	pub fn check(&self, identity: &Identity, new: &TypeInfo) -> Result<(), RegistryError> {
		let snap = self.snap.load();
		match snap.slots.get(identity).and_then(Slot::answering) {
			Some(existing) if !is_compatible(existing.type_info(), new) => {
				Err(incompatible(identity, existing.type_info(), new))
			}
			_ => Ok(()),
		}
	}

	/// Makes `installation` the dynamic instance of `identity`.
	///
	/// Returns the dynamic instance it displaced, if any.
	pub fn swap(&self, identity: &Identity, installation: Installed) -> Result<Option<Installed>, RegistryError> {
		self.update(identity, |slot| {
			if let Some(current) = &slot.dynamic
				&& current.generation > installation.generation
			{
				return Err(RegistryError::Superseded {
					identity: identity.clone(),
					physical: installation.physical.clone(),
				});
			}
			if let Some(existing) = slot.answering() {
				let new = installation.component.type_info();
				if !is_compatible(existing.type_info(), new) {
					return Err(incompatible(identity, existing.type_info(), new));
				}
			}
			Ok(slot.dynamic.replace(installation.clone()))
		})
	}

	/// Removes the dynamic instance; a fallback, if any, answers again.
	pub fn remove(&self, identity: &Identity) -> Option<Installed> {
		self.update(identity, |slot| Ok(slot.dynamic.take())).ok().flatten()
	}

	/// Instance currently answering to `identity`.
	pub fn resolve(&self, identity: &str) -> Option<Arc<dyn Component>> {
		self.snap.load().slots.get(identity)?.answering().cloned()
	}

	/// Dynamic instance of `identity`, with its version.
	pub fn installed(&self, identity: &str) -> Option<Installed> {
		self.snap.load().slots.get(identity)?.dynamic.clone()
	}

	pub fn has_fallback(&self, identity: &str) -> bool {
		self.snap
			.load()
			.slots
			.get(identity)
			.is_some_and(|s| s.fallback.is_some())
	}

	/// Identities with any instance, sorted.
	pub fn identities(&self) -> Vec<Identity> {
		let mut ids: Vec<_> = self.snap.load().slots.keys().cloned().collect();
		ids.sort();
		ids
	}

	/// Handle for `identity`. It resolves afresh on every use.
	pub fn handle(self: &Arc<Self>, identity: &Identity) -> Handle {
		Handle::new(identity.clone(), self.clone())
	}
}
