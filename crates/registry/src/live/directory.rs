use std::sync::{Arc, Weak};

use crate::component::Directory;
use crate::instances::{Handle, InstanceRegistry};
use crate::ledger::VersionLedger;

/// Resolves identities and physical names to handles.
///
/// Holds weak references: instances keep their directory alive through their
/// link context, and the registry keeps the instances alive.
pub(crate) struct UnitDirectory {
	instances: Weak<InstanceRegistry>,
	ledger: Weak<VersionLedger>,
}

impl UnitDirectory {
	pub(crate) fn new(instances: &Arc<InstanceRegistry>, ledger: &Arc<VersionLedger>) -> Self {
		Self {
			instances: Arc::downgrade(instances),
			ledger: Arc::downgrade(ledger),
		}
	}
}

impl Directory for UnitDirectory {
	fn handle(&self, name: &str) -> Option<Handle> {
		let instances = self.instances.upgrade()?;
		let ledger = self.ledger.upgrade()?;
		let identity = match ledger.original_of(name) {
			Some(identity) => identity,
			None => {
				instances.resolve(name)?;
				name.into()
			}
		};
		Some(instances.handle(&identity))
	}
}
