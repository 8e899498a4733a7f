use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::InstanceRegistry;
use crate::component::{Component, InvokeError};
use crate::identity::Identity;

/// Call-site indirection to whatever answers to an identity.
///
/// A handle never caches the instance, so holders observe every swap.
#[derive(Clone)]
pub struct Handle {
	identity: Identity,
	registry: Arc<InstanceRegistry>,
}

impl Handle {
	pub(crate) fn new(identity: Identity, registry: Arc<InstanceRegistry>) -> Self {
		Self { identity, registry }
	}

	pub fn identity(&self) -> &Identity {
		&self.identity
	}

	/// Instance answering right now.
	pub fn current(&self) -> Option<Arc<dyn Component>> {
		self.registry.resolve(self.identity.as_str())
	}

	pub fn is_live(&self) -> bool {
		self.current().is_some()
	}

	pub fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, InvokeError> {
		let instance = self.current().ok_or_else(|| InvokeError::NotInstalled {
			identity: self.identity.to_string(),
		})?;
		instance.invoke(method, args)
	}
}

impl fmt::Debug for Handle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Handle").field("identity", &self.identity).finish()
	}
}
