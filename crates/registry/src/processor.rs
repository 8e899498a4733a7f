//! Hooks run against instances entering and leaving the registry.

use std::sync::Arc;

use crate::component::Component;
use crate::identity::Identity;

/// One step of the install/teardown chain.
///
/// A processor may hand on a different instance. Returning `None` stops the
/// chain; the last instance handed on is the one that is used.
pub trait InstanceProcessor: Send + Sync {
	fn on_install(&self, _identity: &Identity, instance: Arc<dyn Component>) -> Option<Arc<dyn Component>> {
		Some(instance)
	}

	fn on_teardown(&self, _identity: &Identity, instance: Arc<dyn Component>) -> Option<Arc<dyn Component>> {
		Some(instance)
	}
}

/// Ordered list of processors.
#[derive(Clone, Default)]
pub struct ProcessorChain {
	processors: Vec<Arc<dyn InstanceProcessor>>,
}

impl ProcessorChain {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, processor: Arc<dyn InstanceProcessor>) {
		self.processors.push(processor);
	}

	pub fn len(&self) -> usize {
		self.processors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.processors.is_empty()
	}

	/// Runs install hooks and returns the instance to register.
	pub fn install(&self, identity: &Identity, instance: Arc<dyn Component>) -> Arc<dyn Component> {
		let mut current = instance;
		for processor in &self.processors {
			match processor.on_install(identity, current.clone()) {
				Some(next) => current = next,
				None => break,
			}
		}
		current
	}

	/// Runs teardown hooks against an instance leaving the registry.
	pub fn teardown(&self, identity: &Identity, instance: Arc<dyn Component>) {
		let mut current = instance;
		for processor in &self.processors {
			match processor.on_teardown(identity, current.clone()) {
				Some(next) => current = next,
				None => break,
			}
		}
	}
}
