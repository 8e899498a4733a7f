//! Loaded unit types and the instances built from them.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::identity::Identity;
use crate::instances::Handle;
use crate::routes::RouteDescriptor;

/// Descriptor of one loaded unit type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
	/// Physical name the type was compiled under.
	pub name: String,
	pub parent: Option<Arc<TypeInfo>>,
	/// Own and inherited method names.
	pub capabilities: BTreeSet<String>,
	/// Declared and inherited routes.
	pub routes: Vec<RouteDescriptor>,
	/// Whether the type is instantiated on load. Not inherited.
	pub component: bool,
}

impl TypeInfo {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			parent: None,
			capabilities: BTreeSet::new(),
			routes: Vec::new(),
			component: true,
		}
	}

	/// Walks the type and then each parent in turn.
	pub fn ancestry(&self) -> impl Iterator<Item = &TypeInfo> {
		std::iter::successors(Some(self), |t| t.parent.as_deref())
	}

	/// Whether a value of type `other` may stand in for this type.
	pub fn is_assignable_from(&self, other: &TypeInfo) -> bool {
		other.ancestry().any(|t| t.name == self.name)
	}

	/// Topmost proper ancestor, or `None` for a type without a parent.
	pub fn root_ancestor(&self) -> Option<&TypeInfo> {
		self.parent.as_deref().map(|p| p.ancestry().last().unwrap_or(p))
	}

	pub fn has_capability(&self, method: &str) -> bool {
		self.capabilities.contains(method)
	}
}

impl fmt::Display for TypeInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut first = true;
		for t in self.ancestry() {
			if !first {
				f.write_str(" < ")?;
			}
			f.write_str(&t.name)?;
			first = false;
		}
		Ok(())
	}
}

/// Failures seen by callers that invoke a unit through a [`Handle`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvokeError {
	#[error("no instance answers to '{identity}'")]
	NotInstalled { identity: String },

	#[error("{type_name} has no method '{method}'")]
	UnknownMethod { type_name: String, method: String },

	#[error("{method} takes {expected} argument(s), {got} given")]
	Arity {
		method: String,
		expected: usize,
		got: usize,
	},

	#[error("{0}")]
	Failed(String),
}

/// A loaded, callable unit instance.
pub trait Component: Send + Sync {
	fn type_info(&self) -> &Arc<TypeInfo>;

	/// Calls `method` with positional arguments.
	fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, InvokeError>;
}

impl fmt::Debug for dyn Component {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Component")
			.field("type", &self.type_info().name)
			.finish_non_exhaustive()
	}
}

/// Name to [`Handle`] resolution offered to loaded code.
///
/// Accepts identities as well as physical names; both resolve to the handle
/// of the owning identity.
pub trait Directory: Send + Sync {
	fn handle(&self, name: &str) -> Option<Handle>;

	/// Identity a name resolves to, if any.
	fn identity_of(&self, name: &str) -> Option<Identity> {
		self.handle(name).map(|h| h.identity().clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn chain(names: &[&str]) -> Arc<TypeInfo> {
		let mut parent: Option<Arc<TypeInfo>> = None;
		for name in names.iter().rev() {
			let mut t = TypeInfo::new(*name);
			t.parent = parent.take();
			parent = Some(Arc::new(t));
		}
		parent.unwrap()
	}

	#[test]
	fn assignability_follows_ancestry() {
		let greeter_2 = chain(&["Greeter_2", "Greeter", "Base"]);
		let greeter = chain(&["Greeter", "Base"]);
		let other = chain(&["Other"]);

		assert!(greeter.is_assignable_from(&greeter_2));
		assert!(!greeter_2.is_assignable_from(&greeter));
		assert!(!greeter.is_assignable_from(&other));
	}

	#[test]
	fn root_ancestor_skips_self() {
		assert_eq!(chain(&["Greeter_2", "Greeter", "Base"]).root_ancestor().unwrap().name, "Base");
		assert_eq!(chain(&["Greeter_2", "Greeter"]).root_ancestor().unwrap().name, "Greeter");
		assert!(chain(&["Greeter"]).root_ancestor().is_none());
	}

	#[test]
	fn display_lists_ancestry() {
		assert_eq!(chain(&["Greeter_2", "Greeter"]).to_string(), "Greeter_2 < Greeter");
	}
}
