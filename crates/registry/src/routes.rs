//! Externally reachable routes bound to live units.
//!
//! The registry only drives a [`Rebinder`]: it unbinds a routable instance
//! before tearing it down and binds its replacement after a successful swap.
//! [`RouteTable`] is the in-process implementation.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

use crate::component::{Component, Directory, InvokeError, TypeInfo};
use crate::identity::Identity;

/// One route: a path dispatched to a method of the owning unit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RouteDescriptor {
	pub path: String,
	pub method: String,
}

impl RouteDescriptor {
	pub fn new(path: impl Into<String>, method: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			method: method.into(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
	#[error("route {path} is already bound to '{owner}'")]
	Conflict { path: String, owner: Identity },

	#[error("no route bound at {0}")]
	Unbound(String),

	#[error(transparent)]
	Invoke(#[from] InvokeError),
}

/// Routing seam driven by the registry.
pub trait Rebinder: Send + Sync {
	fn is_routable(&self, type_info: &TypeInfo) -> bool;

	fn detect_routes(&self, identity: &Identity, instance: &dyn Component) -> Vec<RouteDescriptor>;

	/// Binds `routes` to `identity`, replacing whatever the identity had bound.
	fn bind(&self, identity: &Identity, routes: Vec<RouteDescriptor>) -> Result<(), RouteError>;

	fn unbind(&self, identity: &Identity);
}

/// Rebinder for hosts without routing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRoutes;

impl Rebinder for NoRoutes {
	fn is_routable(&self, _: &TypeInfo) -> bool {
		false
	}

	fn detect_routes(&self, _: &Identity, _: &dyn Component) -> Vec<RouteDescriptor> {
		Vec::new()
	}

	fn bind(&self, _: &Identity, _: Vec<RouteDescriptor>) -> Result<(), RouteError> {
		Ok(())
	}

	fn unbind(&self, _: &Identity) {}
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Binding {
	identity: Identity,
	method: String,
}

/// In-memory path table.
#[derive(Default)]
pub struct RouteTable {
	bindings: RwLock<BTreeMap<String, Binding>>,
}

impl RouteTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Owner and method bound at `path`.
	pub fn lookup(&self, path: &str) -> Option<(Identity, String)> {
		self.bindings
			.read()
			.get(path)
			.map(|b| (b.identity.clone(), b.method.clone()))
	}

	/// Every binding as `(path, identity, method)`, sorted by path.
	pub fn routes(&self) -> Vec<(String, Identity, String)> {
		self.bindings
			.read()
			.iter()
			.map(|(path, b)| (path.clone(), b.identity.clone(), b.method.clone()))
			.collect()
	}

	/// Invokes the unit bound at `path` through its handle.
	pub fn dispatch(
		&self,
		path: &str,
		directory: &dyn Directory,
		args: &[Value],
	) -> Result<Value, RouteError> {
		let (identity, method) = self
			.lookup(path)
			.ok_or_else(|| RouteError::Unbound(path.to_string()))?;
		let handle = directory.handle(identity.as_str()).ok_or_else(|| InvokeError::NotInstalled {
			identity: identity.to_string(),
		})?;
		Ok(handle.invoke(&method, args)?)
	}
}

impl Rebinder for RouteTable {
	fn is_routable(&self, type_info: &TypeInfo) -> bool {
		!type_info.routes.is_empty()
	}

	fn detect_routes(&self, _: &Identity, instance: &dyn Component) -> Vec<RouteDescriptor> {
		instance.type_info().routes.clone()
	}

	fn bind(&self, identity: &Identity, routes: Vec<RouteDescriptor>) -> Result<(), RouteError> {
		let mut bindings = self.bindings.write();
		for route in &routes {
			if let Some(existing) = bindings.get(&route.path)
				&& existing.identity != *identity
			{
				return Err(RouteError::Conflict {
					path: route.path.clone(),
					owner: existing.identity.clone(),
				});
			}
		}
		bindings.retain(|_, b| b.identity != *identity);
		for route in routes {
			tracing::debug!(identity = %identity, path = %route.path, method = %route.method, "route bound");
			bindings.insert(
				route.path,
				Binding {
					identity: identity.clone(),
					method: route.method,
				},
			);
		}
		Ok(())
	}

	fn unbind(&self, identity: &Identity) {
		self.bindings.write().retain(|_, b| b.identity != *identity);
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn bind_replaces_previous_routes_of_identity() {
		let table = RouteTable::new();
		let greeter = Identity::from("Greeter");
		table
			.bind(&greeter, vec![RouteDescriptor::new("/greet", "greet"), RouteDescriptor::new("/old", "old")])
			.unwrap();
		table.bind(&greeter, vec![RouteDescriptor::new("/greet", "hello")]).unwrap();

		assert_eq!(
			table.routes(),
			vec![("/greet".to_string(), greeter.clone(), "hello".to_string())]
		);
		assert!(table.lookup("/old").is_none());
	}

	#[test]
	fn conflicting_path_is_rejected_without_changes() {
		let table = RouteTable::new();
		table
			.bind(&Identity::from("A"), vec![RouteDescriptor::new("/x", "x")])
			.unwrap();
		let err = table
			.bind(&Identity::from("B"), vec![RouteDescriptor::new("/y", "y"), RouteDescriptor::new("/x", "x")])
			.unwrap_err();

		assert_eq!(
			err,
			RouteError::Conflict {
				path: "/x".into(),
				owner: Identity::from("A"),
			}
		);
		assert!(table.lookup("/y").is_none());
	}

	#[test]
	fn unbind_clears_identity() {
		let table = RouteTable::new();
		let a = Identity::from("A");
		table.bind(&a, vec![RouteDescriptor::new("/x", "x")]).unwrap();
		table.unbind(&a);
		assert!(table.routes().is_empty());
	}
}
