//! One-hop resubmission of direct dependents after a reload.

use serde::Serialize;
use serde::ser::SerializeStruct;

use crate::error::RegistryError;
use crate::identity::{Identity, PhysicalVersion};
use crate::live::LiveRegistry;

/// Outcome of resubmitting one dependent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CascadeReport {
	pub identity: Identity,
	pub result: Result<PhysicalVersion, RegistryError>,
}

impl Serialize for CascadeReport {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut s = serializer.serialize_struct("CascadeReport", 3)?;
		s.serialize_field("identity", &self.identity)?;
		match &self.result {
			Ok(physical) => {
				s.serialize_field("ok", &true)?;
				s.serialize_field("physical", physical)?;
			}
			Err(err) => {
				s.serialize_field("ok", &false)?;
				s.serialize_field("error", &err.to_string())?;
			}
		}
		s.end()
	}
}

/// Resubmits the latest recorded source of every direct dependent of `identity`.
///
/// Failures are reported per dependent and never stop the siblings. The
/// resubmissions themselves do not cascade.
pub(crate) fn refresh_dependents(registry: &LiveRegistry, identity: &Identity) -> Vec<CascadeReport> {
	let dependents = registry.dependents_of(identity.as_str());
	if !dependents.is_empty() {
		tracing::debug!(identity = %identity, dependents = dependents.len(), "cascading");
	}
	dependents
		.into_iter()
		.map(|dependent| {
			let result = registry.resubmit(&dependent);
			if let Err(err) = &result {
				tracing::warn!(identity = %identity, dependent = %dependent, error = %err, "cascade failed");
			}
			CascadeReport {
				identity: dependent,
				result,
			}
		})
		.collect()
}
