use crate::bridge::Diagnostic;
use crate::identity::{Identity, PhysicalVersion};

/// Failures reported to the submitter of a unit.
///
/// None of these cross the indirection boundary: callers going through a
/// [`crate::Handle`] only ever see [`crate::InvokeError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
	/// No self-name could be extracted, or it disagrees with the submitted identity.
	#[error("malformed source: {reason}")]
	MalformedSource { reason: String },

	/// The identity collides with a statically defined unit.
	#[error("'{identity}' is defined statically and cannot be replaced; rename the unit")]
	IdentityConflict { identity: Identity },

	/// The compiler rejected the rewritten source.
	#[error("compilation of {physical} failed:\n{}", render_diagnostics(.diagnostics))]
	Compile {
		physical: PhysicalVersion,
		diagnostics: Vec<Diagnostic>,
	},

	/// The artifact could not be installed into the running process.
	#[error("failed to load {physical}: {reason}")]
	Load {
		physical: PhysicalVersion,
		reason: String,
	},

	/// The new type cannot stand in for the registered one.
	#[error("incompatible replacement for '{identity}': {new_type} cannot be used as {existing_type}")]
	IncompatibleReplacement {
		identity: Identity,
		existing_type: String,
		new_type: String,
	},

	/// A newer reservation of the same identity was installed first.
	#[error("{physical} was superseded by a newer installation of '{identity}'")]
	Superseded {
		identity: Identity,
		physical: PhysicalVersion,
	},

	/// The requested identity or version is unknown.
	#[error("unknown unit or version: {0}")]
	NotFound(String),

	/// The version is currently installed and cannot be discarded.
	#[error("{physical} is the live version of '{identity}'")]
	VersionLive {
		identity: Identity,
		physical: PhysicalVersion,
	},

	/// Internal bookkeeping disagreed with itself.
	#[error("integrity violation: {0}")]
	Integrity(String),
}

impl RegistryError {
	pub(crate) fn malformed(reason: impl Into<String>) -> Self {
		Self::MalformedSource {
			reason: reason.into(),
		}
	}
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
	diagnostics
		.iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join("\n")
}
