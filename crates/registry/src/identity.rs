//! Unit names and ordering clocks.
//!
//! An [`Identity`] names a logical unit for its whole life. Every submission of
//! source for that unit is realized under a [`PhysicalVersion`]; the first one
//! shares the identity's string, later ones carry a distinguishing suffix minted
//! by [`SuffixClock`]. [`GenerationClock`] orders reservations so that a late
//! installation can never overwrite a newer one.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

macro_rules! name_type {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
		#[serde(transparent)]
		pub struct $name(Arc<str>);

		impl $name {
			/// Creates a new name from any string-like value.
			pub fn new(name: impl Into<Arc<str>>) -> Self {
				Self(name.into())
			}

			/// Returns the name as a string slice.
			#[inline]
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl fmt::Debug for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}({:?})", stringify!($name), &*self.0)
			}
		}

		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}

		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}

		impl From<&str> for $name {
			fn from(name: &str) -> Self {
				Self::new(name)
			}
		}

		impl From<String> for $name {
			fn from(name: String) -> Self {
				Self::new(name)
			}
		}

		impl PartialEq<str> for $name {
			fn eq(&self, other: &str) -> bool {
				&*self.0 == other
			}
		}

		impl PartialEq<&str> for $name {
			fn eq(&self, other: &&str) -> bool {
				&*self.0 == *other
			}
		}
	};
}

name_type! {
	/// Stable logical name of a unit, fixed at first submission.
	Identity
}

name_type! {
	/// One concrete, uniquely named realization of an identity's source.
	PhysicalVersion
}

impl PhysicalVersion {
	/// Returns true when this version is the identity's original name.
	pub fn is_original_of(&self, identity: &Identity) -> bool {
		self.as_str() == identity.as_str()
	}
}

/// Position of a reservation in the process-wide installation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Generation(pub(crate) u64);

impl Generation {
	/// Returns the raw counter value.
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for Generation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "g{}", self.0)
	}
}

/// Monotonic generation clock for reservations.
#[derive(Debug, Default)]
pub struct GenerationClock {
	next: AtomicU64,
}

impl GenerationClock {
	/// Creates a new generation clock starting at generation 1.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the next generation.
	pub fn next(&self) -> Generation {
		Generation(self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1))
	}
}

/// Millisecond clock that never hands out the same value twice.
///
/// Reloads within the same millisecond are pushed forward one tick at a time,
/// so suffixes stay strictly increasing for the life of the process.
#[derive(Debug, Default)]
pub struct SuffixClock {
	last: AtomicU64,
}

impl SuffixClock {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns a suffix strictly greater than every suffix returned before.
	pub fn next(&self) -> u64 {
		let now = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_millis() as u64)
			.unwrap_or_default();
		let mut last = self.last.load(Ordering::Acquire);
		loop {
			let candidate = now.max(last.wrapping_add(1));
			match self
				.last
				.compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Acquire)
			{
				Ok(_) => return candidate,
				Err(actual) => last = actual,
			}
		}
	}
}
