//! Per-name mutual exclusion.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// One lock per name, created on first use.
#[derive(Default)]
pub struct NamedLocks {
	locks: Mutex<FxHashMap<String, Arc<Mutex<()>>>>,
}

impl NamedLocks {
	pub fn new() -> Self {
		Self::default()
	}

	/// Runs `f` while holding the lock for `name`.
	pub fn with<R>(&self, name: &str, f: impl FnOnce() -> R) -> R {
		let lock = {
			let mut locks = self.locks.lock();
			match locks.get(name) {
				Some(lock) => lock.clone(),
				None => {
					let lock = Arc::new(Mutex::new(()));
					locks.insert(name.to_string(), lock.clone());
					lock
				}
			}
		};
		let _guard = lock.lock();
		f()
	}

	/// Drops the lock for `name` once nobody else holds it.
	pub fn forget(&self, name: &str) {
		let mut locks = self.locks.lock();
		if locks.get(name).is_some_and(|l| Arc::strong_count(l) == 1) {
			locks.remove(name);
		}
	}
}
