use std::fmt;

use parking_lot::Mutex;

use crate::Guard;

/// A guard slot that renews itself.
///
/// Holders of an earlier [`Guard`] from [`CyclicGuard::get`] see it turn
/// invalid; later callers get a fresh, valid one.
pub struct CyclicGuard {
    name: String,
    current: Mutex<(Guard, u64)>,
}

impl CyclicGuard {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let guard = Guard::create(name.clone());
        Self {
            name,
            current: Mutex::new((guard, 0)),
        }
    }

    pub fn get(&self) -> Guard {
        self.current.lock().0.clone()
    }

    /// Number of times the guard has been replaced.
    pub fn generation(&self) -> u64 {
        self.current.lock().1
    }

    pub fn invalidate(&self, reason: impl Into<String>) {
        let old = {
            let mut current = self.current.lock();
            let fresh = Guard::create(self.name.clone());
            current.1 += 1;
            std::mem::replace(&mut current.0, fresh)
        };
        // outside the lock: dependents may call back into `get`
        old.invalidate_with(reason);
    }
}

impl fmt::Debug for CyclicGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CyclicGuard")
            .field("name", &self.name)
            .field("generation", &self.generation())
            .finish()
    }
}
