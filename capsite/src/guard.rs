use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex;

use crate::Invalidated;

type Dependent = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct GuardState {
    reason: Option<String>,
    dependents: Vec<Dependent>,
}

struct GuardShared {
    name: String,
    valid: AtomicBool,
    // the flag is only cleared while this is held, so whoever sees the
    // guard invalid and then takes the lock also sees the reason
    state: Mutex<GuardState>,
}

#[derive(Clone)]
pub struct Guard {
    shared: Arc<GuardShared>,
}

impl Guard {
    #[must_use]
    pub fn create(name: impl Into<String>) -> Self {
        Self::with_state(name.into(), true)
    }

    /// A guard that is invalid from the start.
    #[must_use]
    pub fn never_valid(name: impl Into<String>) -> Self {
        let guard = Self::with_state(name.into(), false);
        guard.shared.state.lock().reason = Some("never valid".to_owned());
        guard
    }

    fn with_state(name: String, valid: bool) -> Self {
        Self {
            shared: Arc::new(GuardShared {
                name,
                valid: AtomicBool::new(valid),
                state: Mutex::new(GuardState::default()),
            }),
        }
    }

    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.shared.valid.load(Ordering::Acquire)
    }

    pub fn all_valid(guards: &[Guard]) -> bool {
        guards.iter().all(Guard::is_valid)
    }

    pub fn invalidate(&self) {
        self.try_invalidate_with(None);
    }

    pub fn invalidate_with(&self, reason: impl Into<String>) {
        self.try_invalidate_with(Some(reason.into()));
    }

    /// Returns `true` if this call was the one that invalidated the guard.
    pub fn try_invalidate(&self) -> bool {
        self.try_invalidate_with(None)
    }

    fn try_invalidate_with(&self, reason: Option<String>) -> bool {
        let dependents = {
            let mut state = self.shared.state.lock();
            if !self.shared.valid.swap(false, Ordering::AcqRel) {
                return false;
            }
            state.reason = reason;
            log::debug!(
                "guard `{}` invalidated{}",
                self.shared.name,
                state
                    .reason
                    .as_deref()
                    .map(|r| format!(": {r}"))
                    .unwrap_or_default()
            );
            std::mem::take(&mut state.dependents)
        };

        // late registrations see the cleared flag under the lock and run
        // themselves, so each dependent runs exactly once
        for dependent in dependents {
            dependent();
        }
        true
    }

    pub fn check(&self) -> Result<(), Invalidated> {
        if self.is_valid() {
            return Ok(());
        }
        Err(Invalidated {
            name: self.shared.name.clone(),
            reason: self.reason(),
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Reason given by the invalidating call, if any.
    pub fn reason(&self) -> Option<String> {
        self.shared.state.lock().reason.clone()
    }

    /// Runs `dependent` once the guard is invalidated, or right away if it
    /// already is.
    pub fn on_invalidate(&self, dependent: impl FnOnce() + Send + 'static) {
        let mut state = self.shared.state.lock();
        if self.is_valid() {
            state.dependents.push(Box::new(dependent));
            return;
        }
        drop(state);
        dependent();
    }

    pub fn ptr_eq(&self, other: &Guard) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("name", &self.shared.name)
            .field("valid", &self.is_valid())
            .field("reason", &self.reason())
            .finish()
    }
}
