//! Per-session login guard.

use std::sync::atomic::{AtomicBool, Ordering};

/// Ensures a session processes its login at most once.
///
/// The first [`LoginGuard::try_acquire`] wins; every later call returns
/// `false`, including calls racing from other threads.
#[derive(Debug, Default)]
pub struct LoginGuard {
    taken: AtomicBool,
}

impl LoginGuard {
    /// New, unclaimed guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the login. Returns `true` exactly once.
    pub fn try_acquire(&self) -> bool {
        self.taken
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether a login has been claimed.
    pub fn is_taken(&self) -> bool {
        self.taken.load(Ordering::Acquire)
    }
}
