use std::sync::atomic::{AtomicBool, Ordering};

/// Non-reentrant guard ensuring at most one cleanup pass runs at a time.
#[derive(Debug, Default)]
pub struct PassGuard {
    running: AtomicBool,
}

impl PassGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the guard. Returns `None` while another pass holds it.
    pub fn try_enter(&self) -> Option<PassPermit<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassPermit { guard: self })
    }
}

/// Held for the duration of a pass; releases the guard on drop.
#[derive(Debug)]
pub struct PassPermit<'a> {
    guard: &'a PassGuard,
}

impl Drop for PassPermit<'_> {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
    }
}
