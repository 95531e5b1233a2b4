//! Non-reentrant busy flags.
//!
//! A second attempt to acquire a held flag fails immediately; callers skip
//! the work instead of queueing behind it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct BusyFlag(AtomicBool);

/// Releases the flag on drop.
#[derive(Debug)]
pub struct BusyGuard<'a>(&'a BusyFlag);

/// Releases the flag on drop; can be moved into a spawned task.
#[derive(Debug)]
pub struct OwnedBusyGuard(Arc<BusyFlag>);

impl BusyFlag {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    fn acquire(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        self.acquire().then_some(BusyGuard(self))
    }

    pub fn try_acquire_owned(self: &Arc<Self>) -> Option<OwnedBusyGuard> {
        self.acquire().then(|| OwnedBusyGuard(self.clone()))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.0.store(false, Ordering::Release);
    }
}

impl Drop for OwnedBusyGuard {
    fn drop(&mut self) {
        self.0.0.store(false, Ordering::Release);
    }
}
