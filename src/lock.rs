//! Single-permit lock serializing generation requests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// At most one generation may be in flight. A second attempt is turned away
/// rather than queued.
#[derive(Debug, Clone, Default)]
pub struct GenerationLock {
    busy: Arc<AtomicBool>,
}

impl GenerationLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the permit if it is free. The permit returns when the guard drops.
    pub fn try_acquire(&self) -> Option<GenerationGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GenerationGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the duration of one generation call
#[derive(Debug)]
pub struct GenerationGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
