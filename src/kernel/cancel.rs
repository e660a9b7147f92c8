use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use tokio_util::sync::CancellationToken;

/// Single-occupancy slot guarding the logic skill process of one brain.
///
/// At most one skill subprocess runs per slot. A dispatch that cannot
/// acquire the slot is dropped by the caller, never queued.
#[derive(Debug, Clone, Default)]
pub struct ExecutionSlot {
    busy: Arc<AtomicBool>,
}

impl ExecutionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<SlotGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotGuard {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the slot when dropped, whatever the outcome of the run.
#[derive(Debug)]
pub struct SlotGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
