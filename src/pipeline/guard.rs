use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::SlotBusy;

/// Admits at most one run at a time for a logical slot, such as one pull request.
#[derive(Debug, Default)]
pub struct RunSlot {
    busy: AtomicBool,
}

/// Holds a [`RunSlot`] until dropped.
#[derive(Debug)]
pub struct RunSlotGuard<'a> {
    slot: &'a RunSlot,
}

impl RunSlot {
    pub fn new() -> Self {
        RunSlot::default()
    }

    /// Takes the slot, or fails at once if it is taken.
    pub fn try_acquire(&self) -> Result<RunSlotGuard<'_>, SlotBusy> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map(|_| RunSlotGuard { slot: self })
            .map_err(|_| SlotBusy)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for RunSlotGuard<'_> {
    fn drop(&mut self) {
        self.slot.busy.store(false, Ordering::Release);
    }
}
