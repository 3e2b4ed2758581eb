//! Single-slot cancellable timers
//!
//! Each gate owns one slot per kind of delayed work. Arming a slot aborts
//! whatever it held before. The task that fires carries the generation it
//! was armed with and must check it with [`TimerSlot::finish`] before
//! touching state, so a timer that was replaced while waiting for the lock
//! does nothing.

use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub(crate) struct TimerSlot {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    /// Cancel the pending timer and return the generation for its replacement
    pub(crate) fn rearm(&mut self) -> u64 {
        self.cancel();
        self.generation
    }

    /// Store the task armed with the generation from [`TimerSlot::rearm`]
    pub(crate) fn set(&mut self, handle: JoinHandle<()>) {
        self.handle = Some(handle);
    }

    /// Abort the pending timer, if any
    pub(crate) fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Called by a firing timer; true if it is still the armed one
    pub(crate) fn finish(&mut self, generation: u64) -> bool {
        if self.generation != generation {
            return false;
        }
        self.handle = None;
        true
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
