use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Coalesces repeated `onUpdate` triggers into a single wakeup, the way a
/// microtask-scheduled flush would: calling [`UpdateSignal::mark`] any
/// number of times before a waiter observes it only wakes that waiter
/// once (spec.md §4.6 "onUpdate is microtask-coalesced, not called once
/// per operation").
#[derive(Clone)]
pub struct UpdateSignal {
    notify: Arc<Notify>,
    dirty: Arc<AtomicBool>,
}

impl UpdateSignal {
    pub fn new() -> Self {
        Self {
            notify: Arc::new(Notify::new()),
            dirty: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag an update. A no-op if a mark is already pending and unobserved.
    pub fn mark(&self) {
        if !self.dirty.swap(true, Ordering::AcqRel) {
            self.notify.notify_one();
        }
    }

    /// Wait for the next coalesced update.
    pub async fn wait(&self) {
        self.notify.notified().await;
        self.dirty.store(false, Ordering::Release);
    }

    /// Non-blocking check: is an update pending right now?
    pub fn is_pending(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}

impl Default for UpdateSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn repeated_marks_before_a_wait_coalesce_into_one_wakeup() {
        let signal = UpdateSignal::new();
        signal.mark();
        signal.mark();
        signal.mark();
        signal.wait().await;
        assert!(!signal.is_pending());
    }
}
