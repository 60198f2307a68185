use std::time::{Duration, Instant};

use vbridge_diagnostics::{ActivitySample, ActivitySnapshot, ActivityTracker};
use vbridge_wire::{EngineError, OperationBatch};

use crate::tree::Receiver;

/// Receiver paired with its own [`ActivityTracker`]. Kept as a thin
/// wrapper rather than folded into [`Receiver`] so a caller that doesn't
/// care about diagnostics (most unit tests) can use the bare tree.
pub struct InstrumentedReceiver {
    pub receiver: Receiver,
    tracker: ActivityTracker,
}

impl InstrumentedReceiver {
    pub fn new(receiver: Receiver, history: Duration) -> Self {
        Self {
            receiver,
            tracker: ActivityTracker::new(history),
        }
    }

    /// Apply a batch, timing it and feeding the outcome into the activity
    /// tracker regardless of whether anything was actually skipped.
    pub fn apply_batch(&mut self, batch: OperationBatch) -> Result<(), EngineError> {
        let op_count = batch.operations.len() as u64;
        let started = Instant::now();
        let outcome = self.receiver.apply_batch(batch)?;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let sample = ActivitySample::new(
            Receiver::now_ms(),
            op_count,
            outcome.applied,
            outcome.skipped,
            0,
            elapsed_ms,
        );
        self.tracker.record(
            sample,
            outcome.op_kinds.iter().copied(),
            outcome.skipped_kinds.iter().copied(),
        );
        Ok(())
    }

    pub fn activity_snapshot(&self, window_ms: u64, bucket_ms: u64) -> ActivitySnapshot {
        self.tracker.snapshot(Receiver::now_ms(), window_ms, bucket_ms)
    }
}
