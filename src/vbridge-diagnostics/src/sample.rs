use serde::Serialize;

/// One batch's worth of apply outcome, timestamped in milliseconds since
/// the Unix epoch (spec.md §4.7 "activity samples").
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ActivitySample {
    pub at: u64,
    pub ops: u64,
    pub applied: u64,
    pub skipped: u64,
    pub failed: u64,
    #[serde(rename = "applyDurationMs")]
    pub apply_duration_ms: f64,
}

impl ActivitySample {
    pub fn new(at: u64, ops: u64, applied: u64, skipped: u64, failed: u64, apply_duration_ms: f64) -> Self {
        Self {
            at,
            ops,
            applied,
            skipped,
            failed,
            apply_duration_ms,
        }
    }
}
