use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;

use crate::attribution::{Attribution, AttributionEntry};
use crate::sample::ActivitySample;
use crate::timeline::{self, TimelinePoint};

/// Hard cap on retained samples regardless of `activityHistoryMs`, so a
/// pathological caller asking for a multi-hour window can't grow this
/// unbounded (spec.md §4.7 "hard cap ~2000 samples").
pub const MAX_SAMPLES: usize = 2000;

/// The four "what went wrong worst" picks surfaced alongside the rolling
/// rate numbers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorstBatches {
    #[serde(rename = "byOps")]
    pub by_ops: Option<ActivitySample>,
    #[serde(rename = "bySkipped")]
    pub by_skipped: Option<ActivitySample>,
    #[serde(rename = "byFailed")]
    pub by_failed: Option<ActivitySample>,
    #[serde(rename = "byDurationMs")]
    pub by_duration: Option<ActivitySample>,
}

impl WorstBatches {
    fn observe(&mut self, sample: ActivitySample) {
        replace_if_greater(&mut self.by_ops, sample, |s| s.ops);
        replace_if_greater(&mut self.by_skipped, sample, |s| s.skipped);
        replace_if_greater(&mut self.by_failed, sample, |s| s.failed);
        replace_if_greater_f64(&mut self.by_duration, sample, |s| s.apply_duration_ms);
    }
}

fn replace_if_greater(slot: &mut Option<ActivitySample>, candidate: ActivitySample, key: impl Fn(&ActivitySample) -> u64) {
    let should_replace = match slot {
        Some(current) => key(&candidate) > key(current),
        None => true,
    };
    if should_replace {
        *slot = Some(candidate);
    }
}

fn replace_if_greater_f64(slot: &mut Option<ActivitySample>, candidate: ActivitySample, key: impl Fn(&ActivitySample) -> f64) {
    let should_replace = match slot {
        Some(current) => key(&candidate) > key(current),
        None => true,
    };
    if should_replace {
        *slot = Some(candidate);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineSnapshot {
    #[serde(rename = "windowMs")]
    pub window_ms: u64,
    #[serde(rename = "bucketMs")]
    pub bucket_ms: u64,
    pub points: Vec<TimelinePoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivitySnapshot {
    #[serde(rename = "windowMs")]
    pub window_ms: u64,
    #[serde(rename = "opsPerSecond")]
    pub ops_per_second: f64,
    #[serde(rename = "batchesPerSecond")]
    pub batches_per_second: f64,
    #[serde(rename = "totalBatches")]
    pub total_batches: u64,
    #[serde(rename = "totalOps")]
    pub total_ops: u64,
    #[serde(rename = "lastBatch")]
    pub last_batch: Option<ActivitySample>,
    pub timeline: TimelineSnapshot,
    #[serde(rename = "topByOps")]
    pub top_by_ops: Vec<AttributionEntry>,
    #[serde(rename = "topBySkipped")]
    pub top_by_skipped: Vec<AttributionEntry>,
    pub worst: WorstBatches,
}

/// Rolling activity history shared by the Receiver (per-shadow-tree) and
/// the Engine (per-sandbox): records one [`ActivitySample`] per applied
/// batch, trims by age and by [`MAX_SAMPLES`], and answers
/// `getDiagnostics()`'s `activity` sub-object.
pub struct ActivityTracker {
    samples: VecDeque<ActivitySample>,
    history: Duration,
    attribution: Attribution,
    worst: WorstBatches,
    total_batches: u64,
    total_ops: u64,
}

impl ActivityTracker {
    pub fn new(history: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            history,
            attribution: Attribution::new(),
            worst: WorstBatches::default(),
            total_batches: 0,
            total_ops: 0,
        }
    }

    /// Record one batch's outcome. `op_kinds` and `skipped_kinds` are the
    /// `Operation::kind_name()` values this batch touched/skipped, used
    /// for attribution independent of the rolling window.
    pub fn record<'a>(
        &mut self,
        sample: ActivitySample,
        op_kinds: impl IntoIterator<Item = &'a str>,
        skipped_kinds: impl IntoIterator<Item = &'a str>,
    ) {
        self.total_batches += 1;
        self.total_ops += sample.ops;
        self.worst.observe(sample);
        for kind in op_kinds {
            self.attribution.record_op(kind);
        }
        for kind in skipped_kinds {
            self.attribution.record_skip(kind);
        }

        self.samples.push_back(sample);
        self.trim(sample.at);
    }

    fn trim(&mut self, now: u64) {
        let cutoff = now.saturating_sub(self.history.as_millis() as u64);
        while let Some(front) = self.samples.front() {
            if front.at < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
        while self.samples.len() > MAX_SAMPLES {
            self.samples.pop_front();
        }
    }

    /// Snapshot the rolling rates and timeline as of `now`, over the last
    /// `window_ms`, bucketed every `bucket_ms`.
    pub fn snapshot(&self, now: u64, window_ms: u64, bucket_ms: u64) -> ActivitySnapshot {
        let window_start = now.saturating_sub(window_ms);
        let in_window: Vec<ActivitySample> = self
            .samples
            .iter()
            .copied()
            .filter(|s| s.at > window_start && s.at <= now)
            .collect();

        let ops_in_window: u64 = in_window.iter().map(|s| s.ops).sum();
        let batches_in_window = in_window.len() as u64;
        let seconds = (window_ms as f64 / 1000.0).max(f64::EPSILON);

        ActivitySnapshot {
            window_ms,
            ops_per_second: ops_in_window as f64 / seconds,
            batches_per_second: batches_in_window as f64 / seconds,
            total_batches: self.total_batches,
            total_ops: self.total_ops,
            last_batch: self.samples.back().copied(),
            timeline: TimelineSnapshot {
                window_ms,
                bucket_ms,
                points: timeline::bucket(&self.samples.iter().copied().collect::<Vec<_>>(), now, window_ms, bucket_ms),
            },
            top_by_ops: self.attribution.top_by_ops(5),
            top_by_skipped: self.attribution.top_by_skipped(5),
            worst: self.worst.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_samples_older_than_history_window() {
        let mut tracker = ActivityTracker::new(Duration::from_millis(100));
        tracker.record(ActivitySample::new(0, 1, 1, 0, 0, 1.0), ["CREATE"], []);
        tracker.record(ActivitySample::new(200, 1, 1, 0, 0, 1.0), ["CREATE"], []);
        let snapshot = tracker.snapshot(200, 1000, 100);
        // only the second sample is within 100ms of "now"=200
        assert_eq!(snapshot.total_batches, 2, "totals are cumulative, not windowed");
        assert_eq!(tracker.samples.len(), 1);
    }

    #[test]
    fn worst_by_duration_tracks_the_slowest_batch() {
        let mut tracker = ActivityTracker::new(Duration::from_secs(60));
        tracker.record(ActivitySample::new(0, 1, 1, 0, 0, 5.0), ["CREATE"], []);
        tracker.record(ActivitySample::new(1, 1, 1, 0, 0, 50.0), ["CREATE"], []);
        tracker.record(ActivitySample::new(2, 1, 1, 0, 0, 10.0), ["CREATE"], []);
        assert_eq!(tracker.worst.by_duration.unwrap().apply_duration_ms, 50.0);
    }
}
