use serde::Serialize;

use crate::sample::ActivitySample;

/// One bucket of the activity timeline. Buckets are left-open,
/// right-closed: a sample at exactly a bucket boundary belongs to the
/// earlier bucket, not the later one (spec.md §4.7), so a burst landing
/// precisely on a tick never double-counts or vanishes between buckets.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TimelinePoint {
    /// End timestamp of this bucket (ms since epoch).
    pub at: u64,
    pub ops: u64,
    pub batches: u64,
}

/// Bucketed view of `samples` over `(window_end - window_ms, window_end]`.
pub fn bucket(samples: &[ActivitySample], window_end: u64, window_ms: u64, bucket_ms: u64) -> Vec<TimelinePoint> {
    if bucket_ms == 0 || window_ms == 0 {
        return Vec::new();
    }
    let window_start = window_end.saturating_sub(window_ms);
    let bucket_count = ((window_ms + bucket_ms - 1) / bucket_ms) as usize;
    let mut points: Vec<TimelinePoint> = (0..bucket_count)
        .map(|i| TimelinePoint {
            at: window_start + (i as u64 + 1) * bucket_ms,
            ops: 0,
            batches: 0,
        })
        .collect();

    for sample in samples {
        if sample.at <= window_start || sample.at > window_end {
            continue;
        }
        let offset = sample.at - window_start;
        let idx = ((offset - 1) / bucket_ms) as usize;
        if let Some(point) = points.get_mut(idx) {
            point.ops += sample.ops;
            point.batches += 1;
        }
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_at(at: u64, ops: u64) -> ActivitySample {
        ActivitySample::new(at, ops, ops, 0, 0, 1.0)
    }

    #[test]
    fn boundary_sample_belongs_to_earlier_bucket() {
        // window (0, 100], bucket size 50 -> buckets (0,50], (50,100]
        let samples = vec![sample_at(50, 3)];
        let points = bucket(&samples, 100, 100, 50);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].ops, 3);
        assert_eq!(points[1].ops, 0);
    }

    #[test]
    fn sample_at_window_start_is_excluded() {
        let samples = vec![sample_at(0, 5)];
        let points = bucket(&samples, 100, 100, 50);
        assert_eq!(points.iter().map(|p| p.ops).sum::<u64>(), 0);
    }

    #[test]
    fn sample_at_window_end_belongs_to_last_bucket() {
        let samples = vec![sample_at(100, 7)];
        let points = bucket(&samples, 100, 100, 50);
        assert_eq!(points[1].ops, 7);
    }
}
