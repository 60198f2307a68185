use std::collections::HashMap;

use serde::Serialize;

/// Cumulative per-operation-kind counters, used to answer "what's been
/// hammering this bridge" (spec.md §4.7 attribution).
#[derive(Debug, Default)]
pub struct Attribution {
    op_counts: HashMap<String, u64>,
    skip_counts: HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttributionEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub count: u64,
}

impl Attribution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_op(&mut self, kind: &str) {
        *self.op_counts.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn record_skip(&mut self, kind: &str) {
        *self.skip_counts.entry(kind.to_string()).or_insert(0) += 1;
    }

    /// Top `n` operation kinds by total volume, descending.
    pub fn top_by_ops(&self, n: usize) -> Vec<AttributionEntry> {
        top_n(&self.op_counts, n)
    }

    /// Top `n` operation kinds by how often they were skipped (protocol
    /// violations, unknown ids), descending.
    pub fn top_by_skipped(&self, n: usize) -> Vec<AttributionEntry> {
        top_n(&self.skip_counts, n)
    }
}

fn top_n(counts: &HashMap<String, u64>, n: usize) -> Vec<AttributionEntry> {
    let mut entries: Vec<AttributionEntry> = counts
        .iter()
        .map(|(kind, count)| AttributionEntry {
            kind: kind.clone(),
            count: *count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.kind.cmp(&b.kind)));
    entries.truncate(n);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_by_ops_sorts_descending() {
        let mut attribution = Attribution::new();
        for _ in 0..5 {
            attribution.record_op("UPDATE");
        }
        for _ in 0..2 {
            attribution.record_op("CREATE");
        }
        let top = attribution.top_by_ops(1);
        assert_eq!(top[0].kind, "UPDATE");
        assert_eq!(top[0].count, 5);
    }
}
