//! Accumulates the [`vbridge_wire::Operation`]s a render pass produces and
//! groups them into commit-boundary [`vbridge_wire::OperationBatch`]es.
//!
//! Grounded on the Host-config mutation recording in
//! `libwebview::js::DomBridge` (buffer mutations as they're produced,
//! flush them as one unit at the framework's commit point) generalized
//! past a single DOM target to the wire protocol's own batch shape.
#![warn(missing_docs)]

use tracing::instrument;
use vbridge_wire::{NodeId, Operation, OperationBatch};

/// Buffers operations between commits. One collector per Engine; the
/// renderer pushes into it as the reconciler walks the tree, and the
/// Engine flushes it once per commit (spec.md §4.2 "operations are never
/// sent one at a time").
#[derive(Debug, Default)]
pub struct OperationCollector {
    pending: Vec<Operation>,
    next_batch_id: u64,
}

impl OperationCollector {
    /// An empty collector with batch ids starting at 1.
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            next_batch_id: 1,
        }
    }

    /// Record one operation produced during the current render pass.
    pub fn push(&mut self, op: Operation) {
        self.pending.push(op);
    }

    /// Record several operations in emission order.
    pub fn push_many(&mut self, ops: impl IntoIterator<Item = Operation>) {
        self.pending.extend(ops);
    }

    /// How many operations are buffered since the last flush.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Synthesize a `DELETE` for every id in `live_ids`, in order. Used by
    /// `clearContainer` (spec.md §9 host-config surface) to tear down a
    /// whole subtree without the renderer walking it node by node.
    pub fn synthesize_deletes(&mut self, live_ids: impl IntoIterator<Item = NodeId>) {
        for id in live_ids {
            self.pending.push(Operation::Delete { id });
        }
    }

    /// Drain the buffer into a fresh batch with the next monotonic batch
    /// id. Returns `None` if nothing was recorded — an empty commit never
    /// produces a batch on the wire (spec.md §4.2).
    #[instrument(skip(self), level = "debug")]
    pub fn flush(&mut self) -> Option<OperationBatch> {
        if self.pending.is_empty() {
            return None;
        }
        let batch_id = self.next_batch_id;
        self.next_batch_id += 1;
        let operations = std::mem::take(&mut self.pending);
        tracing::debug!(batch_id, op_count = operations.len(), "flushing operation batch");
        Some(OperationBatch::new(batch_id, operations))
    }

    /// Discard any buffered operations without emitting them. Used when a
    /// render pass is abandoned (e.g. an error thrown mid-commit).
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbridge_wire::Value;

    fn create_op(id: u32) -> Operation {
        Operation::Create {
            id: NodeId(id),
            node_type: "View".into(),
            serialized_props: Value::Object(Default::default()),
        }
    }

    #[test]
    fn empty_flush_yields_nothing() {
        let mut collector = OperationCollector::new();
        assert!(collector.flush().is_none());
    }

    #[test]
    fn flush_drains_in_push_order_and_bumps_batch_id() {
        let mut collector = OperationCollector::new();
        collector.push(create_op(1));
        collector.push(create_op(2));
        let batch = collector.flush().unwrap();
        assert_eq!(batch.batch_id, 1);
        assert_eq!(batch.operations.len(), 2);
        assert_eq!(collector.pending_count(), 0);

        collector.push(create_op(3));
        let next = collector.flush().unwrap();
        assert_eq!(next.batch_id, 2);
    }

    #[test]
    fn synthesize_deletes_adds_one_delete_per_id_in_order() {
        let mut collector = OperationCollector::new();
        collector.synthesize_deletes([NodeId(1), NodeId(2)]);
        let batch = collector.flush().unwrap();
        assert_eq!(
            batch.operations,
            vec![
                Operation::Delete { id: NodeId(1) },
                Operation::Delete { id: NodeId(2) },
            ]
        );
    }

    #[test]
    fn clear_discards_without_emitting() {
        let mut collector = OperationCollector::new();
        collector.push(create_op(1));
        collector.clear();
        assert!(collector.flush().is_none());
    }
}
