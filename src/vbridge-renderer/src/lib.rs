//! Guest-side half of the bridge: the entry points a React-style
//! reconciler's host config calls into, translated to the wire protocol's
//! operation taxonomy and buffered in a [`vbridge_collector::OperationCollector`].
//!
//! The actual reconciler lives in Guest-side JS (a React host config is, by
//! nature, JS glue over whatever native calls are available); this crate
//! is the Rust side of that boundary — allocate ids, track which callback
//! ids a node's props currently reference, and turn one host-config call
//! into one [`vbridge_wire::Operation`].
#![warn(missing_docs)]

mod props;

use std::collections::{HashMap, HashSet};

use vbridge_wire::{NodeId, NodeIdAllocator, Operation, OperationBatch, Value, TEXT_NODE_TYPE};

pub use props::{filter_props, should_set_text_content};

/// Host-config entry points and operation buffering for one Engine's
/// render tree. Not `Sync`: a renderer is driven by exactly one Guest
/// execution context at a time (spec.md §5 "render passes do not overlap
/// within a single Engine").
pub struct Renderer {
    allocator: NodeIdAllocator,
    collector: vbridge_collector::OperationCollector,
    node_fn_ids: HashMap<NodeId, HashSet<String>>,
}

impl Renderer {
    /// A renderer with no nodes yet and id allocation starting after root.
    pub fn new() -> Self {
        Self {
            allocator: NodeIdAllocator::new(),
            collector: vbridge_collector::OperationCollector::new(),
            node_fn_ids: HashMap::new(),
        }
    }

    /// `createInstance`: allocate an id for a host component, filter and
    /// record its props, and emit `CREATE`.
    pub fn create_instance(&mut self, node_type: &str, props: Value) -> NodeId {
        let id = self.allocator.alloc();
        let filtered = props::filter_props(props);
        self.node_fn_ids.insert(id, filtered.collect_fn_ids());
        self.collector.push(Operation::Create {
            id,
            node_type: node_type.to_string(),
            serialized_props: filtered,
        });
        id
    }

    /// `createTextInstance`: allocate an id for a bare text node and emit
    /// the `CREATE`/`TEXT` pair that brings it into existence with content.
    pub fn create_text_instance(&mut self, text: impl Into<String>) -> NodeId {
        let id = self.allocator.alloc();
        self.collector.push(Operation::Create {
            id,
            node_type: TEXT_NODE_TYPE.to_string(),
            serialized_props: Value::Object(Default::default()),
        });
        let text = text.into();
        self.collector.push(Operation::Text { id, text });
        id
    }

    /// `appendChild`/`appendChildToContainer`.
    pub fn append_child(&mut self, parent_id: NodeId, child_id: NodeId) {
        self.collector.push(Operation::Append { parent_id, child_id });
    }

    /// `insertBefore`/`insertInContainerBefore`. `index` is the child's
    /// new position among its siblings, resolved by the caller (the
    /// Receiver is the only place that actually materializes sibling
    /// order — the renderer just forwards the reconciler's placement).
    pub fn insert_before(&mut self, parent_id: NodeId, child_id: NodeId, index: u32) {
        self.collector.push(Operation::Insert {
            parent_id,
            child_id,
            index,
        });
    }

    /// `removeChild`/`removeChildFromContainer`: detach without
    /// destroying. A detached node that is never deleted is a leak the
    /// diagnostics layer can surface, which is why this is a distinct
    /// operation from `DELETE` (spec.md §4.4).
    pub fn remove_child(&mut self, parent_id: NodeId, child_id: NodeId) {
        self.collector.push(Operation::Remove { parent_id, child_id });
    }

    /// `commitUpdate`: diff props, emit `UPDATE`, and return the callback
    /// ids that fell out of the new prop set so the caller can release
    /// them from the callback registry (replacement is atomic; there is
    /// no reference counting, spec.md §4.3).
    pub fn commit_update(
        &mut self,
        id: NodeId,
        next_props: Value,
        removed_prop_keys: Vec<String>,
    ) -> Vec<String> {
        let filtered = props::filter_props(next_props);
        let new_fn_ids = filtered.collect_fn_ids();
        let old_fn_ids = self.node_fn_ids.insert(id, new_fn_ids.clone()).unwrap_or_default();
        let released = old_fn_ids.difference(&new_fn_ids).cloned().collect();

        self.collector.push(Operation::Update {
            id,
            props: filtered,
            removed_props: if removed_prop_keys.is_empty() {
                None
            } else {
                Some(removed_prop_keys)
            },
        });
        released
    }

    /// `commitTextUpdate`.
    pub fn commit_text_update(&mut self, id: NodeId, text: impl Into<String>) {
        self.collector.push(Operation::Text { id, text: text.into() });
    }

    /// `reorder children`: host configs that support `REORDER` (spec.md
    /// §9, not part of the minimal React host-config surface but
    /// available so a sibling-order-only change doesn't need a full
    /// remove/insert pair).
    pub fn reorder_children(&mut self, parent_id: NodeId, child_ids: Vec<NodeId>) {
        self.collector.push(Operation::Reorder { parent_id, child_ids });
    }

    /// Destroy a node outright, emitting `DELETE` and returning every
    /// callback id it was still holding so the caller can release them.
    pub fn delete_node(&mut self, id: NodeId) -> Vec<String> {
        self.collector.push(Operation::Delete { id });
        self.node_fn_ids.remove(&id).map(|set| set.into_iter().collect()).unwrap_or_default()
    }

    /// `clearContainer`: emit a `REMOVE` for every top-level child the
    /// caller reports still live under the container, marking them
    /// pending-delete, then a `DELETE` for each at commit (spec.md §4.4
    /// "unmount"). Returns every callback id they held combined, for one
    /// bulk registry release.
    pub fn clear_container(&mut self, live_ids: impl IntoIterator<Item = NodeId>) -> Vec<String> {
        let mut released = Vec::new();
        let ids: Vec<NodeId> = live_ids.into_iter().collect();
        for id in &ids {
            if let Some(set) = self.node_fn_ids.remove(id) {
                released.extend(set);
            }
            self.collector.push(Operation::Remove { parent_id: NodeId::ROOT, child_id: *id });
        }
        self.collector.synthesize_deletes(ids);
        released
    }

    /// `prepareForCommit`/`resetAfterCommit` hooks. No host-level side
    /// effect is modeled here (no real widget tree to suspend painting
    /// on); kept as named no-ops so the host-config call sequence a
    /// Guest-side shim drives matches the upstream contract one-for-one.
    pub fn prepare_for_commit(&mut self) {}

    /// See [`Renderer::prepare_for_commit`].
    pub fn reset_after_commit(&mut self) {}

    /// Drain the buffered operations into a batch ready for
    /// `__sendToHost`. `None` if nothing was recorded this commit.
    pub fn flush(&mut self) -> Option<OperationBatch> {
        self.collector.flush()
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    #[test]
    fn create_then_flush_emits_single_create_op() {
        let mut renderer = Renderer::new();
        let id = renderer.create_instance("View", Value::Object(StdHashMap::new()));
        let batch = renderer.flush().unwrap();
        assert_eq!(batch.operations.len(), 1);
        assert_eq!(batch.operations[0].primary_node(), id);
    }

    #[test]
    fn update_returns_callback_ids_dropped_from_new_props() {
        let mut renderer = Renderer::new();
        let mut props = StdHashMap::new();
        props.insert(
            "onPress".to_string(),
            Value::Fn(vbridge_wire::FnMarker::new("fn_1_0")),
        );
        let id = renderer.create_instance("Button", Value::Object(props));
        renderer.flush();

        let released = renderer.commit_update(id, Value::Object(StdHashMap::new()), vec!["onPress".into()]);
        assert_eq!(released, vec!["fn_1_0".to_string()]);
    }

    #[test]
    fn delete_node_returns_its_callback_ids() {
        let mut renderer = Renderer::new();
        let mut props = StdHashMap::new();
        props.insert(
            "onPress".to_string(),
            Value::Fn(vbridge_wire::FnMarker::new("fn_1_0")),
        );
        let id = renderer.create_instance("Button", Value::Object(props));
        renderer.flush();

        let released = renderer.delete_node(id);
        assert_eq!(released, vec!["fn_1_0".to_string()]);
    }

    #[test]
    fn clear_container_deletes_every_live_id_and_aggregates_callbacks() {
        let mut renderer = Renderer::new();
        let a = renderer.create_instance("View", Value::Object(StdHashMap::new()));
        let mut props = StdHashMap::new();
        props.insert("onPress".to_string(), Value::Fn(vbridge_wire::FnMarker::new("fn_x")));
        let b = renderer.create_instance("Button", Value::Object(props));
        renderer.flush();

        let released = renderer.clear_container([a, b]);
        assert_eq!(released, vec!["fn_x".to_string()]);
        let batch = renderer.flush().unwrap();
        assert_eq!(batch.operations.len(), 4);
        assert!(matches!(batch.operations[0], Operation::Remove { child_id, .. } if child_id == a));
        assert!(matches!(batch.operations[1], Operation::Remove { child_id, .. } if child_id == b));
        assert!(matches!(batch.operations[2], Operation::Delete { id } if id == a));
        assert!(matches!(batch.operations[3], Operation::Delete { id } if id == b));
    }
}
