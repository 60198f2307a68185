use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::instrument;
use vbridge_registry::ComponentRegistry;
use vbridge_wire::{NodeId, Operation, OperationBatch, Value};

use crate::update_signal::UpdateSignal;

/// One node in the Host-side shadow tree. Mirrors the Guest's element
/// tree one operation behind — this is the tree as the Host has actually
/// applied it, which is why diagnostics and render always read from here
/// rather than from the wire stream directly.
#[derive(Debug, Clone)]
pub struct NodeInstance {
    pub id: NodeId,
    pub node_type: String,
    pub props: Value,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Why an operation was skipped instead of applied (spec.md §4.6
/// precondition table). Receiver never raises these as errors — a
/// malformed batch degrades to warn-and-skip, never a crashed Engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    DuplicateCreate,
    UnknownNode,
    UnknownParent,
    MismatchedDetach,
    RootMutation,
}

/// Outcome of applying one batch: how many operations landed, were
/// skipped, or (fragment-eval edge cases aside) failed outright, plus
/// which ids were torn down — a caller needs that to release any
/// callback ids those nodes were still holding.
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    pub applied: u64,
    pub skipped: u64,
    pub op_kinds: Vec<&'static str>,
    pub skipped_kinds: Vec<&'static str>,
    pub deleted: Vec<NodeId>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Apply an `UPDATE` prop diff in place: drop `removed` keys, then
/// overwrite with whatever `diff` carries (spec.md §4.6 "Merge props
/// (remove removedProps keys, overwrite with new)" — `diff` is a diff of
/// changed props, not the full prop set, so a key absent from both `diff`
/// and `removed` is left untouched).
fn merge_props(existing: &mut Value, diff: Value, removed: Option<Vec<String>>) {
    let Value::Object(ref mut map) = existing else {
        *existing = diff;
        return;
    };
    if let Some(removed) = removed {
        for key in removed {
            map.remove(&key);
        }
    }
    if let Value::Object(diff_map) = diff {
        map.extend(diff_map);
    }
}

/// Host-side shadow tree. Applies [`OperationBatch`]es, enforces the
/// backpressure limit, and answers `render()`/`getStats()`/
/// `getDebugInfo()`.
pub struct Receiver {
    nodes: HashMap<NodeId, NodeInstance>,
    components: ComponentRegistry,
    warned_unknown_components: std::collections::HashSet<String>,
    max_batch_size: Option<usize>,
    update_signal: UpdateSignal,
    last_batch_id: Option<u64>,
}

impl Receiver {
    /// An empty tree with just the root container present.
    pub fn new(components: ComponentRegistry, max_batch_size: Option<usize>) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            NodeId::ROOT,
            NodeInstance {
                id: NodeId::ROOT,
                node_type: "__ROOT__".to_string(),
                props: Value::Null,
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            nodes,
            components,
            warned_unknown_components: std::collections::HashSet::new(),
            max_batch_size,
            update_signal: UpdateSignal::new(),
            last_batch_id: None,
        }
    }

    /// Signal a caller can `.wait()` on for microtask-coalesced update
    /// notification.
    pub fn update_signal(&self) -> UpdateSignal {
        self.update_signal.clone()
    }

    /// Apply one batch. Operations beyond `max_batch_size` are recorded as
    /// skipped rather than applied — the ones within the limit are never
    /// rolled back (spec.md §4.6 "backpressure": do not roll back applied
    /// ones, leave the tree in the partially-applied state).
    #[instrument(skip(self, batch), fields(batch_id = batch.batch_id, op_count = batch.operations.len()))]
    pub fn apply_batch(&mut self, batch: OperationBatch) -> Result<ApplyOutcome, vbridge_wire::EngineError> {
        if let Some(last) = self.last_batch_id {
            if batch.batch_id <= last {
                tracing::warn!(batch_id = batch.batch_id, last, "out-of-order batch id, applying anyway");
            }
        }
        self.last_batch_id = Some(batch.batch_id);

        let limit = self.max_batch_size.unwrap_or(usize::MAX);
        let mut outcome = ApplyOutcome::default();
        for (index, op) in batch.operations.into_iter().enumerate() {
            let kind = op.kind_name();
            if index >= limit {
                outcome.skipped += 1;
                outcome.skipped_kinds.push(kind);
                tracing::warn!(op = kind, limit, "skipped operation: batch exceeds maxBatchSize");
                continue;
            }
            match self.apply_one(op) {
                Ok(deleted) => {
                    outcome.applied += 1;
                    outcome.op_kinds.push(kind);
                    outcome.deleted.extend(deleted);
                }
                Err(reason) => {
                    outcome.skipped += 1;
                    outcome.skipped_kinds.push(kind);
                    tracing::warn!(op = kind, ?reason, "skipped operation");
                }
            }
        }

        self.update_signal.mark();
        Ok(outcome)
    }

    fn apply_one(&mut self, op: Operation) -> Result<Vec<NodeId>, SkipReason> {
        match op {
            Operation::Create { id, node_type, serialized_props } => {
                if self.nodes.contains_key(&id) {
                    return Err(SkipReason::DuplicateCreate);
                }
                self.nodes.insert(
                    id,
                    NodeInstance {
                        id,
                        node_type,
                        props: serialized_props,
                        parent: None,
                        children: Vec::new(),
                    },
                );
                Ok(Vec::new())
            }
            Operation::Update { id, props, removed_props } => {
                let node = self.nodes.get_mut(&id).ok_or(SkipReason::UnknownNode)?;
                merge_props(&mut node.props, props, removed_props);
                Ok(Vec::new())
            }
            Operation::Text { id, text } => {
                let node = self.nodes.get_mut(&id).ok_or(SkipReason::UnknownNode)?;
                node.props = Value::Str(text);
                Ok(Vec::new())
            }
            Operation::Append { parent_id, child_id } => {
                self.attach(parent_id, child_id, None)
            }
            Operation::Insert { parent_id, child_id, index } => {
                self.attach(parent_id, child_id, Some(index as usize))
            }
            Operation::Remove { parent_id, child_id } => {
                self.detach(parent_id, child_id)
            }
            Operation::Delete { id } => self.delete(id),
            Operation::Reorder { parent_id, child_ids } => {
                let parent = self.nodes.get_mut(&parent_id).ok_or(SkipReason::UnknownParent)?;
                let current: std::collections::HashSet<NodeId> = parent.children.iter().copied().collect();
                let requested: std::collections::HashSet<NodeId> = child_ids.iter().copied().collect();
                if current != requested {
                    return Err(SkipReason::MismatchedDetach);
                }
                parent.children = child_ids;
                Ok(Vec::new())
            }
        }
    }

    fn attach(&mut self, parent_id: NodeId, child_id: NodeId, index: Option<usize>) -> Result<Vec<NodeId>, SkipReason> {
        if !self.nodes.contains_key(&child_id) {
            return Err(SkipReason::UnknownNode);
        }
        if !self.nodes.contains_key(&parent_id) {
            return Err(SkipReason::UnknownParent);
        }

        if let Some(old_parent) = self.nodes[&child_id].parent {
            if let Some(old) = self.nodes.get_mut(&old_parent) {
                old.children.retain(|c| *c != child_id);
            }
        }

        let parent = self.nodes.get_mut(&parent_id).expect("checked above");
        let index = index.unwrap_or(parent.children.len()).min(parent.children.len());
        parent.children.insert(index, child_id);

        self.nodes.get_mut(&child_id).expect("checked above").parent = Some(parent_id);
        Ok(Vec::new())
    }

    fn detach(&mut self, parent_id: NodeId, child_id: NodeId) -> Result<Vec<NodeId>, SkipReason> {
        let parent = self.nodes.get_mut(&parent_id).ok_or(SkipReason::UnknownParent)?;
        if !parent.children.contains(&child_id) {
            return Err(SkipReason::MismatchedDetach);
        }
        parent.children.retain(|c| *c != child_id);
        if let Some(child) = self.nodes.get_mut(&child_id) {
            child.parent = None;
        }
        Ok(Vec::new())
    }

    fn delete(&mut self, id: NodeId) -> Result<Vec<NodeId>, SkipReason> {
        if id.is_root() {
            return Err(SkipReason::RootMutation);
        }
        if !self.nodes.contains_key(&id) {
            return Err(SkipReason::UnknownNode);
        }

        let mut deleted = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children.iter().copied());
                deleted.push(current);
            }
        }

        // Detach from whatever parent still references it (DELETE without
        // a prior REMOVE is allowed; the parent link is cleaned up here).
        for node in self.nodes.values_mut() {
            node.children.retain(|c| !deleted.contains(c));
        }

        Ok(deleted)
    }

    /// Look up a node by id.
    pub fn get(&self, id: NodeId) -> Option<&NodeInstance> {
        self.nodes.get(&id)
    }

    /// Number of live nodes, including the root.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every currently-live node id except the root, in no particular
    /// order — used by `clearContainer` on the Guest side to know what
    /// to synthesize `DELETE`s for.
    pub fn live_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().filter(|id| !id.is_root()).collect()
    }

    /// Reset to an empty tree (root only), discarding every node.
    pub fn clear(&mut self) {
        let root = self.nodes.remove(&NodeId::ROOT);
        self.nodes.clear();
        if let Some(mut root) = root {
            root.children.clear();
            self.nodes.insert(NodeId::ROOT, root);
        }
        self.update_signal.mark();
    }

    /// Register (or overwrite) a component after construction — used when
    /// a caller registers components on a live Engine before a bundle's
    /// first render rather than only at Receiver creation time.
    pub fn register_component(&mut self, name: impl Into<String> + std::fmt::Debug, component: vbridge_registry::Component) {
        self.components.register(name, component);
    }

    /// Look up a component, applying the debug-mode-panics/release-mode-
    /// warns-once contract (spec.md §4.5). `warn-once` here means once
    /// per component name per `Receiver`, not once globally.
    pub fn resolve_component(&mut self, name: &str) -> Option<vbridge_registry::Component> {
        match self.components.get(name) {
            Some(component) => Some(component.clone()),
            None => {
                if self.warned_unknown_components.insert(name.to_string()) {
                    tracing::warn!(component = name, "unknown component type, rendering nothing (first occurrence)");
                }
                None
            }
        }
    }

    pub(crate) fn now_ms() -> u64 {
        now_ms()
    }

    /// Deep-clone the current node map, for [`crate::checkpoint::Checkpoint`].
    pub(crate) fn nodes_snapshot(&self) -> HashMap<NodeId, NodeInstance> {
        self.nodes.clone()
    }

    /// Replace the node map wholesale, as a checkpoint restore does.
    pub(crate) fn replace_nodes(&mut self, nodes: HashMap<NodeId, NodeInstance>) {
        self.nodes = nodes;
        self.update_signal.mark();
    }
}
