use serde::Serialize;
use vbridge_wire::NodeId;

use crate::tree::Receiver;

/// `getStats()`'s shape: cheap counters safe to poll often.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiverStats {
    #[serde(rename = "nodeCount")]
    pub node_count: usize,
    #[serde(rename = "rootChildCount")]
    pub root_child_count: usize,
    #[serde(rename = "maxDepth")]
    pub max_depth: usize,
}

/// `getDebugInfo()`'s shape: everything in [`ReceiverStats`] plus the
/// per-type node breakdown a developer would want while diagnosing a
/// stuck render (not cheap enough to poll at a high rate).
#[derive(Debug, Clone, Serialize)]
pub struct ReceiverDebugInfo {
    #[serde(flatten)]
    pub stats: ReceiverStats,
    #[serde(rename = "nodeTypeCounts")]
    pub node_type_counts: std::collections::HashMap<String, usize>,
}

impl Receiver {
    /// Cheap summary of tree shape.
    pub fn get_stats(&self) -> ReceiverStats {
        let root_child_count = self.get(NodeId::ROOT).map(|r| r.children.len()).unwrap_or(0);
        ReceiverStats {
            node_count: self.node_count().saturating_sub(1), // exclude the synthetic root
            root_child_count,
            max_depth: self.max_depth(NodeId::ROOT, 0),
        }
    }

    /// Full debug snapshot, including a per-component-type tally.
    pub fn get_debug_info(&self) -> ReceiverDebugInfo {
        let mut node_type_counts = std::collections::HashMap::new();
        for id in self.live_ids() {
            if let Some(node) = self.get(id) {
                *node_type_counts.entry(node.node_type.clone()).or_insert(0) += 1;
            }
        }
        ReceiverDebugInfo {
            stats: self.get_stats(),
            node_type_counts,
        }
    }

    fn max_depth(&self, id: NodeId, depth: usize) -> usize {
        match self.get(id) {
            Some(node) => node
                .children
                .iter()
                .map(|child| self.max_depth(*child, depth + 1))
                .max()
                .unwrap_or(depth),
            None => depth,
        }
    }
}
