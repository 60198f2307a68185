use serde::{Deserialize, Serialize};

use crate::node_id::NodeId;
use crate::value::Value;

/// One element of the mutation protocol (spec.md §4.4, §6).
///
/// Tagged on the wire by the `op` field with the exact values
/// `CREATE | UPDATE | APPEND | INSERT | REMOVE | DELETE | REORDER | TEXT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Operation {
    #[serde(rename = "CREATE")]
    Create {
        id: NodeId,
        #[serde(rename = "type")]
        node_type: String,
        #[serde(rename = "props")]
        serialized_props: Value,
    },
    #[serde(rename = "UPDATE")]
    Update {
        id: NodeId,
        props: Value,
        #[serde(rename = "removedProps", skip_serializing_if = "Option::is_none")]
        removed_props: Option<Vec<String>>,
    },
    #[serde(rename = "APPEND")]
    Append {
        #[serde(rename = "parentId")]
        parent_id: NodeId,
        #[serde(rename = "childId")]
        child_id: NodeId,
    },
    #[serde(rename = "INSERT")]
    Insert {
        #[serde(rename = "parentId")]
        parent_id: NodeId,
        #[serde(rename = "childId")]
        child_id: NodeId,
        index: u32,
    },
    #[serde(rename = "REMOVE")]
    Remove {
        #[serde(rename = "parentId")]
        parent_id: NodeId,
        #[serde(rename = "childId")]
        child_id: NodeId,
    },
    #[serde(rename = "DELETE")]
    Delete { id: NodeId },
    #[serde(rename = "REORDER")]
    Reorder {
        #[serde(rename = "parentId")]
        parent_id: NodeId,
        #[serde(rename = "childIds")]
        child_ids: Vec<NodeId>,
    },
    #[serde(rename = "TEXT")]
    Text { id: NodeId, text: String },
}

impl Operation {
    /// The node this operation primarily targets, for attribution/diagnostics.
    pub fn primary_node(&self) -> NodeId {
        match self {
            Operation::Create { id, .. } => *id,
            Operation::Update { id, .. } => *id,
            Operation::Append { child_id, .. } => *child_id,
            Operation::Insert { child_id, .. } => *child_id,
            Operation::Remove { child_id, .. } => *child_id,
            Operation::Delete { id } => *id,
            Operation::Reorder { parent_id, .. } => *parent_id,
            Operation::Text { id, .. } => *id,
        }
    }

    /// Short discriminant name, used for per-type diagnostics attribution.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Operation::Create { .. } => "CREATE",
            Operation::Update { .. } => "UPDATE",
            Operation::Append { .. } => "APPEND",
            Operation::Insert { .. } => "INSERT",
            Operation::Remove { .. } => "REMOVE",
            Operation::Delete { .. } => "DELETE",
            Operation::Reorder { .. } => "REORDER",
            Operation::Text { .. } => "TEXT",
        }
    }
}

/// Ordered sequence of operations dispatched at a single render commit
/// (spec.md §3, §6). Batches are totally ordered per SendToHost channel;
/// `batch_id` strictly increases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationBatch {
    pub version: u32,
    #[serde(rename = "batchId")]
    pub batch_id: u64,
    pub operations: Vec<Operation>,
}

/// The current wire protocol version emitted by this crate's renderer.
pub const WIRE_VERSION: u32 = 1;

impl OperationBatch {
    pub fn new(batch_id: u64, operations: Vec<Operation>) -> Self {
        Self {
            version: WIRE_VERSION,
            batch_id,
            operations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_serializes_with_spec_field_names() {
        let op = Operation::Create {
            id: NodeId(1),
            node_type: "View".to_string(),
            serialized_props: Value::Object(Default::default()),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "CREATE");
        assert_eq!(json["id"], 1);
        assert_eq!(json["type"], "View");
    }

    #[test]
    fn batch_round_trips() {
        let batch = OperationBatch::new(
            1,
            vec![
                Operation::Create {
                    id: NodeId(1),
                    node_type: "View".into(),
                    serialized_props: Value::Object(Default::default()),
                },
                Operation::Append {
                    parent_id: NodeId::ROOT,
                    child_id: NodeId(1),
                },
            ],
        );
        let json = serde_json::to_string(&batch).unwrap();
        let back: OperationBatch = serde_json::from_str(&json).unwrap();
        assert_eq!(batch, back);
    }
}
