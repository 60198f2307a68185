use std::collections::HashMap;

use vbridge_wire::NodeId;

use crate::tree::{NodeInstance, Receiver};

/// In-memory snapshot of a shadow tree, for Host-initiated rewind —
/// supplemental to the wire protocol itself (no counterpart on the
/// Guest), useful for an embedder that wants to preview a render and
/// discard it without tearing down the whole Engine.
pub struct Checkpoint {
    nodes: HashMap<NodeId, NodeInstance>,
}

impl Receiver {
    /// Snapshot the tree as it stands right now.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            nodes: self.nodes_snapshot(),
        }
    }

    /// Replace the tree with a previously taken [`Checkpoint`]. Fires the
    /// update signal once, the same as any other mutation.
    pub fn restore_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.replace_nodes(checkpoint.nodes);
    }
}
