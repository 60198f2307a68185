use std::fmt;

/// Identity of a Guest-created renderable, unique within one Engine.
///
/// `0` is reserved for the root container: it is never created and never
/// deleted, and is used as the `parent_id` for top-level operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The reserved id for the implicit root container.
    pub const ROOT: NodeId = NodeId(0);

    /// Whether this id refers to the root container.
    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(v: u32) -> Self {
        NodeId(v)
    }
}

/// Monotonically increasing allocator for [`NodeId`]s, scoped to one Engine.
///
/// Id `0` is reserved for the root container and is never handed out.
#[derive(Debug, Default)]
pub struct NodeIdAllocator {
    next: u32,
}

impl NodeIdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocate the next id. Panics on exhaustion of the 32-bit id space,
    /// which would require ~4 billion live allocations in one Engine.
    pub fn alloc(&mut self) -> NodeId {
        let id = self.next;
        self.next = self
            .next
            .checked_add(1)
            .expect("NodeId space exhausted for this Engine");
        NodeId(id)
    }
}

/// The reserved type tag for text nodes. A text node's `props` map contains
/// exactly one key, `text`.
pub const TEXT_NODE_TYPE: &str = "__TEXT__";

/// Reserved prop key prefix excluded from serialization.
pub const RESERVED_PROP_PREFIX: &str = "__";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_reserved_and_never_allocated() {
        let mut alloc = NodeIdAllocator::new();
        assert!(NodeId::ROOT.is_root());
        let first = alloc.alloc();
        assert_ne!(first, NodeId::ROOT);
        assert_eq!(first, NodeId(1));
    }

    #[test]
    fn allocator_is_monotonic() {
        let mut alloc = NodeIdAllocator::new();
        let a = alloc.alloc();
        let b = alloc.alloc();
        assert!(b.0 > a.0);
    }
}
