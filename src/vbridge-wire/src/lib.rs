//! Shared wire types for the sandboxed guest UI bridge: node identity, the
//! structured `Value` sum type, the operation/batch taxonomy, Host↔Guest
//! messages, and the error kinds every other crate in this workspace
//! propagates.
#![warn(missing_docs)]
#![allow(clippy::large_enum_variant)]

mod error;
mod message;
mod node_id;
mod ops;
mod value;

pub use error::{EngineError, Result};
pub use message::{GuestEvent, HostMessage};
pub use node_id::{NodeId, NodeIdAllocator, RESERVED_PROP_PREFIX, TEXT_NODE_TYPE};
pub use ops::{Operation, OperationBatch, WIRE_VERSION};
pub use value::{FnMarker, FnMarkerTag, RefMarker, RefMarkerTag, Value};
