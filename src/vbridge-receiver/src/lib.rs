//! Host-side shadow tree: the Receiver applies
//! [`vbridge_wire::OperationBatch`]es coming off the wire, exposes a
//! render view over the result, and forwards callback invocations back
//! toward the Guest.
#![warn(missing_docs)]

mod callback;
mod checkpoint;
mod diagnostics;
mod render;
mod stats;
mod tree;
mod update_signal;

pub use callback::Dispatch;
pub use checkpoint::Checkpoint;
pub use diagnostics::InstrumentedReceiver;
pub use render::{RenderOutput, RenderedNode};
pub use stats::{ReceiverDebugInfo, ReceiverStats};
pub use tree::{ApplyOutcome, NodeInstance, Receiver, SkipReason};
pub use update_signal::UpdateSignal;
