//! Sandbox abstraction: a `Provider`/`Runtime`/`Context` trait set with
//! four interchangeable isolation strategies (none, worker, native-vm,
//! embedded), selected explicitly or by [`kind::resolve`]'s auto-probe.
#![warn(missing_docs)]
#![allow(clippy::large_enum_variant)]

mod js_bridge;
mod kind;
mod providers;
mod traits;

pub use kind::{resolve, SandboxKind};
pub use traits::{Context, EvalMode, HostFn, InterruptPredicate, Provider, Runtime};

pub use providers::embedded::EmbeddedProvider;
#[cfg(feature = "native-vm")]
pub use providers::native_vm::NativeVmProvider;
pub use providers::none::NoneProvider;
pub use providers::worker::WorkerProvider;
