//! Callback and component registries used to cross the Guest/Host isolation
//! boundary: an id→function map for callbacks, and a name→component
//! whitelist for the Receiver.
#![warn(missing_docs)]

mod callback;
mod component;

pub use callback::{Callback, CallbackRegistry};
pub use component::{Component, ComponentRegistry};
