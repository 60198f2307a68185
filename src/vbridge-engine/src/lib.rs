//! Top-level Engine: owns one sandboxed bundle's Context, shadow tree,
//! and the config/metrics/event machinery around it. Everything else in
//! this workspace is a building block this crate assembles.
#![warn(missing_docs)]

mod bundle;
mod config;
mod engine;
mod listeners;
mod message;
mod metrics;
mod monitor;
mod polyfills;
mod render_bridge;

pub use bundle::BundleSource;
pub use config::{ConfigPatch, EngineConfig, EngineConfigBuilder};
pub use engine::{Engine, EngineHealth};
pub use listeners::{EventEmitter, Listener};
pub use monitor::{ExecutionMonitor, MonitorSet, TimeoutMonitor};
