use std::sync::Arc;

use crate::providers::{embedded::EmbeddedProvider, none::NoneProvider, worker::WorkerProvider};
use crate::traits::Provider;

#[cfg(feature = "native-vm")]
use crate::providers::native_vm::NativeVmProvider;

/// Which sandbox strategy to use. Mirrors spec.md §4.1's four variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SandboxKind {
    /// Pick the strongest available isolation, in the order embedded →
    /// native VM → worker → none, warning on every fallback step taken
    /// (spec.md §4.1 "Auto-selection").
    #[default]
    Auto,
    /// Same OS thread, same heap as the Host. Isolation: none. Dev-only.
    None,
    /// Separate OS thread, same address space. Isolation: process-level
    /// crash containment only.
    Worker,
    /// Hardware-virtualized guest (Hyperlight). Isolation: strongest.
    NativeVm,
    /// In-process, separate QuickJS heap. Isolation: separate heap, no
    /// thread or address-space boundary.
    Embedded,
}

/// Resolve a [`SandboxKind`] to a concrete [`Provider`].
///
/// For `Auto`, providers are probed in isolation-strength order and the
/// first available one wins; every skipped provider is logged at `warn`
/// so a silent downgrade from native-VM to worker (say, because no
/// hypervisor is present) shows up in logs instead of surprising whoever
/// reads the diagnostics endpoint later.
pub fn resolve(kind: SandboxKind) -> Arc<dyn Provider> {
    match kind {
        SandboxKind::None => Arc::new(NoneProvider::new()),
        SandboxKind::Worker => Arc::new(WorkerProvider::new()),
        SandboxKind::Embedded => Arc::new(EmbeddedProvider::new()),
        #[cfg(feature = "native-vm")]
        SandboxKind::NativeVm => Arc::new(NativeVmProvider::new()),
        #[cfg(not(feature = "native-vm"))]
        SandboxKind::NativeVm => {
            tracing::warn!("native-vm sandbox requested but the native-vm feature is disabled");
            Arc::new(WorkerProvider::new())
        }
        SandboxKind::Auto => auto_select(),
    }
}

fn auto_select() -> Arc<dyn Provider> {
    let embedded = EmbeddedProvider::new();
    if embedded.is_available() {
        return Arc::new(embedded);
    }
    tracing::warn!(tried = "embedded", "sandbox auto-selection: unavailable, falling back");

    #[cfg(feature = "native-vm")]
    {
        let native_vm = NativeVmProvider::new();
        if native_vm.is_available() {
            return Arc::new(native_vm);
        }
        tracing::warn!(tried = "native-vm", "sandbox auto-selection: unavailable, falling back");
    }

    let worker = WorkerProvider::new();
    if worker.is_available() {
        return Arc::new(worker);
    }
    tracing::warn!(tried = "worker", "sandbox auto-selection: unavailable, falling back to none");

    Arc::new(NoneProvider::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_prefers_embedded_over_worker_when_both_available() {
        let provider = auto_select();
        assert_eq!(provider.name(), "embedded");
    }

    #[test]
    fn resolve_none_gives_none_provider() {
        assert_eq!(resolve(SandboxKind::None).name(), "none");
    }
}
