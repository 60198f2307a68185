//! Hardware-virtualized sandbox grounded on the teacher's
//! `sandbox::{proto_js_sandbox, js_sandbox, loaded_js_sandbox,
//! sandbox_builder}` lifecycle: build an uninitialized VM, register host
//! functions, load a guest binary, then evolve it into a callable
//! instance. Unlike the teacher, this provider does not bundle a guest
//! binary of its own — the guest-side JS interpreter is an external build
//! artifact (the teacher's own `JSRUNTIME` is exactly this, baked in by a
//! separate `build.rs`), so callers supply one via
//! [`NativeVmProvider::with_guest_binary`]. Without one, the provider
//! reports itself unavailable rather than erroring, so `SandboxKind::Auto`
//! falls through to the next variant.

use std::sync::atomic::{AtomicU64, Ordering};

use hyperlight_host::sandbox::uninitialized::UninitializedSandbox;
use hyperlight_host::sandbox::{MultiUseSandbox, SandboxConfiguration};
use hyperlight_host::sandbox_state::sandbox::EvolvableSandbox;
use hyperlight_host::sandbox_state::transition::Noop;
use hyperlight_host::GuestBinary;
use vbridge_wire::{EngineError, Result, Value};

use crate::traits::{Context, EvalMode, HostFn, Provider, Runtime};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

const FN_EVAL: &str = "VbridgeEval";
const FN_SET_GLOBAL: &str = "VbridgeSetGlobal";
const FN_GET_GLOBAL: &str = "VbridgeGetGlobal";

/// Factory for hypervisor-backed sandboxes. Requires both a hypervisor
/// (KVM/mshv) at runtime and a guest binary image implementing the
/// `VbridgeEval`/`VbridgeSetGlobal`/`VbridgeGetGlobal` guest functions.
pub struct NativeVmProvider {
    guest_binary: Option<Vec<u8>>,
}

impl NativeVmProvider {
    pub fn new() -> Self {
        Self { guest_binary: None }
    }

    /// Supply the guest binary image this provider's runtimes should load.
    pub fn with_guest_binary(guest_binary: Vec<u8>) -> Self {
        Self {
            guest_binary: Some(guest_binary),
        }
    }
}

impl Default for NativeVmProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for NativeVmProvider {
    fn name(&self) -> &'static str {
        "native-vm"
    }

    fn is_available(&self) -> bool {
        self.guest_binary.is_some() && hyperlight_host::is_hypervisor_present()
    }

    fn create_runtime(&self) -> Result<Box<dyn Runtime>> {
        let guest_binary = self.guest_binary.clone().ok_or_else(|| {
            EngineError::ExecutionError(
                "native-vm provider has no guest binary configured".into(),
            )
        })?;
        if !hyperlight_host::is_hypervisor_present() {
            return Err(EngineError::ExecutionError(
                "no hypervisor available (KVM/mshv not found)".into(),
            ));
        }
        Ok(Box::new(NativeVmRuntime { guest_binary }))
    }
}

struct NativeVmRuntime {
    guest_binary: Vec<u8>,
}

impl Runtime for NativeVmRuntime {
    fn create_context(&mut self) -> Result<Box<dyn Context>> {
        let config = SandboxConfiguration::default();
        let uninitialized = UninitializedSandbox::new(
            GuestBinary::Buffer(self.guest_binary.clone()),
            Some(config),
        )
        .map_err(|err| EngineError::ExecutionError(format!("uninitialized sandbox: {err}")))?;

        let sandbox: MultiUseSandbox = uninitialized
            .evolve(Noop::default())
            .map_err(|err| EngineError::ExecutionError(format!("evolve sandbox: {err}")))?;

        let id = format!("native-vm-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed));
        Ok(Box::new(NativeVmContext { id, sandbox }))
    }

    fn dispose(self: Box<Self>) {}
}

struct NativeVmContext {
    id: String,
    sandbox: MultiUseSandbox,
}

impl Context for NativeVmContext {
    fn id(&self) -> &str {
        &self.id
    }

    fn eval_mode(&self) -> EvalMode {
        // Every call crosses the host/guest VM-exit boundary; treated as
        // synchronous from here since the round trip is a plain function
        // call, not a channel hop.
        EvalMode::Sync
    }

    fn eval_sync(&mut self, code: &str) -> Result<Value> {
        let json: String = self
            .sandbox
            .call_guest_function::<String>(FN_EVAL, code.to_string())
            .map_err(|err| EngineError::ExecutionError(format!("guest eval call: {err}")))?;
        let raw: serde_json::Value = serde_json::from_str(&json)
            .map_err(|err| EngineError::ProtocolError(err.to_string()))?;
        Value::try_from(raw).map_err(|err| EngineError::ProtocolError(err.to_string()))
    }

    fn set_global(&mut self, name: &str, value: Value) -> Result<()> {
        let json = serde_json::to_string(&value)
            .map_err(|err| EngineError::ProtocolError(err.to_string()))?;
        self.sandbox
            .call_guest_function::<()>(FN_SET_GLOBAL, (name.to_string(), json))
            .map_err(|err| EngineError::ExecutionError(format!("guest set_global call: {err}")))
    }

    fn get_global(&self, name: &str) -> Result<Value> {
        let json: String = self
            .sandbox
            .call_guest_function::<String>(FN_GET_GLOBAL, name.to_string())
            .map_err(|err| EngineError::ExecutionError(format!("guest get_global call: {err}")))?;
        let raw: serde_json::Value = serde_json::from_str(&json)
            .map_err(|err| EngineError::ProtocolError(err.to_string()))?;
        Value::try_from(raw).map_err(|err| EngineError::ProtocolError(err.to_string()))
    }

    fn set_host_function(&mut self, _name: &str, _f: HostFn) -> Result<()> {
        // Registering a new host-callable function requires re-evolving
        // the sandbox with an updated host function set (spec_builder in
        // the teacher's `sandbox_builder.rs`); this provider only exposes
        // the fixed eval/get/set triple a guest binary is built against.
        Err(EngineError::ExecutionError(
            "native-vm provider does not support dynamic host functions after creation".into(),
        ))
    }

    fn dispose(self: Box<Self>) {}
}
