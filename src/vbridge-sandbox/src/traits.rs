use std::future::Future;
use std::pin::Pin;

use vbridge_wire::{EngineError, Result, Value};

/// A Host-supplied function made callable from inside a [`Context`] (for
/// example `console.log`, `require`, or `__sendToHost`). Distinct from
/// [`vbridge_registry::Callback`]: that registry crosses the wire-protocol
/// boundary by opaque id; this one is bound directly into a sandbox's
/// global scope at the native call layer.
pub type HostFn = Box<dyn Fn(Vec<Value>) -> Value + Send + Sync>;

/// Predicate an [`Context`] polls (on whatever schedule the variant can
/// manage) to decide whether currently executing code should be aborted.
/// Mirrors the interrupt-handler shape in the teacher's
/// `sandbox::monitor` module, generalized past a single deadline check.
pub type InterruptPredicate = Box<dyn Fn() -> bool + Send + Sync>;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Whether a [`Context`] can run code synchronously or only by yielding to
/// an async boundary (worker thread hop, VM call round-trip).
///
/// Design notes §9: rather than forcing every variant through one calling
/// convention, callers always go through [`Context::eval_async`]; contexts
/// that are natively synchronous implement it by wrapping
/// [`Context::eval_sync`] in a ready future, so there is exactly one call
/// site in the Engine regardless of which capability a variant has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    /// `eval_sync` is implemented; `eval_async` is the default wrapper.
    Sync,
    /// Only `eval_async` is implemented; `eval_sync` always errors.
    AsyncOnly,
}

/// One isolated evaluation scope: a JS global object plus whatever engine
/// state backs it. Created by a [`Runtime`], disposed independently of it
/// (spec.md §4.1 "createContext/dispose are independent of runtime
/// lifetime").
pub trait Context: Send {
    /// Opaque id for logging/diagnostics attribution.
    fn id(&self) -> &str;

    /// Which evaluation path this context actually implements.
    fn eval_mode(&self) -> EvalMode;

    /// Run `code` to completion and return its last-expression value.
    /// Contexts with `eval_mode() == AsyncOnly` return
    /// `EngineError::ExecutionError` unconditionally; callers should
    /// prefer [`Context::eval_async`], which every context implements.
    fn eval_sync(&mut self, code: &str) -> Result<Value> {
        let _ = code;
        Err(EngineError::ExecutionError(format!(
            "context {} is async-only; eval_sync is unsupported",
            self.id()
        )))
    }

    /// Run `code` to completion, hopping to whatever async boundary the
    /// variant needs (thread channel, VM call). The default wraps
    /// [`Context::eval_sync`] for synchronous variants.
    fn eval_async<'a>(&'a mut self, code: &'a str) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move { self.eval_sync(code) })
    }

    /// Bind `value` at `name` in this context's global scope.
    fn set_global(&mut self, name: &str, value: Value) -> Result<()>;

    /// Read `name` from this context's global scope.
    fn get_global(&self, name: &str) -> Result<Value>;

    /// Bind a Host-native function at `name`, callable from guest code.
    fn set_host_function(&mut self, name: &str, f: HostFn) -> Result<()>;

    /// Install (or replace) the interrupt predicate this context polls
    /// while executing. Variants that cannot interrupt mid-execution
    /// (spec.md §4.1 capability matrix) accept this as a no-op.
    fn set_interrupt_handler(&mut self, predicate: InterruptPredicate) {
        let _ = predicate;
    }

    /// Remove any interrupt predicate previously installed.
    fn clear_interrupt_handler(&mut self) {}

    /// Tear this context down. Consuming `Box<Self>` rather than `&mut
    /// self` makes double-dispose a compile error at every call site that
    /// isn't holding a `Box<dyn Context>` behind an `Option`.
    fn dispose(self: Box<Self>);
}

/// A live engine instance capable of minting [`Context`]s. Roughly one
/// `Runtime` per `Engine` (spec.md §4.1); variants that share process-wide
/// state (the `None` provider) still hand out a `Runtime` value so the
/// Engine's ownership story doesn't special-case them.
pub trait Runtime: Send {
    /// Create a fresh evaluation scope.
    fn create_context(&mut self) -> Result<Box<dyn Context>>;

    /// Tear this runtime down, including any contexts it is still
    /// tracking that the caller never explicitly disposed.
    fn dispose(self: Box<Self>);
}

/// Factory for a specific sandbox strategy. `Provider`s are stateless and
/// cheap to hold onto; the expensive part is always `create_runtime`.
pub trait Provider: Send + Sync {
    /// Human-readable name used in diagnostics and auto-selection logs
    /// (e.g. `"embedded"`, `"native-vm"`).
    fn name(&self) -> &'static str;

    /// Whether this provider can actually service `create_runtime` right
    /// now (e.g. the native-VM provider checks hypervisor availability).
    /// `SandboxKind::Auto` skips unavailable providers rather than failing.
    fn is_available(&self) -> bool {
        true
    }

    /// Build a new [`Runtime`].
    fn create_runtime(&self) -> Result<Box<dyn Runtime>>;
}
