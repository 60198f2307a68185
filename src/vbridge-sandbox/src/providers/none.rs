use std::sync::{Mutex, OnceLock};

use rquickjs::{Context as JsContext, Function, Runtime as JsRuntime};
use vbridge_wire::{EngineError, Result, Value};

use crate::js_bridge;
use crate::traits::{Context, EvalMode, HostFn, Provider, Runtime};

/// Process-wide heap shared by every `NoneProvider` context. This is the
/// entire point of the variant: guests run in the Host's own interpreter,
/// with no isolation at all. Dev-only (spec.md §4.1 "None (dev only)").
fn shared_heap() -> &'static Mutex<JsRuntime> {
    static HEAP: OnceLock<Mutex<JsRuntime>> = OnceLock::new();
    HEAP.get_or_init(|| {
        Mutex::new(JsRuntime::new().expect("process-wide rquickjs runtime"))
    })
}

/// No isolation: every context created by this provider evaluates against
/// the same global object as every other. Intended for local development
/// where spinning up a real sandbox is unnecessary overhead, never for
/// untrusted guest code.
pub struct NoneProvider;

impl NoneProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoneProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for NoneProvider {
    fn name(&self) -> &'static str {
        "none"
    }

    fn create_runtime(&self) -> Result<Box<dyn Runtime>> {
        Ok(Box::new(NoneRuntime))
    }
}

struct NoneRuntime;

impl Runtime for NoneRuntime {
    fn create_context(&mut self) -> Result<Box<dyn Context>> {
        let heap = shared_heap().lock().expect("shared heap mutex poisoned");
        let ctx = JsContext::full(&heap)
            .map_err(|err| EngineError::ExecutionError(format!("rquickjs context: {err}")))?;
        Ok(Box::new(NoneContext { ctx }))
    }

    fn dispose(self: Box<Self>) {}
}

struct NoneContext {
    ctx: JsContext,
}

impl Context for NoneContext {
    fn id(&self) -> &str {
        "none-shared"
    }

    fn eval_mode(&self) -> EvalMode {
        EvalMode::Sync
    }

    fn eval_sync(&mut self, code: &str) -> Result<Value> {
        let _heap_guard = shared_heap().lock().expect("shared heap mutex poisoned");
        self.ctx.with(|ctx| js_bridge::eval_to_value(&ctx, code))
    }

    fn set_global(&mut self, name: &str, value: Value) -> Result<()> {
        let _heap_guard = shared_heap().lock().expect("shared heap mutex poisoned");
        self.ctx
            .with(|ctx| js_bridge::set_global_json(&ctx, name, &value))
    }

    fn get_global(&self, name: &str) -> Result<Value> {
        let _heap_guard = shared_heap().lock().expect("shared heap mutex poisoned");
        self.ctx.with(|ctx| js_bridge::get_global_value(&ctx, name))
    }

    fn set_host_function(&mut self, name: &str, f: HostFn) -> Result<()> {
        let _heap_guard = shared_heap().lock().expect("shared heap mutex poisoned");
        self.ctx.with(|ctx| {
            let wrapped = Function::new(ctx.clone(), move |args: rquickjs::Rest<rquickjs::Value>| -> rquickjs::Result<rquickjs::Value> {
                let mut values = Vec::with_capacity(args.len());
                for arg in args.0 {
                    values.push(js_bridge::js_to_value(&ctx, arg).unwrap_or(Value::Null));
                }
                let result = f(values);
                let json = serde_json::to_string(&result).unwrap_or_else(|_| "null".to_string());
                let globals = ctx.globals();
                let json_obj: rquickjs::Object = globals.get("JSON")?;
                let parse: Function = json_obj.get("parse")?;
                parse.call((json,))
            })
            .map_err(|err| EngineError::ExecutionError(err.to_string()))?;
            ctx.globals()
                .set(name, wrapped)
                .map_err(|err| EngineError::ExecutionError(err.to_string()))
        })
    }

    fn dispose(self: Box<Self>) {}
}
