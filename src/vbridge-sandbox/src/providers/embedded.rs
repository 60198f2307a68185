use std::sync::atomic::{AtomicU64, Ordering};

use rquickjs::{Context as JsContext, Function, Runtime as JsRuntime};
use vbridge_wire::{EngineError, Result, Value};

use crate::js_bridge;
use crate::traits::{Context, EvalMode, HostFn, InterruptPredicate, Provider, Runtime};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// In-process sandbox backed by its own QuickJS heap (one per `Runtime`).
/// Strong memory isolation from the Host and from sibling Engines, but no
/// thread or address-space boundary: a hung eval still blocks whichever
/// thread called it (grounded on `hyperlight-js-runtime`'s use of
/// rquickjs, minus the wasm-guest/hypervisor plumbing around it).
pub struct EmbeddedProvider;

impl EmbeddedProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EmbeddedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for EmbeddedProvider {
    fn name(&self) -> &'static str {
        "embedded"
    }

    fn create_runtime(&self) -> Result<Box<dyn Runtime>> {
        let runtime = JsRuntime::new()
            .map_err(|err| EngineError::ExecutionError(format!("rquickjs runtime: {err}")))?;
        Ok(Box::new(EmbeddedRuntime { runtime }))
    }
}

struct EmbeddedRuntime {
    runtime: JsRuntime,
}

impl Runtime for EmbeddedRuntime {
    fn create_context(&mut self) -> Result<Box<dyn Context>> {
        let ctx = JsContext::full(&self.runtime)
            .map_err(|err| EngineError::ExecutionError(format!("rquickjs context: {err}")))?;
        let id = format!("embedded-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed));
        Ok(Box::new(EmbeddedContext { id, ctx }))
    }

    fn dispose(self: Box<Self>) {
        // JsRuntime's Drop frees the heap; nothing else to release.
    }
}

struct EmbeddedContext {
    id: String,
    ctx: JsContext,
}

impl Context for EmbeddedContext {
    fn id(&self) -> &str {
        &self.id
    }

    fn eval_mode(&self) -> EvalMode {
        EvalMode::Sync
    }

    fn eval_sync(&mut self, code: &str) -> Result<Value> {
        self.ctx
            .with(|ctx| js_bridge::eval_to_value(&ctx, code))
    }

    fn set_global(&mut self, name: &str, value: Value) -> Result<()> {
        self.ctx
            .with(|ctx| js_bridge::set_global_json(&ctx, name, &value))
    }

    fn get_global(&self, name: &str) -> Result<Value> {
        self.ctx.with(|ctx| js_bridge::get_global_value(&ctx, name))
    }

    fn set_host_function(&mut self, name: &str, f: HostFn) -> Result<()> {
        self.ctx.with(|ctx| {
            let name = name.to_string();
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

    fn set_interrupt_handler(&mut self, predicate: InterruptPredicate) {
        self.ctx
            .runtime()
            .set_interrupt_handler(Some(Box::new(move || predicate())));
    }

    fn clear_interrupt_handler(&mut self) {
        self.ctx.runtime().set_interrupt_handler(None);
    }

    fn dispose(self: Box<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_returns_primitive_value() {
        let provider = EmbeddedProvider::new();
        let mut runtime = provider.create_runtime().unwrap();
        let mut ctx = runtime.create_context().unwrap();
        let value = ctx.eval_sync("1 + 2").unwrap();
        assert_eq!(value, Value::Num(3.0));
    }

    #[test]
    fn globals_round_trip() {
        let provider = EmbeddedProvider::new();
        let mut runtime = provider.create_runtime().unwrap();
        let mut ctx = runtime.create_context().unwrap();
        ctx.set_global("greeting", Value::Str("hi".into())).unwrap();
        let value = ctx.eval_sync("greeting + \"!\"").unwrap();
        assert_eq!(value, Value::Str("hi!".into()));
    }

    #[test]
    fn two_contexts_do_not_share_globals() {
        let provider = EmbeddedProvider::new();
        let mut runtime = provider.create_runtime().unwrap();
        let mut a = runtime.create_context().unwrap();
        let b = runtime.create_context().unwrap();
        a.set_global("onlyA", Value::Bool(true)).unwrap();
        assert_eq!(b.get_global("onlyA").unwrap(), Value::Null);
    }
}
