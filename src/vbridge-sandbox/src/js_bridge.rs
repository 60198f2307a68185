//! Shared rquickjs plumbing for the `none` and `embedded` providers (and,
//! indirectly, the worker provider, which runs an embedded context on its
//! own thread). Values cross the Rust/JS boundary through JSON rather than
//! binding each [`vbridge_wire::Value`] variant to a native QuickJS type
//! one by one: the wire protocol is already JSON-shaped (spec.md §6), so a
//! `JSON.parse`/`JSON.stringify` round trip keeps the conversion surface
//! small and auditable instead of duplicating the marker-sniffing logic
//! rquickjs-side.

use rquickjs::{Ctx, Function, Object, Value as JsValue};
use vbridge_wire::{EngineError, Result, Value};

/// Evaluate `code` and bring its result back across as a [`Value`] via a
/// JSON round trip. `undefined` becomes [`Value::Null`].
pub fn eval_to_value(ctx: &Ctx<'_>, code: &str) -> Result<Value> {
    let result: JsValue = ctx
        .eval(code)
        .map_err(|err| EngineError::ExecutionError(err.to_string()))?;
    js_to_value(ctx, result)
}

/// Serialize a JS value to JSON text via the realm's own `JSON.stringify`,
/// then parse it into a [`Value`]. Falls back to `Null` for values that
/// don't round-trip through JSON (functions, symbols, `undefined`).
pub fn js_to_value(ctx: &Ctx<'_>, value: JsValue<'_>) -> Result<Value> {
    if value.is_undefined() || value.is_null() {
        return Ok(Value::Null);
    }
    let globals = ctx.globals();
    let json: Object = globals
        .get("JSON")
        .map_err(|err| EngineError::ExecutionError(err.to_string()))?;
    let stringify: Function = json
        .get("stringify")
        .map_err(|err| EngineError::ExecutionError(err.to_string()))?;
    let text: Option<String> = stringify
        .call((value,))
        .map_err(|err| EngineError::ExecutionError(err.to_string()))?;
    match text {
        Some(text) => {
            let raw: serde_json::Value = serde_json::from_str(&text)
                .map_err(|err| EngineError::ProtocolError(err.to_string()))?;
            Value::try_from(raw).map_err(|err| EngineError::ProtocolError(err.to_string()))
        }
        // JSON.stringify(undefined) and friends return JS `undefined`,
        // which rquickjs surfaces as `None` here.
        None => Ok(Value::Null),
    }
}

/// Bind `value` at `name` in `ctx`'s globals by round-tripping it through
/// `JSON.parse`.
pub fn set_global_json(ctx: &Ctx<'_>, name: &str, value: &Value) -> Result<()> {
    let json_text = serde_json::to_string(value)
        .map_err(|err| EngineError::ProtocolError(err.to_string()))?;
    let globals = ctx.globals();
    let json: Object = globals
        .get("JSON")
        .map_err(|err| EngineError::ExecutionError(err.to_string()))?;
    let parse: Function = json
        .get("parse")
        .map_err(|err| EngineError::ExecutionError(err.to_string()))?;
    let parsed: JsValue = parse
        .call((json_text,))
        .map_err(|err| EngineError::ExecutionError(err.to_string()))?;
    globals
        .set(name, parsed)
        .map_err(|err| EngineError::ExecutionError(err.to_string()))?;
    Ok(())
}

/// Read `name` out of `ctx`'s globals.
pub fn get_global_value(ctx: &Ctx<'_>, name: &str) -> Result<Value> {
    let globals = ctx.globals();
    let value: JsValue = globals
        .get(name)
        .map_err(|err| EngineError::ExecutionError(err.to_string()))?;
    js_to_value(ctx, value)
}
