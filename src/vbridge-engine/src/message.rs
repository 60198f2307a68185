//! Routes a [`HostMessage`] to wherever it's actually handled: straight
//! into the Engine for `DESTROY`/`CONFIG_UPDATE`, or across the sandbox
//! boundary for `CALL_FUNCTION`/`HOST_EVENT`, which only the Guest bundle
//! knows how to act on.

use vbridge_sandbox::Context;
use vbridge_wire::{EngineError, HostMessage, Result, Value};

/// Serialize `msg` onto the Guest's global scope and invoke its single
/// dispatch entry point, `globalThis.__handleHostMessage`. A bundle that
/// never defines the handler silently drops the message rather than
/// erroring — a bundle with nothing to do on `HOST_EVENT`, say, is not a
/// protocol violation.
pub(crate) async fn dispatch_to_guest(context: &mut dyn Context, msg: &HostMessage) -> Result<()> {
    let value = message_to_value(msg)?;
    context.set_global("__incomingHostMessage", value)?;
    context
        .eval_async(
            "(typeof __handleHostMessage === 'function') && __handleHostMessage(globalThis.__incomingHostMessage)",
        )
        .await?;
    Ok(())
}

fn message_to_value(msg: &HostMessage) -> Result<Value> {
    let json = serde_json::to_value(msg).map_err(|err| EngineError::ProtocolError(err.to_string()))?;
    Value::try_from(json).map_err(EngineError::ProtocolError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_function_round_trips_through_value() {
        let msg = HostMessage::CallFunction {
            fn_id: "fn_1_0".into(),
            args: vec![Value::Num(1.0)],
        };
        let value = message_to_value(&msg).unwrap();
        match value {
            Value::Object(map) => {
                assert_eq!(map.get("type"), Some(&Value::Str("CALL_FUNCTION".into())));
                assert_eq!(map.get("fnId"), Some(&Value::Str("fn_1_0".into())));
            }
            other => panic!("expected an object, got {other:?}"),
        }
    }
}
