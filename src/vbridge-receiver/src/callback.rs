use std::sync::Arc;

use vbridge_wire::{EngineError, NodeId, Result, Value};

use crate::tree::Receiver;

/// Dispatches a `CALL_FUNCTION` back toward the Guest for a given
/// callback id. The Receiver never resolves function ids itself — the
/// actual callback registry lives with whichever sandbox `Context`
/// created the closures (spec.md §4.3); this is just the one-way send.
pub type Dispatch = Arc<dyn Fn(&str, Vec<Value>) + Send + Sync>;

impl Receiver {
    /// Invoke the function bound at `prop_key` on node `id`, if any.
    /// Returns `Ok(())` once the dispatch has been handed off — this is a
    /// fire-and-forget notification, not a synchronous call (spec.md
    /// §4.3 "no reference counting... one-way").
    pub fn call_prop_function(&self, id: NodeId, prop_key: &str, args: Vec<Value>, dispatch: &Dispatch) -> Result<()> {
        let node = self.get(id).ok_or_else(|| {
            EngineError::ProtocolError(format!("call_prop_function: unknown node {id}"))
        })?;
        let fn_id = match &node.props {
            Value::Object(map) => match map.get(prop_key) {
                Some(Value::Fn(marker)) => marker.fn_id.clone(),
                _ => {
                    return Err(EngineError::ProtocolError(format!(
                        "call_prop_function: {prop_key} on node {id} is not a function prop"
                    )))
                }
            },
            _ => {
                return Err(EngineError::ProtocolError(format!(
                    "call_prop_function: node {id} has non-object props"
                )))
            }
        };
        dispatch(&fn_id, args);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vbridge_registry::ComponentRegistry;
    use vbridge_wire::{FnMarker, Operation, OperationBatch};

    #[test]
    fn call_prop_function_dispatches_with_bound_fn_id() {
        let registry = ComponentRegistry::new(false);
        let mut receiver = Receiver::new(registry, None);
        let mut props = HashMap::new();
        props.insert("onPress".to_string(), Value::Fn(FnMarker::new("fn_1_0")));
        receiver
            .apply_batch(OperationBatch::new(
                1,
                vec![Operation::Create {
                    id: NodeId(1),
                    node_type: "Button".into(),
                    serialized_props: Value::Object(props),
                }],
            ))
            .unwrap();

        let calls = std::sync::Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let seen_id = std::sync::Arc::new(std::sync::Mutex::new(String::new()));
        let seen_id2 = seen_id.clone();
        let dispatch: Dispatch = std::sync::Arc::new(move |fn_id, _args| {
            calls2.fetch_add(1, Ordering::SeqCst);
            *seen_id2.lock().unwrap() = fn_id.to_string();
        });

        receiver.call_prop_function(NodeId(1), "onPress", vec![], &dispatch).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*seen_id.lock().unwrap(), "fn_1_0");
    }
}
