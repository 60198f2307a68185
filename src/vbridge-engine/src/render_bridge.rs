//! Binds [`vbridge_renderer::Renderer`]'s host-config entry points as
//! Guest-callable functions, so a React-style reconciler shim running in
//! the bundle drives the same `Renderer` this crate already has rather
//! than hand-assembling operation batches itself. `__flush` is the one
//! point where a finished commit actually leaves the Guest: it drains the
//! Renderer's buffered operations straight into the same outbound queue
//! `__sendToHost` would have used.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::Level;
use vbridge_renderer::Renderer;
use vbridge_sandbox::Context;
use vbridge_wire::{NodeId, Result, Value};

use crate::polyfills::PolyfillState;

fn as_node_id(value: &Value) -> NodeId {
    match value {
        Value::Num(n) => NodeId(*n as u32),
        _ => NodeId::ROOT,
    }
}

fn as_string_vec(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| match v {
                Value::Str(s) => Some(s.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn ids_to_value(ids: Vec<String>) -> Value {
    Value::Array(ids.into_iter().map(Value::Str).collect())
}

#[tracing::instrument(skip_all, level = Level::DEBUG)]
pub(crate) async fn install(
    context: &mut dyn Context,
    renderer: Arc<Mutex<Renderer>>,
    polyfills: Arc<PolyfillState>,
) -> Result<()> {
    let r = renderer.clone();
    context.set_host_function(
        "__createInstance",
        Box::new(move |args| {
            let node_type = match args.first() {
                Some(Value::Str(s)) => s.clone(),
                _ => return Value::Null,
            };
            let props = args.into_iter().nth(1).unwrap_or(Value::Object(HashMap::new()));
            let id = r.lock().unwrap().create_instance(&node_type, props);
            Value::Num(id.0 as f64)
        }),
    )?;

    let r = renderer.clone();
    context.set_host_function(
        "__createTextInstance",
        Box::new(move |args| {
            let text = match args.first() {
                Some(Value::Str(s)) => s.clone(),
                other => other.map(|v| format!("{v:?}")).unwrap_or_default(),
            };
            let id = r.lock().unwrap().create_text_instance(text);
            Value::Num(id.0 as f64)
        }),
    )?;

    let r = renderer.clone();
    context.set_host_function(
        "__appendChild",
        Box::new(move |args| {
            if let [parent, child, ..] = args.as_slice() {
                r.lock().unwrap().append_child(as_node_id(parent), as_node_id(child));
            }
            Value::Null
        }),
    )?;

    let r = renderer.clone();
    context.set_host_function(
        "__insertBefore",
        Box::new(move |args| {
            if let [parent, child, index, ..] = args.as_slice() {
                let index = match index {
                    Value::Num(n) => *n as u32,
                    _ => 0,
                };
                r.lock().unwrap().insert_before(as_node_id(parent), as_node_id(child), index);
            }
            Value::Null
        }),
    )?;

    let r = renderer.clone();
    context.set_host_function(
        "__removeChild",
        Box::new(move |args| {
            if let [parent, child, ..] = args.as_slice() {
                r.lock().unwrap().remove_child(as_node_id(parent), as_node_id(child));
            }
            Value::Null
        }),
    )?;

    let r = renderer.clone();
    context.set_host_function(
        "__commitUpdate",
        Box::new(move |args| {
            let id = args.first().map(as_node_id).unwrap_or(NodeId::ROOT);
            let props = args.get(1).cloned().unwrap_or(Value::Object(HashMap::new()));
            let removed = args.get(2).map(as_string_vec).unwrap_or_default();
            let released = r.lock().unwrap().commit_update(id, props, removed);
            ids_to_value(released)
        }),
    )?;

    let r = renderer.clone();
    context.set_host_function(
        "__commitTextUpdate",
        Box::new(move |args| {
            let id = args.first().map(as_node_id).unwrap_or(NodeId::ROOT);
            let text = match args.get(1) {
                Some(Value::Str(s)) => s.clone(),
                _ => String::new(),
            };
            r.lock().unwrap().commit_text_update(id, text);
            Value::Null
        }),
    )?;

    let r = renderer.clone();
    context.set_host_function(
        "__reorderChildren",
        Box::new(move |args| {
            if let [parent, children, ..] = args.as_slice() {
                let ids = match children {
                    Value::Array(items) => items.iter().map(as_node_id).collect(),
                    _ => Vec::new(),
                };
                r.lock().unwrap().reorder_children(as_node_id(parent), ids);
            }
            Value::Null
        }),
    )?;

    let r = renderer.clone();
    context.set_host_function(
        "__deleteNode",
        Box::new(move |args| {
            let id = args.first().map(as_node_id).unwrap_or(NodeId::ROOT);
            ids_to_value(r.lock().unwrap().delete_node(id))
        }),
    )?;

    let r = renderer.clone();
    context.set_host_function(
        "__clearContainer",
        Box::new(move |args| {
            let ids: Vec<NodeId> = args.first().map(|v| match v {
                Value::Array(items) => items.iter().map(as_node_id).collect(),
                _ => Vec::new(),
            }).unwrap_or_default();
            ids_to_value(r.lock().unwrap().clear_container(ids))
        }),
    )?;

    let r = renderer.clone();
    let p = polyfills.clone();
    context.set_host_function(
        "__flush",
        Box::new(move |_args| {
            if let Some(batch) = r.lock().unwrap().flush() {
                p.push_operation_batch(batch);
            }
            Value::Null
        }),
    )?;

    context.eval_async(RENDER_BRIDGE_JS).await?;
    Ok(())
}

/// Names the host-config call sequence a Guest-side reconciler shim
/// drives one-for-one; kept minimal (no `prepareForCommit`/
/// `resetAfterCommit` binding — this workspace's Renderer treats those as
/// no-ops, so the shim can call or skip them freely).
const RENDER_BRIDGE_JS: &str = r#"
(function () {
  globalThis.__hostConfig = {
    createInstance: __createInstance,
    createTextInstance: __createTextInstance,
    appendChild: __appendChild,
    insertBefore: __insertBefore,
    removeChild: __removeChild,
    commitUpdate: __commitUpdate,
    commitTextUpdate: __commitTextUpdate,
    reorderChildren: __reorderChildren,
    deleteNode: __deleteNode,
    clearContainer: __clearContainer,
    flush: __flush,
  };
})();
"#;
