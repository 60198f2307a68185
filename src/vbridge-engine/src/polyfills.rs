//! The Guest-global surface every bundle runs against: `console`, a
//! restricted `require`, handle-mapped timers, and the functions that
//! actually cross the wire (`__sendToHost`, `__sendEventToHost`,
//! `__getConfig`, `__invokeNative`, `__scheduleTimer`/`__clearTimer`).
//! Everything else (the JSON value bridge, marker minting) is the sandbox
//! provider's job, not this crate's — this module only owns what a
//! bundle author would recognize as "the host environment."

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::Level;
use vbridge_registry::CallbackRegistry;
use vbridge_sandbox::Context;
use vbridge_wire::{EngineError, GuestEvent, OperationBatch, Result, Value};

/// Module names a bundle is allowed to `require`. Real module resolution
/// is out of scope (spec.md Non-goals "no filesystem, no npm
/// resolution") — each of these is a fixed object literal handed back
/// verbatim rather than resolved from anywhere. `react`, `vbridge-sdk`,
/// `vbridge-reconciler`, and `vbridge-platform` are the minimum set a
/// React-shaped bundle needs to import without hitting `RequireError`
/// before it ever calls into the renderer (spec.md §4.2/§6).
const REQUIRE_WHITELIST: &[&str] = &[
    "host-bridge",
    "react",
    "vbridge-sdk",
    "vbridge-reconciler",
    "vbridge-platform",
];

/// One scheduled `setTimeout`/`setInterval`: the tokio task doing the
/// actual waiting, kept only so `__clearTimer`/destroy can abort it.
struct TimerEntry {
    task: tokio::task::JoinHandle<()>,
}

/// Queues fed by the Guest-bound host functions and drained by the
/// Engine: one side of the boundary can only push, the other can only
/// pop, so there's no lock ordering to get wrong.
pub(crate) struct PolyfillState {
    operations: Mutex<VecDeque<OperationBatch>>,
    guest_events: Mutex<VecDeque<GuestEvent>>,
    config: Mutex<Value>,
    timers: Mutex<HashMap<u32, TimerEntry>>,
    /// `(handle, is_final)` — `is_final` tells the Guest dispatch helper
    /// whether to drop its own callback-id mapping after this firing
    /// (single-shot) or keep it for the next tick (recurring).
    fired_timers: Mutex<VecDeque<(u32, bool)>>,
    next_timer_handle: AtomicU32,
    async_errors: Mutex<VecDeque<String>>,
}

impl PolyfillState {
    pub(crate) fn new(initial_config: Value) -> Self {
        Self {
            operations: Mutex::new(VecDeque::new()),
            guest_events: Mutex::new(VecDeque::new()),
            config: Mutex::new(initial_config),
            timers: Mutex::new(HashMap::new()),
            fired_timers: Mutex::new(VecDeque::new()),
            next_timer_handle: AtomicU32::new(1),
            async_errors: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn set_config(&self, config: Value) {
        *self.config.lock().unwrap() = config;
    }

    pub(crate) fn drain_operations(&self) -> Vec<OperationBatch> {
        self.operations.lock().unwrap().drain(..).collect()
    }

    /// Queue a batch produced directly by the render bridge (`__flush`),
    /// bypassing `__sendToHost`'s JSON round trip since the Renderer
    /// already produced a well-typed [`OperationBatch`].
    pub(crate) fn push_operation_batch(&self, batch: OperationBatch) {
        self.operations.lock().unwrap().push_back(batch);
    }

    pub(crate) fn drain_guest_events(&self) -> Vec<GuestEvent> {
        self.guest_events.lock().unwrap().drain(..).collect()
    }

    /// Schedule a native timer behind a freshly minted Guest-visible
    /// handle (spec.md §4.2 "Guest-visible integer handles mapped to
    /// native handles in per-engine maps"). `repeating` reschedules the
    /// same handle after every firing rather than retiring it. A free
    /// function taking `&Arc<Self>` rather than a method, since `Arc` is
    /// not one of the receiver types stable Rust allows `self` to take.
    fn schedule_timer(state: &Arc<PolyfillState>, delay_ms: u64, repeating: bool) -> u32 {
        let handle = state.next_timer_handle.fetch_add(1, Ordering::Relaxed);
        let task_state = state.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                task_state.fired_timers.lock().unwrap().push_back((handle, !repeating));
                if !repeating {
                    task_state.timers.lock().unwrap().remove(&handle);
                    break;
                }
            }
        });
        state.timers.lock().unwrap().insert(handle, TimerEntry { task });
        handle
    }

    /// `clearTimeout`/`clearInterval`: abort the native task backing
    /// `handle`, if it's still running. A handle that already fired (or
    /// was never scheduled, e.g. because the Guest reused a stale number)
    /// is a silent no-op, matching the DOM contract.
    fn clear_timer(&self, handle: u32) {
        if let Some(entry) = self.timers.lock().unwrap().remove(&handle) {
            entry.task.abort();
        }
    }

    /// Every timer handle that has fired since the last drain, each
    /// tagged with whether it was single-shot (so the Guest can forget
    /// its callback) or recurring.
    pub(crate) fn drain_fired_timers(&self) -> Vec<(u32, bool)> {
        self.fired_timers.lock().unwrap().drain(..).collect()
    }

    /// Abort every outstanding native timer. Called on Engine destroy so
    /// a long `setInterval` doesn't keep a tokio task alive past the
    /// Engine's own lifetime.
    pub(crate) fn clear_all_timers(&self) {
        for (_, entry) in self.timers.lock().unwrap().drain() {
            entry.task.abort();
        }
    }

    fn report_async_error(&self, message: String) {
        self.async_errors.lock().unwrap().push_back(message);
    }

    /// Every timer-callback/unhandled-rejection message reported by Guest
    /// code since the last drain (spec.md §7 "counted, and emitted as
    /// `error` events; they never propagate to the Host event loop").
    pub(crate) fn drain_async_errors(&self) -> Vec<String> {
        self.async_errors.lock().unwrap().drain(..).collect()
    }
}

fn value_as_str(args: &[Value], index: usize) -> Result<String> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(s.clone()),
        other => Err(EngineError::ExecutionError(format!(
            "expected string argument at position {index}, got {other:?}"
        ))),
    }
}

/// Bind the host functions the bootstrap shim below calls into, then run
/// the shim so `console`/`require`/timers exist before bundle code runs.
/// Installs through `eval_async` rather than `eval_sync` — a `Worker`
/// sandbox's `Context` only implements the async path (spec.md §4.1
/// capability matrix), and construction has to work for every variant.
#[tracing::instrument(skip_all, level = Level::DEBUG)]
pub(crate) async fn install(
    context: &mut dyn Context,
    state: Arc<PolyfillState>,
    callbacks: Arc<Mutex<CallbackRegistry>>,
    debug: bool,
) -> Result<()> {
    let log_state = state.clone();
    context.set_host_function(
        "__consoleLog",
        Box::new(move |args| {
            let line = args.iter().map(describe).collect::<Vec<_>>().join(" ");
            tracing::info!(target: "guest.console", "{line}");
            let _ = &log_state;
            Value::Null
        }),
    )?;

    context.set_host_function(
        "__consoleWarn",
        Box::new(move |args| {
            let line = args.iter().map(describe).collect::<Vec<_>>().join(" ");
            tracing::warn!(target: "guest.console", "{line}");
            Value::Null
        }),
    )?;

    context.set_host_function(
        "__consoleError",
        Box::new(move |args| {
            let line = args.iter().map(describe).collect::<Vec<_>>().join(" ");
            tracing::error!(target: "guest.console", "{line}");
            Value::Null
        }),
    )?;

    let send_state = state.clone();
    context.set_host_function(
        "__sendToHost",
        Box::new(move |args| match args.into_iter().next() {
            Some(value) => match serde_json::to_value(&value).and_then(serde_json::from_value::<OperationBatch>) {
                Ok(batch) => {
                    send_state.operations.lock().unwrap().push_back(batch);
                    Value::Null
                }
                Err(err) => {
                    tracing::warn!(error = %err, "dropped __sendToHost payload that did not decode as an operation batch");
                    Value::Null
                }
            },
            None => Value::Null,
        }),
    )?;

    let event_state = state.clone();
    context.set_host_function(
        "__sendEventToHost",
        Box::new(move |mut args| {
            if args.len() < 2 {
                tracing::warn!("__sendEventToHost called with fewer than 2 arguments");
                return Value::Null;
            }
            let payload = args.pop().unwrap();
            let event = match args.pop().unwrap() {
                Value::Str(s) => s,
                other => {
                    tracing::warn!(?other, "__sendEventToHost event name was not a string");
                    return Value::Null;
                }
            };
            event_state.guest_events.lock().unwrap().push_back(GuestEvent { event, payload });
            Value::Null
        }),
    )?;

    let config_state = state.clone();
    context.set_host_function(
        "__getConfig",
        Box::new(move |_args| config_state.config.lock().unwrap().clone()),
    )?;

    context.set_host_function(
        "__requireCheck",
        Box::new(move |args| {
            let name = match args.first() {
                Some(Value::Str(s)) => s.clone(),
                _ => String::new(),
            };
            Value::Bool(REQUIRE_WHITELIST.contains(&name.as_str()))
        }),
    )?;

    context.set_host_function(
        "__invokeNative",
        Box::new(move |mut args| {
            if args.is_empty() {
                return Value::Null;
            }
            let rest = args.split_off(1);
            let id = match args.pop() {
                Some(Value::Str(s)) => s,
                _ => {
                    tracing::warn!("__invokeNative called without a string id");
                    return Value::Null;
                }
            };
            callbacks.lock().unwrap().invoke(&id, rest)
        }),
    )?;

    let timer_state = state.clone();
    context.set_host_function(
        "__scheduleTimer",
        Box::new(move |args| {
            let delay_ms = match args.first() {
                Some(Value::Num(n)) if *n > 0.0 => *n as u64,
                _ => 0,
            };
            let repeating = matches!(args.get(1), Some(Value::Bool(true)));
            Value::Num(PolyfillState::schedule_timer(&timer_state, delay_ms, repeating) as f64)
        }),
    )?;

    let clear_state = state.clone();
    context.set_host_function(
        "__clearTimer",
        Box::new(move |args| {
            if let Some(Value::Num(n)) = args.first() {
                clear_state.clear_timer(*n as u32);
            }
            Value::Null
        }),
    )?;

    let error_state = state.clone();
    context.set_host_function(
        "__reportAsyncError",
        Box::new(move |args| {
            let message = match args.first() {
                Some(Value::Str(s)) => s.clone(),
                other => format!("{other:?}"),
            };
            tracing::warn!(target: "guest.async_error", "{message}");
            error_state.report_async_error(message);
            Value::Null
        }),
    )?;

    context.set_global("__debug", Value::Bool(debug))?;
    context.eval_async(BOOTSTRAP_JS).await?;
    Ok(())
}

fn describe(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| "<unserializable>".to_string()),
    }
}

/// Minimal runtime a bundle can assume is present: `console`, a
/// whitelist-only `require`, and timers backed by real native scheduling
/// (spec.md §4.2 "Guest-visible integer handles mapped to native handles
/// in per-engine maps"). The handle is minted host-side by
/// `__scheduleTimer`; the Guest only ever sees that integer and keeps its
/// own handle→callback map so the actual `Function` value never has to
/// cross the wire. `queueMicrotask` rides the engine's native `Promise`
/// rather than a host round trip — there is nothing for the Host to
/// schedule that the microtask queue doesn't already do for free.
const BOOTSTRAP_JS: &str = r#"
(function () {
  globalThis.console = {
    log: function () { __consoleLog.apply(null, Array.prototype.slice.call(arguments)); },
    info: function () { __consoleLog.apply(null, Array.prototype.slice.call(arguments)); },
    warn: function () { __consoleWarn.apply(null, Array.prototype.slice.call(arguments)); },
    error: function () { __consoleError.apply(null, Array.prototype.slice.call(arguments)); },
  };

  var hostBridge = {
    sendToHost: function (batch) { return __sendToHost(batch); },
    sendEventToHost: function (name, payload) { return __sendEventToHost(name, payload); },
    getConfig: function () { return __getConfig(); },
    callNative: function (id) {
      return __invokeNative.apply(null, Array.prototype.slice.call(arguments));
    },
  };

  var vbridgeSdk = {
    Components: { View: 'View', Text: 'Text', Image: 'Image', TouchableOpacity: 'TouchableOpacity', ScrollView: 'ScrollView' },
    sendEvent: function (name, payload) { return __sendEventToHost(name, payload); },
    getConfig: function () { return __getConfig(); },
  };

  var vbridgePlatform = {
    OS: 'vbridge',
    select: function (choices) { return 'vbridge' in choices ? choices.vbridge : choices.default; },
  };

  var react = {
    Fragment: '__vbridgeFragment',
    createElement: function (type, props) {
      var children = Array.prototype.slice.call(arguments, 2);
      var merged = props ? Object.assign({}, props) : {};
      if (children.length) { merged.children = children.length === 1 ? children[0] : children; }
      return { type: type, props: merged };
    },
    useState: function (initial) {
      return [initial, function () {}];
    },
    useEffect: function (effect) { effect(); },
    useRef: function (initial) { return { current: initial }; },
    useMemo: function (factory) { return factory(); },
    useCallback: function (fn) { return fn; },
  };
  react.default = react;

  globalThis.require = function (name) {
    if (!__requireCheck(name)) {
      throw new Error('module not permitted: ' + name);
    }
    switch (name) {
      case 'host-bridge': return hostBridge;
      case 'react': return react;
      case 'vbridge-sdk': return vbridgeSdk;
      case 'vbridge-platform': return vbridgePlatform;
      case 'vbridge-reconciler': return globalThis.__hostConfig;
      default: throw new Error('module not permitted: ' + name);
    }
  };

  var timerCallbacks = Object.create(null);

  function scheduleTimer(fn, delayMs, repeating) {
    if (typeof fn !== 'function') { return 0; }
    var handle = __scheduleTimer(delayMs || 0, repeating);
    timerCallbacks[handle] = fn;
    return handle;
  }

  function clearTimer(handle) {
    delete timerCallbacks[handle];
    __clearTimer(handle);
  }

  globalThis.setTimeout = function (fn, delayMs) { return scheduleTimer(fn, delayMs, false); };
  globalThis.setInterval = function (fn, delayMs) { return scheduleTimer(fn, delayMs, true); };
  globalThis.clearTimeout = clearTimer;
  globalThis.clearInterval = clearTimer;

  globalThis.queueMicrotask = function (fn) {
    Promise.resolve().then(fn).catch(function (err) {
      __reportAsyncError('Uncaught exception in queueMicrotask callback: ' + (err && err.message ? err.message : err));
    });
  };

  // Invoked by the Engine once a native timer fires (the polling side of
  // the handle map above); never called by bundle code directly.
  globalThis.__fireTimer = function (handle, isFinal) {
    var fn = timerCallbacks[handle];
    if (isFinal) { delete timerCallbacks[handle]; }
    if (typeof fn !== 'function') { return; }
    try {
      fn();
    } catch (err) {
      __reportAsyncError('Uncaught exception in timer callback: ' + (err && err.message ? err.message : err));
    }
  };
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_renders_strings_bare() {
        assert_eq!(describe(&Value::Str("hi".into())), "hi");
    }

    #[test]
    fn describe_renders_numbers_as_json() {
        assert_eq!(describe(&Value::Num(3.0)), "3.0");
    }
}
