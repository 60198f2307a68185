use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use vbridge_wire::Value;

/// A Host-side event subscriber for one of the Engine's named events
/// (`load`, `error`, `destroy`, `operation`, `message`, `fatalError`;
/// spec.md §4.2).
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Per-event listener lists with a `maxListeners` ceiling (warned once
/// per event name, not enforced — a caller that wants a hard cap gets the
/// warning and keeps working, matching Node's own `EventEmitter`
/// posture) and per-call panic isolation so one broken listener can't
/// take down the dispatch loop or, transitively, the Engine.
#[derive(Default)]
pub struct EventEmitter {
    listeners: HashMap<String, Vec<Listener>>,
    warned_over_limit: std::collections::HashSet<String>,
    max_listeners: usize,
}

impl EventEmitter {
    pub fn new(max_listeners: usize) -> Self {
        Self {
            listeners: HashMap::new(),
            warned_over_limit: std::collections::HashSet::new(),
            max_listeners,
        }
    }

    pub fn set_max_listeners(&mut self, max: usize) {
        self.max_listeners = max;
    }

    /// Subscribe to `event`.
    pub fn on(&mut self, event: impl Into<String>, listener: Listener) {
        let event = event.into();
        let list = self.listeners.entry(event.clone()).or_default();
        list.push(listener);
        if list.len() > self.max_listeners && self.warned_over_limit.insert(event.clone()) {
            tracing::warn!(
                event = %event,
                count = list.len(),
                max = self.max_listeners,
                "listener count exceeds maxListeners; possible leak"
            );
        }
    }

    /// Remove every listener for `event`.
    pub fn clear(&mut self, event: &str) {
        self.listeners.remove(event);
    }

    /// Remove every listener for every event (used by `destroy`).
    pub fn clear_all(&mut self) {
        self.listeners.clear();
        self.warned_over_limit.clear();
    }

    /// Fire `event` with `payload`. Each listener is invoked inside
    /// `catch_unwind`; a panicking listener is logged and skipped, the
    /// remaining listeners still run (spec.md §4.2 "listener exceptions
    /// never propagate to the Engine's own control flow").
    pub fn emit(&self, event: &str, payload: &Value) {
        let Some(list) = self.listeners.get(event) else {
            return;
        };
        for listener in list {
            let result = catch_unwind(AssertUnwindSafe(|| listener(payload)));
            if result.is_err() {
                tracing::error!(event, "listener panicked; isolated from the Engine");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emit_calls_every_listener_in_registration_order() {
        let mut emitter = EventEmitter::new(16);
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        for i in 0..3 {
            let calls = calls.clone();
            emitter.on("load", Arc::new(move |_| calls.lock().unwrap().push(i)));
        }
        emitter.emit("load", &Value::Null);
        assert_eq!(*calls.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn panicking_listener_does_not_stop_the_rest() {
        let mut emitter = EventEmitter::new(16);
        emitter.on("load", Arc::new(|_| panic!("boom")));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        emitter.on("load", Arc::new(move |_| {
            calls2.fetch_add(1, Ordering::SeqCst);
        }));
        emitter.emit("load", &Value::Null);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn over_limit_warns_once_per_event() {
        let mut emitter = EventEmitter::new(1);
        emitter.on("load", Arc::new(|_| {}));
        emitter.on("load", Arc::new(|_| {}));
        emitter.on("load", Arc::new(|_| {}));
        assert!(emitter.warned_over_limit.contains("load"));
    }
}
