use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use tracing::{instrument, Level};

/// A Host-side function reachable by an opaque id crossing the isolation
/// boundary (spec.md §3 "Callback entry", §4.3).
pub type Callback = Box<dyn Fn(Vec<vbridge_wire::Value>) -> vbridge_wire::Value + Send + Sync>;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Maps opaque callback ids to Host-side closures.
///
/// Ids have the shape `fn_<instance>_<counter>` (spec.md §3): `instance` is
/// assigned once per `CallbackRegistry` so that multiple registries living
/// in one process (one per Engine, per spec.md §5 "per-SendToHost-channel")
/// never collide on function ids, and `counter` is a per-registry
/// monotonic sequence.
///
/// There is no reference counting: a node owns each function id it holds,
/// and `release`/`release_many` drop them unconditionally (spec.md §4.3).
pub struct CallbackRegistry {
    instance: u64,
    counter: u64,
    functions: HashMap<String, Callback>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            counter: 0,
            functions: HashMap::new(),
        }
    }

    /// Register a function, returning its newly minted id.
    #[instrument(skip_all, level = Level::TRACE)]
    pub fn register(&mut self, f: Callback) -> String {
        let id = format!("fn_{}_{}", self.instance, self.counter);
        self.counter += 1;
        self.functions.insert(id.clone(), f);
        id
    }

    /// Invoke a registered function. An unknown id logs a warning and
    /// returns `Value::Null` rather than erroring — callback invocation
    /// failures never destroy the Engine (spec.md §7).
    #[instrument(skip(self, args), level = Level::DEBUG)]
    pub fn invoke(&self, id: &str, args: Vec<vbridge_wire::Value>) -> vbridge_wire::Value {
        match self.functions.get(id) {
            Some(f) => f(args),
            None => {
                tracing::warn!(fn_id = id, "invoke of unknown callback id");
                vbridge_wire::Value::Null
            }
        }
    }

    /// Drop one function id. A no-op if the id is not present.
    pub fn release(&mut self, id: &str) {
        self.functions.remove(id);
    }

    /// Drop a batch of function ids.
    pub fn release_many<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        for id in ids {
            self.functions.remove(id);
        }
    }

    /// Drop every registered function.
    pub fn clear(&mut self) {
        self.functions.clear();
    }

    /// Number of currently registered functions.
    pub fn size(&self) -> usize {
        self.functions.len()
    }

    /// Whether `id` is currently registered. Used by the callback-coverage
    /// invariant (spec.md §8).
    pub fn contains(&self, id: &str) -> bool {
        self.functions.contains_key(id)
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbridge_wire::Value;

    fn counting_fn() -> Callback {
        Box::new(|_args| Value::Null)
    }

    #[test]
    fn ids_are_instance_scoped_and_non_colliding() {
        let mut a = CallbackRegistry::new();
        let mut b = CallbackRegistry::new();
        let id_a = a.register(counting_fn());
        let id_b = b.register(counting_fn());
        assert_ne!(id_a, id_b);
    }

    #[test]
    fn invoke_unknown_id_returns_null_not_panic() {
        let registry = CallbackRegistry::new();
        assert_eq!(registry.invoke("fn_0_0", vec![]), Value::Null);
    }

    #[test]
    fn release_removes_from_registry() {
        let mut registry = CallbackRegistry::new();
        let id = registry.register(counting_fn());
        assert!(registry.contains(&id));
        registry.release(&id);
        assert!(!registry.contains(&id));
    }

    #[test]
    fn invoke_counts_calls() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let mut registry = CallbackRegistry::new();
        let id = registry.register(Box::new(move |_args| {
            calls2.fetch_add(1, Ordering::SeqCst);
            Value::Null
        }));

        registry.invoke(&id, vec![]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
