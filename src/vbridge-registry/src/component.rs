use hashbrown::HashMap;
use tracing::{instrument, Level};

/// A resolvable native/host component. Concrete widgets are an external
/// collaborator (spec.md §1 Out of scope); this crate only needs an opaque
/// handle the Receiver can look up by name and hand to the view integrator.
#[derive(Debug, Clone)]
pub struct Component {
    pub name: String,
}

/// Name→component map with whitelist semantics (spec.md §4.5).
///
/// Purely in-memory, no network effects. Tracks access-miss counters for
/// diagnostics attribution.
pub struct ComponentRegistry {
    components: HashMap<String, Component>,
    miss_counts: HashMap<String, u64>,
    debug: bool,
}

impl ComponentRegistry {
    pub fn new(debug: bool) -> Self {
        Self {
            components: HashMap::new(),
            miss_counts: HashMap::new(),
            debug,
        }
    }

    /// Register a component under `name`. Warns (does not fail) on overwrite.
    #[instrument(skip(self, component), level = Level::DEBUG)]
    pub fn register(&mut self, name: impl Into<String> + std::fmt::Debug, component: Component) {
        let name = name.into();
        if self.components.contains_key(&name) {
            tracing::warn!(component = %name, "overwriting already-registered component");
        }
        self.components.insert(name, component);
    }

    /// Register several components at once (ergonomic parity with the
    /// host-module chaining pattern this crate's sibling registries share).
    pub fn register_many(&mut self, components: impl IntoIterator<Item = (String, Component)>) {
        for (name, component) in components {
            self.register(name, component);
        }
    }

    /// Resolve `name`. In debug mode, a miss panics with the list of
    /// registered names and the per-name miss counts collected so far
    /// (spec.md §4.5); in release mode a miss returns `None` and is
    /// recorded for diagnostics only.
    pub fn get(&mut self, name: &str) -> Option<&Component> {
        if self.components.contains_key(name) {
            return self.components.get(name);
        }

        *self.miss_counts.entry(name.to_string()).or_insert(0) += 1;

        if self.debug {
            let mut known: Vec<_> = self.components.keys().cloned().collect();
            known.sort();
            panic!(
                "unknown component \"{name}\" — registered components: {known:?}, miss counts: {:?}",
                self.miss_counts
            );
        }

        tracing::warn!(component = name, "unknown component, rendering nothing");
        None
    }

    /// Snapshot of per-name lookup misses, for diagnostics.
    pub fn miss_counts(&self) -> &HashMap<String, u64> {
        &self.miss_counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_warns_but_succeeds() {
        let mut registry = ComponentRegistry::new(false);
        registry.register("View", Component { name: "View".into() });
        registry.register("View", Component { name: "View".into() });
        assert!(registry.get("View").is_some());
    }

    #[test]
    fn release_mode_miss_returns_none_and_counts() {
        let mut registry = ComponentRegistry::new(false);
        assert!(registry.get("Unknown").is_none());
        assert_eq!(registry.miss_counts()["Unknown"], 1);
        assert!(registry.get("Unknown").is_none());
        assert_eq!(registry.miss_counts()["Unknown"], 2);
    }

    #[test]
    #[should_panic(expected = "unknown component")]
    fn debug_mode_miss_panics_with_context() {
        let mut registry = ComponentRegistry::new(true);
        registry.get("Missing");
    }
}
