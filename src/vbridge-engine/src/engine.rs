//! Ties every other crate in this workspace to one object an embedder
//! actually holds: pick a sandbox, install the polyfills, load a bundle
//! racing the load-timeout watchdog, and route everything that crosses
//! the wire afterward.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::instrument;
use vbridge_diagnostics::ActivitySnapshot;
use vbridge_registry::{Callback, CallbackRegistry, Component, ComponentRegistry};
use vbridge_receiver::{Dispatch, InstrumentedReceiver, Receiver};
use vbridge_renderer::Renderer;
use vbridge_sandbox::{Context, Provider, Runtime};
use vbridge_wire::{EngineError, GuestEvent, HostMessage, Result, Value};

use crate::bundle::BundleSource;
use crate::config::{ConfigPatch, EngineConfig};
use crate::listeners::EventEmitter;
use crate::message;
use crate::metrics::{record_batch_apply_duration_us, record_guest_async_error, EngineMetricsGuard};
use crate::monitor::{self, TimeoutMonitor};
use crate::polyfills::{self, PolyfillState};

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

fn config_to_value(config: &EngineConfig) -> Value {
    let mut map = std::collections::HashMap::new();
    map.insert("debug".to_string(), Value::Bool(config.debug));
    map.insert(
        "loadTimeoutMs".to_string(),
        Value::Num(config.load_timeout.as_millis() as f64),
    );
    map.insert(
        "maxBatchSize".to_string(),
        match config.max_batch_size {
            Some(n) => Value::Num(n as f64),
            None => Value::Null,
        },
    );
    Value::Object(map)
}

/// What components were still pending registration when the Engine was
/// constructed but before `createReceiver` moved them into a live
/// [`Receiver`]. Kept as a plain vec rather than a [`ComponentRegistry`]
/// directly — a registry wants a `debug` flag at construction, which this
/// Engine only learns for certain once a `Receiver` is actually created.
type PendingComponents = Vec<(String, Component)>;

/// One sandboxed bundle and everything wired around it: the Context it
/// runs in, the shadow tree it drives, the callback/component registries
/// that cross the isolation boundary, and the health bookkeeping an
/// embedder polls.
pub struct Engine {
    id: String,
    config: EngineConfig,
    provider: Arc<dyn Provider>,
    runtime: Option<Box<dyn Runtime>>,
    context: Option<Box<dyn Context>>,
    polyfills: Arc<PolyfillState>,
    callbacks: Arc<Mutex<CallbackRegistry>>,
    pending_calls: Arc<Mutex<VecDeque<(String, Vec<Value>)>>>,
    pending_components: PendingComponents,
    receiver: Option<InstrumentedReceiver>,
    renderer: Arc<Mutex<Renderer>>,
    emitter: EventEmitter,
    loaded: bool,
    destroyed: bool,
    _metrics: EngineMetricsGuard,
}

impl Engine {
    /// Construct an Engine: resolve the configured sandbox kind to a
    /// provider, spin up one Runtime and Context, and install the
    /// polyfills bundle code assumes exist. Does not load a bundle —
    /// that's `loadBundle`'s job, and is allowed to fail independently
    /// of construction.
    #[instrument(skip(config), fields(sandbox_kind = ?config.sandbox_kind))]
    pub async fn new(config: EngineConfig) -> Result<Self> {
        let id = format!("engine_{}", NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed));
        let provider = vbridge_sandbox::resolve(config.sandbox_kind);
        let mut runtime = provider.create_runtime()?;
        let mut context = runtime.create_context()?;

        let polyfills = Arc::new(PolyfillState::new(config_to_value(&config)));
        let callbacks = Arc::new(Mutex::new(CallbackRegistry::new()));
        let renderer = Arc::new(Mutex::new(Renderer::new()));

        polyfills::install(context.as_mut(), polyfills.clone(), callbacks.clone(), config.debug).await?;
        crate::render_bridge::install(context.as_mut(), renderer.clone(), polyfills.clone()).await?;

        Ok(Self {
            id,
            emitter: EventEmitter::new(config.max_listeners),
            config,
            provider,
            runtime: Some(runtime),
            context: Some(context),
            polyfills,
            callbacks,
            pending_calls: Arc::new(Mutex::new(VecDeque::new())),
            pending_components: Vec::new(),
            receiver: None,
            renderer,
            loaded: false,
            destroyed: false,
            _metrics: EngineMetricsGuard::new(),
        })
    }

    /// Expose a Host-native function to the Guest under a freshly minted
    /// id, callable via `require('host-bridge').callNative(id, ...args)`.
    /// This is the inverse direction of a Guest-originated prop callback:
    /// the Host decides what's available, the Guest only ever sees an
    /// opaque id (spec.md §4.3).
    pub fn register_native_function(&mut self, f: Callback) -> String {
        self.callbacks.lock().unwrap().register(f)
    }

    /// A [`Dispatch`] a `Receiver` can hand `call_prop_function` to route
    /// a Guest-originated prop callback (e.g. `onPress`) back toward the
    /// Guest. Fire-and-forget at the Receiver's call site: the actual
    /// `CALL_FUNCTION` message is queued here and only sent the next time
    /// [`Engine::flush_pending_calls`] runs, since `Dispatch` itself is
    /// synchronous and dispatching into the sandbox is not.
    pub fn dispatch_for_receiver(&self) -> Dispatch {
        let pending = self.pending_calls.clone();
        Arc::new(move |fn_id, args| {
            pending.lock().unwrap().push_back((fn_id.to_string(), args));
        })
    }

    /// Send every call queued by [`Engine::dispatch_for_receiver`] into
    /// the Guest since the last flush.
    #[instrument(skip(self), fields(engine = %self.id))]
    pub async fn flush_pending_calls(&mut self) -> Result<()> {
        self.require_not_destroyed()?;
        let calls: Vec<_> = self.pending_calls.lock().unwrap().drain(..).collect();
        for (fn_id, args) in calls {
            self.call_function(fn_id, args).await?;
        }
        Ok(())
    }

    /// Opaque id for logging/diagnostics attribution.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Which sandbox strategy this Engine actually ended up using (after
    /// `Auto` resolution).
    pub fn sandbox_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Shared handle to the render-bridge's `Renderer`, for a caller that
    /// wants to drive host-config calls directly rather than through the
    /// Guest (e.g. a native test harness exercising the shadow tree
    /// without a bundle at all).
    pub fn renderer(&self) -> Arc<Mutex<Renderer>> {
        self.renderer.clone()
    }

    /// Register a component by name, available to the shadow tree once
    /// `createReceiver` runs (or immediately, if a `Receiver` already
    /// exists).
    pub fn register(&mut self, name: impl Into<String>, component: Component) {
        let name = name.into();
        if let Some(receiver) = &mut self.receiver {
            receiver.receiver.register_component(name, component);
        } else {
            self.pending_components.push((name, component));
        }
    }

    /// Create the shadow tree this Engine's operations will apply
    /// against, seeded with whatever components were registered before
    /// this call. Calling this more than once replaces the previous
    /// Receiver outright — there is no merge.
    pub fn create_receiver(&mut self) -> &mut InstrumentedReceiver {
        let mut registry = ComponentRegistry::new(self.config.debug);
        for (name, component) in self.pending_components.drain(..) {
            registry.register(name, component);
        }
        let receiver = Receiver::new(registry, self.config.max_batch_size);
        self.receiver = Some(InstrumentedReceiver::new(receiver, self.config.activity_history));
        self.receiver.as_mut().expect("just inserted")
    }

    fn require_not_destroyed(&self) -> Result<()> {
        if self.destroyed {
            return Err(EngineError::Destroyed);
        }
        Ok(())
    }

    /// Evaluate a bundle's source text, racing it against the configured
    /// load timeout. `loadBundle` may only be called once per Engine
    /// (spec.md §4.2 "AlreadyLoaded").
    #[instrument(skip(self, source), fields(engine = %self.id))]
    pub async fn load_bundle(&mut self, source: impl Into<String>) -> Result<()> {
        self.require_not_destroyed()?;
        if self.loaded {
            return Err(EngineError::AlreadyLoaded);
        }

        let source = match BundleSource::detect(source) {
            BundleSource::Inline(text) => text,
            BundleSource::Url(url) => {
                return Err(EngineError::FetchError {
                    url,
                    reason: "remote bundle fetch is not implemented in this workspace".to_string(),
                })
            }
        };

        let context = self.context.as_mut().expect("context present until destroy");
        let timeout = self.config.load_timeout;
        let monitor = TimeoutMonitor::new(timeout);

        let work = context.eval_async(&source);
        let result = monitor::race(&monitor, timeout.as_millis() as u64, work).await;

        match result {
            Ok(Ok(_)) => {
                self.loaded = true;
                self.emitter.emit("load", &Value::Null);
                Ok(())
            }
            Ok(Err(err)) => {
                self.emitter.emit("error", &Value::Str(err.to_string()));
                Err(err)
            }
            Err(timeout_err) => {
                self.emitter.emit("error", &Value::Str(timeout_err.to_string()));
                Err(timeout_err)
            }
        }
    }

    /// Subscribe to one of the Engine's named events (`load`, `error`,
    /// `destroy`, `operation`, `message`, `fatalError`).
    pub fn on(&mut self, event: impl Into<String>, listener: crate::listeners::Listener) {
        self.emitter.on(event, listener);
    }

    /// Pull any operation batches and guest events the bundle has queued
    /// via `__sendToHost`/`__sendEventToHost` since the last drain,
    /// applying the batches to `receiver` (if one exists) and firing
    /// `operation`/`message` listeners for each.
    #[instrument(skip(self), fields(engine = %self.id))]
    pub fn drain_guest_output(&mut self) -> Result<()> {
        self.require_not_destroyed()?;

        for batch in self.polyfills.drain_operations() {
            self.emitter.emit(
                "operation",
                &Value::Num(batch.operations.len() as f64),
            );
            if let Some(receiver) = &mut self.receiver {
                let started = std::time::Instant::now();
                receiver.apply_batch(batch)?;
                record_batch_apply_duration_us(started.elapsed().as_secs_f64() * 1_000_000.0);
            }
        }

        for GuestEvent { event, payload } in self.polyfills.drain_guest_events() {
            self.emitter.emit("message", &payload);
            self.emitter.emit(&event, &payload);
        }

        for message in self.polyfills.drain_async_errors() {
            record_guest_async_error();
            self.emitter.emit("error", &Value::Str(message));
        }

        Ok(())
    }

    /// Deliver every native timer that has fired since the last call into
    /// the Guest's `__fireTimer` dispatch helper (spec.md §4.2 timer
    /// handle-mapping). An embedder drives this on its own event-loop
    /// tick, the same way it drives [`Engine::flush_pending_calls`].
    #[instrument(skip(self), fields(engine = %self.id))]
    pub async fn pump_timers(&mut self) -> Result<()> {
        self.require_not_destroyed()?;
        let fired = self.polyfills.drain_fired_timers();
        if fired.is_empty() {
            return Ok(());
        }
        let context = self.context.as_mut().expect("context present until destroy");
        for (handle, is_final) in fired {
            context
                .eval_async(&format!("__fireTimer({handle}, {is_final})"))
                .await?;
        }
        Ok(())
    }

    /// Send a `HOST_EVENT` into the Guest bundle.
    #[instrument(skip(self, payload), fields(engine = %self.id, event_name))]
    pub async fn send_event(&mut self, event_name: impl Into<String>, payload: Value) -> Result<()> {
        self.require_not_destroyed()?;
        let context = self.context.as_mut().expect("context present until destroy");
        message::dispatch_to_guest(
            context.as_mut(),
            &HostMessage::HostEvent {
                event_name: event_name.into(),
                payload,
            },
        )
        .await
    }

    /// Invoke a Guest-held function prop by id, e.g. because the Receiver
    /// observed a native `onPress`. Routes through [`HostMessage::CallFunction`]
    /// the same way any other Host→Guest call does.
    #[instrument(skip(self, args), fields(engine = %self.id, fn_id))]
    pub async fn call_function(&mut self, fn_id: impl Into<String>, args: Vec<Value>) -> Result<()> {
        self.require_not_destroyed()?;
        let context = self.context.as_mut().expect("context present until destroy");
        message::dispatch_to_guest(context.as_mut(), &HostMessage::CallFunction { fn_id: fn_id.into(), args }).await
    }

    /// Apply a partial config update (`CONFIG_UPDATE`, spec.md §4.2). The
    /// Guest is also notified, since some fields (e.g. log verbosity) are
    /// meaningful on that side too.
    #[instrument(skip(self, patch), fields(engine = %self.id))]
    pub async fn update_config(&mut self, patch: ConfigPatch) -> Result<()> {
        self.require_not_destroyed()?;
        self.config.apply_patch(&patch);
        if let Some(max_listeners) = patch.max_listeners {
            self.emitter.set_max_listeners(max_listeners);
        }
        self.polyfills.set_config(config_to_value(&self.config));

        let context = self.context.as_mut().expect("context present until destroy");
        let config_json = serde_json::to_value(&patch).map_err(|err| EngineError::ProtocolError(err.to_string()))?;
        let config_value = Value::try_from(config_json).map_err(EngineError::ProtocolError)?;
        message::dispatch_to_guest(context.as_mut(), &HostMessage::ConfigUpdate { config: config_value }).await
    }

    /// Whether this Engine has finished `loadBundle` successfully.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Whether this Engine has been destroyed (by either `destroy` or
    /// `forceDestroy`).
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Current activity snapshot for this Engine's shadow tree, or `None`
    /// if `createReceiver` was never called.
    pub fn activity_snapshot(&self, window_ms: u64, bucket_ms: u64) -> Option<ActivitySnapshot> {
        self.receiver.as_ref().map(|r| r.activity_snapshot(window_ms, bucket_ms))
    }

    /// Root-level render view of the shadow tree, or `None` if
    /// `createReceiver` was never called.
    pub fn render(&mut self) -> Option<vbridge_receiver::RenderOutput> {
        self.receiver.as_mut().map(|r| r.receiver.render())
    }

    /// Node count, depth, and other cheap resource stats — `getResourceStats`.
    pub fn get_resource_stats(&self) -> Option<vbridge_receiver::ReceiverStats> {
        self.receiver.as_ref().map(|r| r.receiver.get_stats())
    }

    /// `getHealth()`: a coarse liveness signal for an embedder's own
    /// monitoring, not a substitute for `getDiagnostics()`.
    pub fn get_health(&self) -> EngineHealth {
        EngineHealth {
            loaded: self.loaded,
            destroyed: self.destroyed,
            sandbox: self.provider.name(),
            node_count: self.receiver.as_ref().map(|r| r.receiver.node_count()),
            pending_callbacks: self.callbacks.lock().unwrap().size(),
        }
    }

    /// Orderly teardown: dispose the Context, then the Runtime, clear
    /// every callback and listener, and emit `destroy`. Idempotent —
    /// calling this on an already-destroyed Engine is a no-op.
    #[instrument(skip(self), fields(engine = %self.id))]
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.polyfills.clear_all_timers();
        if let Some(context) = self.context.take() {
            context.dispose();
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.dispose();
        }
        self.callbacks.lock().unwrap().clear();
        self.destroyed = true;
        self.emitter.emit("destroy", &Value::Null);
        self.emitter.clear_all();
    }

    /// Same as [`Engine::destroy`], kept as a distinct name so call sites
    /// that are specifically reacting to an unrecoverable error (a
    /// watchdog firing, a fatal Guest exception) read as intentional
    /// rather than a normal shutdown.
    pub fn force_destroy(&mut self) {
        self.destroy();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// `getHealth()`'s shape.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineHealth {
    pub loaded: bool,
    pub destroyed: bool,
    pub sandbox: &'static str,
    #[serde(rename = "nodeCount")]
    pub node_count: Option<usize>,
    #[serde(rename = "pendingCallbacks")]
    pub pending_callbacks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> EngineConfig {
        EngineConfig::builder()
            .with_sandbox_kind(vbridge_sandbox::SandboxKind::Embedded)
            .with_load_timeout(Duration::from_millis(500))
            .build()
    }

    #[tokio::test]
    async fn load_bundle_then_drain_applies_operations() {
        let mut engine = Engine::new(test_config()).await.unwrap();
        engine.register("View", Component { name: "View".into() });
        engine.create_receiver();

        engine
            .load_bundle(
                r#"
                var hb = require('host-bridge');
                hb.sendToHost({
                    version: 1,
                    batchId: 1,
                    operations: [{ op: 'CREATE', id: 1, nodeType: 'View', props: {} }]
                });
                "#,
            )
            .await
            .unwrap();

        engine.drain_guest_output().unwrap();
        let stats = engine.get_resource_stats().unwrap();
        assert_eq!(stats.node_count, 1);
    }

    #[tokio::test]
    async fn load_bundle_twice_is_already_loaded() {
        let mut engine = Engine::new(test_config()).await.unwrap();
        engine.load_bundle("1").await.unwrap();
        let second = engine.load_bundle("1").await;
        assert!(matches!(second, Err(EngineError::AlreadyLoaded)));
    }

    #[tokio::test]
    async fn load_bundle_on_destroyed_engine_errors() {
        let mut engine = Engine::new(test_config()).await.unwrap();
        engine.destroy();
        let result = engine.load_bundle("1").await;
        assert!(matches!(result, Err(EngineError::Destroyed)));
    }

    #[tokio::test]
    async fn slow_bundle_times_out() {
        let mut config = test_config();
        config.load_timeout = Duration::from_millis(20);
        let mut engine = Engine::new(config).await.unwrap();
        let result = engine.load_bundle("while (true) {}").await;
        assert!(matches!(result, Err(EngineError::TimeoutError(_))));
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let mut engine = Engine::new(test_config()).await.unwrap();
        engine.destroy();
        engine.destroy();
        assert!(engine.is_destroyed());
    }

    #[tokio::test]
    async fn url_source_is_a_fetch_error() {
        let mut engine = Engine::new(test_config()).await.unwrap();
        let result = engine.load_bundle("https://example.com/bundle.js").await;
        assert!(matches!(result, Err(EngineError::FetchError { .. })));
    }

    #[test]
    #[ignore = "installs a global recorder; run separately so other tests don't pollute it"]
    fn constructing_and_destroying_an_engine_emits_metrics() {
        let recorder = metrics_util::debugging::DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        recorder.install().unwrap();

        let snapshot = {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let mut engine = Engine::new(test_config()).await.unwrap();
                engine.destroy();
            });
            snapshotter.snapshot()
        };
        let snapshot = snapshot.into_vec();
        assert!(!snapshot.is_empty());
    }
}
