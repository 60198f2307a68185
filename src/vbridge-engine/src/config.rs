use std::time::Duration;

use vbridge_sandbox::SandboxKind;

const DEFAULT_LOAD_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_BATCH_SIZE: usize = 2_000;
const DEFAULT_ACTIVITY_HISTORY_MS: u64 = 60_000;
const DEFAULT_MAX_LISTENERS: usize = 16;

/// Engine-wide configuration, set at construction and updatable afterward
/// via `updateConfig` (spec.md §4.2) for the subset of fields that are
/// safe to change on a live Engine (sandbox kind and debug mode are not —
/// changing those invalidates the running Context).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub(crate) sandbox_kind: SandboxKind,
    pub(crate) debug: bool,
    pub(crate) load_timeout: Duration,
    pub(crate) max_batch_size: Option<usize>,
    pub(crate) activity_history: Duration,
    pub(crate) max_listeners: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sandbox_kind: SandboxKind::Auto,
            debug: cfg!(debug_assertions),
            load_timeout: Duration::from_millis(DEFAULT_LOAD_TIMEOUT_MS),
            max_batch_size: Some(DEFAULT_MAX_BATCH_SIZE),
            activity_history: Duration::from_millis(DEFAULT_ACTIVITY_HISTORY_MS),
            max_listeners: DEFAULT_MAX_LISTENERS,
        }
    }
}

/// Consuming builder for [`EngineConfig`], in the teacher's
/// `SandboxBuilder` style (`with_*` methods taking and returning `self`).
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sandbox_kind(mut self, kind: SandboxKind) -> Self {
        self.config.sandbox_kind = kind;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.config.load_timeout = timeout;
        self
    }

    /// `None` disables the backpressure check entirely.
    pub fn with_max_batch_size(mut self, max: Option<usize>) -> Self {
        self.config.max_batch_size = max;
        self
    }

    pub fn with_activity_history(mut self, history: Duration) -> Self {
        self.config.activity_history = history;
        self
    }

    pub fn with_max_listeners(mut self, max: usize) -> Self {
        self.config.max_listeners = max;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Merge a partial `CONFIG_UPDATE` message in-place. Fields absent
    /// from `patch` are left untouched.
    pub fn apply_patch(&mut self, patch: &ConfigPatch) {
        if let Some(timeout_ms) = patch.load_timeout_ms {
            self.load_timeout = Duration::from_millis(timeout_ms);
        }
        if let Some(max) = patch.max_batch_size {
            self.max_batch_size = max;
        }
        if let Some(history_ms) = patch.activity_history_ms {
            self.activity_history = Duration::from_millis(history_ms);
        }
        if let Some(max_listeners) = patch.max_listeners {
            self.max_listeners = max_listeners;
        }
    }
}

/// The subset of [`EngineConfig`] a running Engine accepts updates to
/// (spec.md §4.2 "CONFIG_UPDATE"). `None` fields are left unchanged.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ConfigPatch {
    #[serde(rename = "loadTimeoutMs")]
    pub load_timeout_ms: Option<u64>,
    #[serde(rename = "maxBatchSize")]
    pub max_batch_size: Option<Option<usize>>,
    #[serde(rename = "activityHistoryMs")]
    pub activity_history_ms: Option<u64>,
    #[serde(rename = "maxListeners")]
    pub max_listeners: Option<usize>,
}
