//! Metric names and the RAII active-count guard, grounded directly on the
//! teacher's `sandbox::metrics` module: a gauge incremented on
//! construction and decremented on drop, plus a lifetime counter that
//! only ever goes up.

use tracing::{instrument, Level};

static METRIC_ACTIVE_ENGINES: &str = "vbridge_engine_active";
static METRIC_ENGINES_LOADED_TOTAL: &str = "vbridge_engine_loaded_total";
static METRIC_ENGINES_DESTROYED_TOTAL: &str = "vbridge_engine_destroyed_total";
pub(crate) static METRIC_BATCH_APPLY_DURATION: &str = "vbridge_batch_apply_duration_us";
pub(crate) static METRIC_MONITOR_TERMINATIONS: &str = "vbridge_monitor_terminations_total";
pub(crate) static METRIC_MONITOR_TYPE_LABEL: &str = "monitor_type";
static METRIC_GUEST_ASYNC_ERRORS: &str = "vbridge_guest_async_errors_total";

/// Held for the lifetime of one `Engine`. Construction bumps the active
/// gauge and the lifetime counter; drop always decrements the gauge, so
/// every exit path (`destroy`, `forceDestroy`, a dropped `Engine` that
/// was never explicitly destroyed) keeps the count honest.
pub(crate) struct EngineMetricsGuard;

impl EngineMetricsGuard {
    #[instrument(skip_all, level = Level::DEBUG)]
    pub(crate) fn new() -> Self {
        metrics::gauge!(METRIC_ACTIVE_ENGINES).increment(1);
        metrics::counter!(METRIC_ENGINES_LOADED_TOTAL).increment(1);
        Self
    }
}

impl Drop for EngineMetricsGuard {
    #[instrument(skip_all, level = Level::DEBUG)]
    fn drop(&mut self) {
        metrics::gauge!(METRIC_ACTIVE_ENGINES).decrement(1);
        metrics::counter!(METRIC_ENGINES_DESTROYED_TOTAL).increment(1);
    }
}

/// Record a terminated watchdog, labeled by which monitor fired.
pub(crate) fn record_monitor_termination(monitor_type: &'static str) {
    metrics::counter!(METRIC_MONITOR_TERMINATIONS, METRIC_MONITOR_TYPE_LABEL => monitor_type).increment(1);
}

/// Record how long one batch took to apply, in microseconds.
pub(crate) fn record_batch_apply_duration_us(duration_us: f64) {
    metrics::histogram!(METRIC_BATCH_APPLY_DURATION).record(duration_us);
}

/// Record a caught exception from a timer callback or unhandled Guest
/// promise rejection (spec.md §7 "counted, and emitted as `error` events").
pub(crate) fn record_guest_async_error() {
    metrics::counter!(METRIC_GUEST_ASYNC_ERRORS).increment(1);
}
