//! Execution watchdogs raced against Guest execution (`loadBundle`, spec.md
//! §5 "execution must be racable against a deadline"). Ported from the
//! teacher's `sandbox::monitor` module: a simple user-facing
//! [`ExecutionMonitor`] trait plus a sealed [`MonitorSet`] composition
//! trait so a single monitor and a tuple of monitors both produce one
//! racing future, with the winner's name recorded for diagnostics.
//!
//! Fail-closed: if any monitor's `get_monitor()` returns `Err`, execution
//! never starts (spec.md §5 "a watchdog that fails to arm must block
//! execution, not silently skip monitoring").

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use vbridge_wire::{EngineError, Result};

use crate::metrics::record_monitor_termination;

fn record_monitor_triggered(name: &'static str) {
    record_monitor_termination(name);
    tracing::warn!(monitor = name, "execution monitor fired, terminating");
}

/// A single termination condition. Implementors only need a future that
/// resolves once the limit is breached, and a name for logging; the
/// racing/composition machinery lives in [`MonitorSet`].
pub trait ExecutionMonitor: Send + Sync {
    /// Build the future that resolves when this monitor's limit is hit.
    /// Runs synchronously on the calling thread so implementations can
    /// capture anything thread-local before the future is polled
    /// elsewhere; return `Err` to fail closed.
    fn get_monitor(&self) -> Result<Pin<Box<dyn Future<Output = ()> + Send>>>;

    /// Name used in logs and the `monitor_type` metric label.
    fn name(&self) -> &'static str;
}

mod private {
    pub trait Sealed {}
}

/// Sealed composition trait: a single monitor or a tuple of monitors both
/// reduce to one racing future. Not implementable outside this crate.
pub trait MonitorSet: private::Sealed + Send + Sync {
    /// Produce the single future that completes when the first monitor in
    /// this set fires.
    fn to_race(&self) -> Result<Pin<Box<dyn Future<Output = ()> + Send>>>;
}

impl<M: ExecutionMonitor> private::Sealed for M {}

impl<M: ExecutionMonitor> MonitorSet for M {
    fn to_race(&self) -> Result<Pin<Box<dyn Future<Output = ()> + Send>>> {
        let future = self.get_monitor()?;
        let name = self.name();
        Ok(Box::pin(async move {
            future.await;
            record_monitor_triggered(name);
        }))
    }
}

macro_rules! impl_monitor_set_tuple {
    (($($p:ident: $P:ident),+)) => {
        impl<$($P: ExecutionMonitor),+> private::Sealed for ($($P,)+) {}

        impl<$($P: ExecutionMonitor),+> MonitorSet for ($($P,)+) {
            fn to_race(&self) -> Result<Pin<Box<dyn Future<Output = ()> + Send>>> {
                let ($($p,)+) = self;
                $(let $p = ($p.get_monitor()?, $p.name());)+
                Ok(Box::pin(async move {
                    let winner = tokio::select! {
                        $(_ = $p.0 => $p.1,)+
                    };
                    record_monitor_triggered(winner);
                }))
            }
        }
    };
}

impl_monitor_set_tuple!((m0: M0));
impl_monitor_set_tuple!((m0: M0, m1: M1));
impl_monitor_set_tuple!((m0: M0, m1: M1, m2: M2));

/// Terminates execution once a wall-clock deadline elapses. The only
/// monitor this workspace needs today — `loadBundle`'s timeout
/// (spec.md §4.2) — but the trait is written so a second limit (e.g. an
/// operation-count ceiling) composes via a tuple without touching the
/// call sites that race against it.
pub struct TimeoutMonitor {
    timeout: Duration,
}

impl TimeoutMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ExecutionMonitor for TimeoutMonitor {
    fn get_monitor(&self) -> Result<Pin<Box<dyn Future<Output = ()> + Send>>> {
        let timeout = self.timeout;
        Ok(Box::pin(async move {
            tokio::time::sleep(timeout).await;
        }))
    }

    fn name(&self) -> &'static str {
        "timeout"
    }
}

/// Race `work` against every monitor in `monitors`. Returns the work's
/// output if it finishes first, or `EngineError::TimeoutError` (keyed by
/// whichever deadline this crate currently only ever installs) if a
/// monitor fires first.
///
/// Deliberately not `'static`-bound on `work`: `tokio::select!` drives
/// both arms from this function's own stack frame rather than spawning,
/// so a borrowing future (e.g. a `Context::eval_async` call borrowing the
/// sandbox it runs in) can be raced directly.
pub async fn race<T: Send>(
    monitors: &impl MonitorSet,
    timeout_ms: u64,
    work: impl Future<Output = T> + Send,
) -> Result<T> {
    let watchdog = monitors.to_race()?;
    tokio::select! {
        result = work => Ok(result),
        _ = watchdog => Err(EngineError::TimeoutError(timeout_ms)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn work_finishing_first_wins() {
        let monitor = TimeoutMonitor::new(Duration::from_millis(200));
        let result = race(&monitor, 200, async { 42 }).await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn monitor_firing_first_times_out() {
        let monitor = TimeoutMonitor::new(Duration::from_millis(10));
        let result: Result<()> = race(&monitor, 10, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        })
        .await;
        assert!(matches!(result, Err(EngineError::TimeoutError(10))));
    }
}
