use thiserror::Error;

/// The closed error taxonomy for this system (spec.md §7).
///
/// `ProtocolError` is unusual among these: the Receiver never returns it from
/// `apply_batch` (violations are warned-and-skipped per §4.6), but it is kept
/// in the shared enum so diagnostics can uniformly classify what was skipped
/// and why.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `require(name)` was called for a name outside the fixed whitelist, or
    /// under a Context that disallows module loading entirely.
    #[error("module not permitted: {0}")]
    RequireError(String),

    /// The Guest raised an exception during bundle execution or a callback
    /// invocation that was not independently recoverable.
    #[error("guest execution failed: {0}")]
    ExecutionError(String),

    /// The Engine's watchdog fired before `loadBundle` completed.
    #[error("bundle execution timed out after {0}ms")]
    TimeoutError(u64),

    /// An HTTP(S) bundle source could not be fetched, or responded with a
    /// non-2xx status.
    #[error("failed to fetch bundle from {url}: {reason}")]
    FetchError { url: String, reason: String },

    /// The Receiver observed an operation that violates its preconditions.
    /// Never surfaced as an `Err` from `apply_batch`; recorded for
    /// diagnostics and logging only.
    #[error("protocol violation: {0}")]
    ProtocolError(String),

    /// `loadBundle` was called a second time on the same Engine.
    #[error("bundle already loaded")]
    AlreadyLoaded,

    /// An operation was attempted on an Engine that has already been
    /// destroyed.
    #[error("engine has been destroyed")]
    Destroyed,
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_name_the_kind() {
        assert!(EngineError::TimeoutError(100).to_string().contains("timed out"));
        assert!(EngineError::AlreadyLoaded.to_string().contains("already loaded"));
    }
}
