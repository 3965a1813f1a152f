// ============================================================================
// Runtime Errors
// ============================================================================
//
// Error taxonomy for the actor runtime:
// - ControlError: an illegal lifecycle transition was requested. Always
//   recoverable; retry once the preconditions hold.
// - Cancelled: the cooperative stop signal, not a failure. Raised to any
//   capability call parked or issued after stop()/exit().
// - RunError: what a service's run() returns; distinguishes cooperative
//   cancellation from a genuine failure.
// - LoadError: actor construction failed. Fatal for that one actor slot,
//   never retried automatically.
// - DeliverError: an inbound message named an actor this process does not
//   host.
//
// ============================================================================

use uuid::Uuid;

/// An illegal lifecycle transition was requested on an [`ActorHandle`].
///
/// [`ActorHandle`]: crate::ActorHandle
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    #[error("actor worker is not active")]
    NotActive,

    #[error("actor is exiting")]
    Exiting,

    #[error("a start is already pending")]
    StartPending,

    #[error("actor is already running")]
    AlreadyRunning,

    #[error("actor is already interrupted")]
    AlreadyInterrupted,

    #[error("actor is not running")]
    NotRunning,
}

/// Cooperative cancellation signal.
///
/// Surfaces from every blocking capability call once `stop()` or `exit()`
/// has been issued. A service's `run` is expected to let it propagate with
/// `?` rather than swallow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cancelled")]
pub struct Cancelled;

/// Outcome of a service's `run`.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Unwound cooperatively after a cancellation broadcast.
    #[error("run cancelled")]
    Cancelled(#[from] Cancelled),

    /// Anything else. Fatal for the actor: the worker terminates
    /// permanently and the failure is reported to the hub.
    #[error("run failed: {0}")]
    Failed(#[from] anyhow::Error),
}

/// Actor construction failed at registration time.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unknown actor type: {0}")]
    UnknownType(String),

    #[error("invalid config for actor type {kind}: {source}")]
    InvalidConfig {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("factory for actor type {kind} failed: {source}")]
    Factory {
        kind: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to spawn worker thread for {name}: {source}")]
    Worker {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Inbound delivery named an actor this process does not host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown actor: {0}")]
pub struct DeliverError(pub Uuid);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_messages_name_the_actor() {
        let unknown = LoadError::UnknownType("echo".into());
        assert_eq!(unknown.to_string(), "unknown actor type: echo");

        let worker = LoadError::Worker {
            name: "reader".into(),
            source: std::io::Error::other("no threads left"),
        };
        assert_eq!(
            worker.to_string(),
            "failed to spawn worker thread for reader: no threads left"
        );
    }
}
