// ============================================================================
// Service Contract - user-supplied actor logic & its capability surface
// ============================================================================
//
// A Service is one unit of independently scheduled logic. The runtime drives
// it through run(); everything the service may do back to the runtime goes
// through the ServiceContext, whose methods route through the dispatch set
// currently installed for the owning actor.
//
// The context is cheap to clone and safe to hand to helper threads the
// service spawns itself: recv/tell/ask may legally be called concurrently
// on the actor's behalf.
//
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use crate::error::{Cancelled, RunError};
use crate::runtime::cancel::CancelRegistry;
use crate::runtime::mailbox::Envelope;

/// User-supplied actor logic.
///
/// `run` is invoked once per start cycle on the actor's dedicated worker
/// thread. Let [`Cancelled`] propagate out with `?`; the runtime then calls
/// `on_cancel` and parks the actor back in Idle. Any other error is fatal
/// for the actor.
pub trait Service: Send {
    fn run(&mut self, ctx: &ServiceContext) -> Result<(), RunError>;

    /// Best-effort cleanup after a cancellation or on final exit.
    fn on_cancel(&mut self) {}
}

/// Capability surface handed to [`Service::run`].
#[derive(Clone)]
pub struct ServiceContext {
    actor_id: Uuid,
    registry: Arc<CancelRegistry>,
}

impl ServiceContext {
    pub(crate) fn new(actor_id: Uuid, registry: Arc<CancelRegistry>) -> Self {
        Self { actor_id, registry }
    }

    /// Id of the actor this context belongs to.
    pub fn actor_id(&self) -> Uuid {
        self.actor_id
    }

    /// Whether cancellation has been issued. Never blocks.
    pub fn interrupted(&self) -> bool {
        self.registry.table().interrupted()
    }

    /// Cancellable timed wait: returns at `duration` or raises immediately
    /// on a cancellation broadcast, whichever is first.
    pub fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        self.registry.table().sleep(duration)
    }

    /// Time since the current run cycle started. Never blocks.
    pub fn elapsed(&self) -> Result<Duration, Cancelled> {
        self.registry.table().elapsed()
    }

    /// Pop the oldest inbound message, blocking until one arrives.
    pub fn recv(&self) -> Result<Envelope, Cancelled> {
        self.registry.table().recv()
    }

    /// Whether the mailbox holds undelivered messages. Never blocks.
    pub fn has_pending(&self) -> Result<bool, Cancelled> {
        self.registry.table().has_pending()
    }

    /// Broadcast a payload to every reachable actor; blocks until the hub
    /// confirms.
    pub fn send_all(&self, payload: Value) -> Result<(), Cancelled> {
        self.registry.table().send_all(payload)
    }

    /// Send a payload to specific actors; blocks until the hub confirms.
    pub fn send_to(&self, payload: Value, targets: Vec<Uuid>) -> Result<(), Cancelled> {
        self.registry.table().send_to(payload, targets)
    }

    /// Publish a keyed value to the environment; blocks until the hub
    /// confirms.
    pub fn tell(&self, key: &str, value: Value) -> Result<(), Cancelled> {
        self.registry.table().tell(key, value)
    }

    /// Request a keyed value from the environment; blocks for the reply.
    pub fn ask(&self, key: &str) -> Result<Value, Cancelled> {
        self.registry.table().ask(key)
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("actor_id", &self.actor_id)
            .finish_non_exhaustive()
    }
}
