// ============================================================================
// Dispatch Sets - capability routing with O(1) cancellation
// ============================================================================
//
// Every capability a service can call routes through the dispatch set
// currently installed in the cancel registry. Two sets exist per run cycle:
//
// - LiveDispatch: real handlers, built fresh at the top of each Running
//   cycle (it carries that cycle's start instant and the hub reference).
// - CancelledDispatch: installed by stop()/exit(); every operation raises
//   Cancelled immediately, except interrupted() which reports true.
//
// Swapping the installed set is what makes cancellation O(1): in-flight
// calls already parked are woken through their registered wait handles, and
// every future call executes the cancelling variant without a per-call-site
// flag check.
//
// ============================================================================

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use uuid::Uuid;

use crate::error::Cancelled;
use crate::hub::{Hub, HubEnvelope, OutboundRequest, ReplySlot};
use crate::runtime::cancel::CancelRegistry;
use crate::runtime::handle::Flags;
use crate::runtime::mailbox::{Envelope, Mailbox};

/// One method per capability operation. The installed implementation is
/// swapped wholesale on cancellation.
pub(crate) trait DispatchOps: Send + Sync {
    fn interrupted(&self) -> bool;
    fn sleep(&self, duration: Duration) -> Result<(), Cancelled>;
    fn elapsed(&self) -> Result<Duration, Cancelled>;
    fn recv(&self) -> Result<Envelope, Cancelled>;
    fn has_pending(&self) -> Result<bool, Cancelled>;
    fn send_all(&self, payload: Value) -> Result<(), Cancelled>;
    fn send_to(&self, payload: Value, targets: Vec<Uuid>) -> Result<(), Cancelled>;
    fn tell(&self, key: &str, value: Value) -> Result<(), Cancelled>;
    fn ask(&self, key: &str) -> Result<Value, Cancelled>;
}

/// Live handlers for one Running cycle.
pub(crate) struct LiveDispatch {
    actor_id: Uuid,
    flags: Arc<Flags>,
    mailbox: Arc<Mailbox>,
    registry: Arc<CancelRegistry>,
    hub: Arc<dyn Hub>,
    started: Instant,
}

impl LiveDispatch {
    pub fn new(
        actor_id: Uuid,
        flags: Arc<Flags>,
        mailbox: Arc<Mailbox>,
        registry: Arc<CancelRegistry>,
        hub: Arc<dyn Hub>,
    ) -> Self {
        Self {
            actor_id,
            flags,
            mailbox,
            registry,
            hub,
            started: Instant::now(),
        }
    }

    /// Hub round trip: register the wait handle BEFORE handing the request
    /// over, so a synchronous hub reply cannot race ahead of registration;
    /// park; deregister. A wake with the interrupted flag set was the
    /// cancellation broadcast, not a reply.
    fn hub_round_trip(&self, request: OutboundRequest) -> Result<(), Cancelled> {
        let wait = self.registry.register();
        tracing::trace!(actor = %self.actor_id, opcode = request.opcode(), "hub request");
        self.hub.dispatch(HubEnvelope {
            sender: self.actor_id,
            request,
            wait: wait.clone(),
        });
        wait.wait();
        self.registry.deregister(&wait);
        if self.flags.is_interrupted() {
            return Err(Cancelled);
        }
        Ok(())
    }
}

impl DispatchOps for LiveDispatch {
    fn interrupted(&self) -> bool {
        self.flags.is_interrupted()
    }

    fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        let wait = self.registry.register();
        let signaled = wait.wait_timeout(duration);
        self.registry.deregister(&wait);
        // Only a cancellation broadcast signals a sleep handle.
        if signaled {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    fn elapsed(&self) -> Result<Duration, Cancelled> {
        Ok(self.started.elapsed())
    }

    fn recv(&self) -> Result<Envelope, Cancelled> {
        self.mailbox.pop()
    }

    fn has_pending(&self) -> Result<bool, Cancelled> {
        Ok(self.mailbox.has_pending())
    }

    fn send_all(&self, payload: Value) -> Result<(), Cancelled> {
        self.hub_round_trip(OutboundRequest::SendAll { payload })
    }

    fn send_to(&self, payload: Value, targets: Vec<Uuid>) -> Result<(), Cancelled> {
        self.hub_round_trip(OutboundRequest::SendTo { payload, targets })
    }

    fn tell(&self, key: &str, value: Value) -> Result<(), Cancelled> {
        self.hub_round_trip(OutboundRequest::Tell {
            key: key.to_owned(),
            value,
        })
    }

    fn ask(&self, key: &str) -> Result<Value, Cancelled> {
        let reply = ReplySlot::new();
        self.hub_round_trip(OutboundRequest::Ask {
            key: key.to_owned(),
            reply: reply.clone(),
        })?;
        Ok(reply.take().unwrap_or(Value::Null))
    }
}

/// Post-cancellation handlers: everything raises, interrupted() is the one
/// exception left untouched by the swap and keeps reporting the flag. A
/// context cloned by a helper thread can outlive the cancelled cycle, and
/// must read false again once the actor is back to Idle.
pub(crate) struct CancelledDispatch {
    flags: Arc<Flags>,
}

impl CancelledDispatch {
    pub fn new(flags: Arc<Flags>) -> Self {
        Self { flags }
    }
}

impl DispatchOps for CancelledDispatch {
    fn interrupted(&self) -> bool {
        self.flags.is_interrupted()
    }

    fn sleep(&self, _duration: Duration) -> Result<(), Cancelled> {
        Err(Cancelled)
    }

    fn elapsed(&self) -> Result<Duration, Cancelled> {
        Err(Cancelled)
    }

    fn recv(&self) -> Result<Envelope, Cancelled> {
        Err(Cancelled)
    }

    fn has_pending(&self) -> Result<bool, Cancelled> {
        Err(Cancelled)
    }

    fn send_all(&self, _payload: Value) -> Result<(), Cancelled> {
        Err(Cancelled)
    }

    fn send_to(&self, _payload: Value, _targets: Vec<Uuid>) -> Result<(), Cancelled> {
        Err(Cancelled)
    }

    fn tell(&self, _key: &str, _value: Value) -> Result<(), Cancelled> {
        Err(Cancelled)
    }

    fn ask(&self, _key: &str) -> Result<Value, Cancelled> {
        Err(Cancelled)
    }
}
