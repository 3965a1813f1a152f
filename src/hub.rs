// ============================================================================
// Hub Interface - outbound transport & lifecycle sink
// ============================================================================
//
// The hub is an external collaborator: it physically routes send/tell/ask
// traffic between actors and the environment, and it consumes lifecycle
// notifications. This module defines only the surface this runtime consumes
// and exposes; transport itself lives outside.
//
// Contract for outbound requests: the caller registers a wait handle BEFORE
// invoking the hub, then parks on it. The hub must eventually signal the
// handle (from any thread), and for Ask must populate the reply slot before
// signaling.
//
// ============================================================================

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use uuid::Uuid;

use crate::runtime::WaitHandle;

/// Single-value output slot an Ask reply is written into.
///
/// The hub writes exactly once, before signaling the wait handle; the
/// asking actor reads after waking.
#[derive(Clone, Default)]
pub struct ReplySlot {
    value: Arc<Mutex<Option<Value>>>,
}

impl ReplySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the reply. Called by the hub before it signals.
    pub fn set(&self, value: Value) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    /// Take the reply out, if the hub wrote one.
    pub fn take(&self) -> Option<Value> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl std::fmt::Debug for ReplySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplySlot").finish_non_exhaustive()
    }
}

/// One outbound operation handed to the hub.
#[derive(Debug)]
pub enum OutboundRequest {
    /// Broadcast a payload to every reachable actor.
    SendAll { payload: Value },
    /// Send a payload to specific actors.
    SendTo { payload: Value, targets: Vec<Uuid> },
    /// Publish a keyed value to the environment.
    Tell { key: String, value: Value },
    /// Request a keyed value from the environment.
    Ask { key: String, reply: ReplySlot },
}

impl OutboundRequest {
    /// Operation name, for logging.
    pub fn opcode(&self) -> &'static str {
        match self {
            OutboundRequest::SendAll { .. } => "send_all",
            OutboundRequest::SendTo { .. } => "send_to",
            OutboundRequest::Tell { .. } => "tell",
            OutboundRequest::Ask { .. } => "ask",
        }
    }
}

/// Request plus the completion handle the hub must signal.
pub struct HubEnvelope {
    /// Actor issuing the request.
    pub sender: Uuid,
    pub request: OutboundRequest,
    /// Signaled by the hub when the request is complete.
    pub wait: Arc<WaitHandle>,
}

/// External collaborator: transport for outbound requests plus the sink for
/// lifecycle notifications. Implementations may signal wait handles from
/// any thread.
pub trait Hub: Send + Sync {
    fn actor_started(&self, id: Uuid);
    fn actor_stopped(&self, id: Uuid);
    fn actor_failed(&self, id: Uuid, error: &anyhow::Error);
    fn dispatch(&self, envelope: HubEnvelope);
}

/// Hub that routes nothing: logs each request and completes it immediately.
/// Useful for embedders without a transport and for tests.
#[derive(Debug, Default)]
pub struct NullHub;

impl Hub for NullHub {
    fn actor_started(&self, id: Uuid) {
        tracing::debug!(actor = %id, "actor started");
    }

    fn actor_stopped(&self, id: Uuid) {
        tracing::debug!(actor = %id, "actor stopped");
    }

    fn actor_failed(&self, id: Uuid, error: &anyhow::Error) {
        tracing::error!(actor = %id, error = %error, "actor failed");
    }

    fn dispatch(&self, envelope: HubEnvelope) {
        tracing::debug!(
            actor = %envelope.sender,
            opcode = envelope.request.opcode(),
            "dropping outbound request (null hub)"
        );
        if let OutboundRequest::Ask { reply, .. } = &envelope.request {
            reply.set(Value::Null);
        }
        envelope.wait.signal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_slot_set_then_take() {
        let slot = ReplySlot::new();
        assert_eq!(slot.take(), None);
        slot.set(json!({"answer": 42}));
        assert_eq!(slot.take(), Some(json!({"answer": 42})));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn test_null_hub_completes_ask_with_null() {
        let hub = NullHub;
        let slot = ReplySlot::new();
        let wait = WaitHandle::new(false);
        hub.dispatch(HubEnvelope {
            sender: Uuid::new_v4(),
            request: OutboundRequest::Ask {
                key: "missing".into(),
                reply: slot.clone(),
            },
            wait: wait.clone(),
        });
        wait.wait();
        assert_eq!(slot.take(), Some(Value::Null));
    }
}
