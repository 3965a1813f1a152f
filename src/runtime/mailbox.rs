// ============================================================================
// Mailbox - FIFO inbound message queue
// ============================================================================
//
// One mailbox per actor. Unbounded, insertion order preserved regardless of
// sender. push() never blocks and is legal in any lifecycle state: an idle
// or exited actor still queues deliveries, like a real inbox receiving mail
// while the owner is away.
//
// pop() blocks on a condition variable and rechecks interruption before
// emptiness on every wake, so a cancellation broadcast lands ahead of any
// queued message and spurious wakeups are harmless.
//
// ============================================================================

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use serde_json::Value;

use crate::error::Cancelled;
use crate::runtime::handle::Flags;

/// One queued inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Identity the sender presented; not necessarily an actor hosted here.
    pub sender: String,
    pub payload: Value,
}

pub(crate) struct Mailbox {
    queue: Mutex<VecDeque<Envelope>>,
    available: Condvar,
    flags: Arc<Flags>,
}

impl Mailbox {
    pub fn new(flags: Arc<Flags>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            flags,
        }
    }

    /// Append a message and wake one waiter. Never blocks.
    pub fn push(&self, sender: impl Into<String>, payload: Value) {
        let envelope = Envelope {
            sender: sender.into(),
            payload,
        };
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.push_back(envelope);
        tracing::trace!(depth = queue.len(), "mailbox push");
        drop(queue);
        self.available.notify_one();
    }

    /// Pop the oldest message, blocking until one arrives or the actor is
    /// interrupted.
    ///
    /// Safe to call from several helper threads at once; which waiter wins
    /// a wakeup follows the platform condvar and is not FIFO.
    pub fn pop(&self) -> Result<Envelope, Cancelled> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if self.flags.is_interrupted() {
                return Err(Cancelled);
            }
            if let Some(envelope) = queue.pop_front() {
                return Ok(envelope);
            }
            queue = self
                .available
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Non-blocking emptiness check.
    pub fn has_pending(&self) -> bool {
        !self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Wake every parked pop() so it rechecks the interrupted flag.
    ///
    /// Takes the queue lock first: a waiter between its flag check and the
    /// condvar wait still holds the lock, so the notification cannot be
    /// lost.
    pub fn wake_all(&self) {
        let _queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        self.available.notify_all();
    }
}
