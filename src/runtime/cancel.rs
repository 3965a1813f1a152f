// ============================================================================
// Wait Handles & Cancel Registry
// ============================================================================
//
// A WaitHandle is a one-shot signal created per blocking capability call:
// registered, waited on, deregistered, never reused. The hub signals it on
// reply; a cancellation broadcast force-signals every handle still
// registered.
//
// The registry keeps the waiter set and the installed dispatch set behind
// one mutex. cancel() flips the interrupted flag, swaps the table, and
// snapshots the waiters inside a single critical section, so no call can
// start blocking "between" the flag and the broadcast: it either sees the
// cancelled table or gets a pre-signaled handle.
//
// ============================================================================

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::runtime::dispatch::DispatchOps;
use crate::runtime::handle::Flags;

/// One-shot signal a blocking capability call parks on.
///
/// Signaled either by the hub completing the request or by the actor's
/// cancellation broadcast. Signaling is sticky and idempotent.
pub struct WaitHandle {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl WaitHandle {
    pub(crate) fn new(signaled: bool) -> Arc<Self> {
        Arc::new(Self {
            signaled: Mutex::new(signaled),
            cond: Condvar::new(),
        })
    }

    /// Wake the parked caller. Callable from any thread, any number of
    /// times.
    pub fn signal(&self) {
        let mut signaled = self.signaled.lock().unwrap_or_else(PoisonError::into_inner);
        *signaled = true;
        self.cond.notify_all();
    }

    /// Block until signaled.
    pub(crate) fn wait(&self) {
        let mut signaled = self.signaled.lock().unwrap_or_else(PoisonError::into_inner);
        while !*signaled {
            signaled = self
                .cond
                .wait(signaled)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until signaled or `timeout` elapses. Returns whether the
    /// handle was signaled.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut signaled = self.signaled.lock().unwrap_or_else(PoisonError::into_inner);
        while !*signaled {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, result) = self
                .cond
                .wait_timeout(signaled, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            signaled = guard;
            if result.timed_out() && !*signaled {
                return false;
            }
        }
        true
    }
}

struct RegistryInner {
    waiters: Vec<Arc<WaitHandle>>,
    table: Arc<dyn DispatchOps>,
}

/// Waiter set plus the installed dispatch set, one mutex for both.
pub(crate) struct CancelRegistry {
    flags: Arc<Flags>,
    inner: Mutex<RegistryInner>,
}

impl CancelRegistry {
    pub fn new(flags: Arc<Flags>, initial_table: Arc<dyn DispatchOps>) -> Arc<Self> {
        Arc::new(Self {
            flags,
            inner: Mutex::new(RegistryInner {
                waiters: Vec::new(),
                table: initial_table,
            }),
        })
    }

    /// Current dispatch set. Callers clone the Arc and invoke outside the
    /// lock, so an in-flight call keeps the set it started with.
    pub fn table(&self) -> Arc<dyn DispatchOps> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .table
            .clone()
    }

    /// Install a fresh live set at the top of a run cycle.
    pub fn install(&self, table: Arc<dyn DispatchOps>) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .table = table;
    }

    /// Register a fresh wait handle, or hand back a pre-signaled one when
    /// interruption already happened, so a call racing the broadcast never
    /// parks forever.
    pub fn register(&self) -> Arc<WaitHandle> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if self.flags.is_interrupted() {
            return WaitHandle::new(true);
        }
        let handle = WaitHandle::new(false);
        inner.waiters.push(handle.clone());
        handle
    }

    /// Remove a handle. Each caller removes its own; handles are never
    /// reused.
    pub fn deregister(&self, handle: &Arc<WaitHandle>) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.waiters.retain(|h| !Arc::ptr_eq(h, handle));
    }

    /// Flip the interrupted flag, swap in the cancelled dispatch set, and
    /// signal every registered waiter. Idempotent.
    pub fn cancel(&self, cancelled_table: Arc<dyn DispatchOps>) {
        let waiters = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            self.flags.set_interrupted(true);
            inner.table = cancelled_table;
            inner.waiters.clone()
        };
        tracing::debug!(waiters = waiters.len(), "cancellation broadcast");
        for handle in waiters {
            handle.signal();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::dispatch::CancelledDispatch;
    use std::thread;

    fn registry() -> (Arc<CancelRegistry>, Arc<Flags>) {
        let flags = Arc::new(Flags::new());
        let table: Arc<dyn DispatchOps> = Arc::new(CancelledDispatch::new(flags.clone()));
        (CancelRegistry::new(flags.clone(), table), flags)
    }

    fn cancelled(flags: &Arc<Flags>) -> Arc<dyn DispatchOps> {
        Arc::new(CancelledDispatch::new(flags.clone()))
    }

    #[test]
    fn test_signal_wakes_waiter() {
        let handle = WaitHandle::new(false);
        let waiter = {
            let handle = handle.clone();
            thread::spawn(move || handle.wait())
        };
        thread::sleep(Duration::from_millis(20));
        handle.signal();
        waiter.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_expires_unsignaled() {
        let handle = WaitHandle::new(false);
        assert!(!handle.wait_timeout(Duration::from_millis(20)));
        handle.signal();
        assert!(handle.wait_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn test_register_after_cancel_is_pre_signaled() {
        let (registry, flags) = registry();
        registry.cancel(cancelled(&flags));
        let handle = registry.register();
        // Must not block at all.
        handle.wait();
    }

    #[test]
    fn test_broadcast_signals_every_registered_handle() {
        let (registry, flags) = registry();
        let first = registry.register();
        let second = registry.register();
        registry.cancel(cancelled(&flags));
        first.wait();
        second.wait();
        registry.deregister(&first);
        registry.deregister(&second);
    }

    #[test]
    fn test_deregister_removes_handle_from_broadcast() {
        let (registry, flags) = registry();
        let handle = registry.register();
        registry.deregister(&handle);
        registry.cancel(cancelled(&flags));
        // Deregistered before the broadcast, so it only wakes by timeout.
        assert!(!handle.wait_timeout(Duration::from_millis(20)));
    }
}
