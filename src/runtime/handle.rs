// ============================================================================
// Actor Handle - lifecycle state machine & worker loop
// ============================================================================
//
// One handle per hosted service. The handle owns:
// - one dedicated worker thread for its entire life,
// - the mailbox, the cancel registry, and the installed dispatch set,
// - the lifecycle flags (state, do_exit, interrupted) and the start gate.
//
// Transitions:
//   Idle -(start)-> Running -(run returns | cancellation observed)-> Idle
//   Idle|Running -(exit)-> Exited (terminal)
//
// A crashing service never restarts: any non-cancellation error escaping
// run() terminates the worker permanently and is reported to the hub.
// Restart policy belongs to an external supervisor, not here.
//
// ============================================================================

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::contract::{Service, ServiceContext};
use crate::error::{ControlError, LoadError, RunError};
use crate::hub::Hub;
use crate::runtime::cancel::CancelRegistry;
use crate::runtime::dispatch::{CancelledDispatch, LiveDispatch};
use crate::runtime::mailbox::Mailbox;

/// Externally observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorState {
    Idle,
    Running,
    Interrupted,
    Exited,
}

const STATE_IDLE: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_EXITED: u8 = 2;

/// Lifecycle flags shared by the handle, the worker, the mailbox and the
/// dispatch sets. All reads are lock-free; writes follow the ordering the
/// worker loop and stop()/exit() require (state commits before the gate
/// clears, interrupted clears only after state is back to Idle).
pub(crate) struct Flags {
    state: AtomicU8,
    interrupted: AtomicBool,
    do_exit: AtomicBool,
}

impl Flags {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_IDLE),
            interrupted: AtomicBool::new(false),
            do_exit: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STATE_RUNNING
    }

    pub fn is_exited(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STATE_EXITED
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    pub fn do_exit(&self) -> bool {
        self.do_exit.load(Ordering::SeqCst)
    }

    pub fn set_interrupted(&self, value: bool) {
        self.interrupted.store(value, Ordering::SeqCst);
    }

    fn set_do_exit(&self) {
        self.do_exit.store(true, Ordering::SeqCst);
    }

    fn set_state(&self, state: u8) {
        self.state.store(state, Ordering::SeqCst);
    }

    fn view(&self) -> ActorState {
        match self.state.load(Ordering::SeqCst) {
            STATE_EXITED => ActorState::Exited,
            STATE_RUNNING if self.is_interrupted() => ActorState::Interrupted,
            STATE_RUNNING => ActorState::Running,
            _ => ActorState::Idle,
        }
    }
}

/// Single-shot-per-cycle gate the worker parks on while Idle.
struct StartGate {
    pending: Mutex<bool>,
    cond: Condvar,
}

impl StartGate {
    fn new() -> Self {
        Self {
            pending: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Signal a start. Fails if a previous start has not been consumed yet.
    fn arm(&self) -> Result<(), ControlError> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if *pending {
            return Err(ControlError::StartPending);
        }
        *pending = true;
        drop(pending);
        self.cond.notify_all();
        Ok(())
    }

    fn is_armed(&self) -> bool {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wake the worker without arming, so it can observe do_exit.
    fn notify(&self) {
        let _pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        self.cond.notify_all();
    }

    /// Park until a start is signaled or do_exit is set.
    fn wait(&self, flags: &Flags) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        while !*pending && !flags.do_exit() {
            pending = self
                .cond
                .wait(pending)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Consume the pending start for this cycle.
    fn clear(&self) {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }
}

/// Point-in-time snapshot of one actor, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ActorStatus {
    pub id: Uuid,
    pub name: String,
    pub state: ActorState,
    /// Wall-clock start of the current run cycle; None unless Running.
    pub started_at: Option<DateTime<Utc>>,
    /// Undelivered mailbox depth.
    pub pending_messages: usize,
}

/// One hosted service: identity, lifecycle control, and the resources its
/// worker thread runs against.
pub struct ActorHandle {
    id: Uuid,
    name: String,
    flags: Arc<Flags>,
    gate: Arc<StartGate>,
    mailbox: Arc<Mailbox>,
    registry: Arc<CancelRegistry>,
    hub: Arc<dyn Hub>,
    started_at: Arc<Mutex<Option<DateTime<Utc>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ActorHandle {
    /// Construct the handle and spawn its worker thread, parked Idle.
    pub fn spawn(
        name: impl Into<String>,
        service: Box<dyn Service>,
        hub: Arc<dyn Hub>,
    ) -> Result<Arc<Self>, LoadError> {
        let id = Uuid::new_v4();
        let name = name.into();
        let flags = Arc::new(Flags::new());
        let gate = Arc::new(StartGate::new());
        let mailbox = Arc::new(Mailbox::new(flags.clone()));
        let registry =
            CancelRegistry::new(flags.clone(), Arc::new(CancelledDispatch::new(flags.clone())));
        let started_at = Arc::new(Mutex::new(None));

        let worker = {
            let worker_name = name.clone();
            let flags = flags.clone();
            let gate = gate.clone();
            let mailbox = mailbox.clone();
            let registry = registry.clone();
            let hub = hub.clone();
            let started_at = started_at.clone();
            thread::Builder::new()
                .name(format!("actor-{name}"))
                .spawn(move || {
                    worker_loop(
                        id,
                        &worker_name,
                        service,
                        &flags,
                        &gate,
                        &mailbox,
                        &registry,
                        &hub,
                        &started_at,
                    )
                })
                .map_err(|source| LoadError::Worker {
                    name: name.clone(),
                    source,
                })?
        };

        tracing::info!(actor = %name, id = %id, "actor registered");
        Ok(Arc::new(Self {
            id,
            name,
            flags,
            gate,
            mailbox,
            registry,
            hub,
            started_at,
            worker: Mutex::new(Some(worker)),
        }))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Release the worker to invoke the service's run(). The only side
    /// effect is arming the start gate.
    pub fn start(&self) -> Result<(), ControlError> {
        if !self.is_active() {
            return Err(ControlError::NotActive);
        }
        if self.flags.do_exit() {
            return Err(ControlError::Exiting);
        }
        if self.gate.is_armed() {
            return Err(ControlError::StartPending);
        }
        if self.flags.is_running() {
            return Err(ControlError::AlreadyRunning);
        }
        self.gate.arm()?;
        tracing::debug!(actor = %self.name, "start signaled");
        Ok(())
    }

    /// Interrupt the current run cycle: swap in the cancelled dispatch set
    /// and broadcast-wake every parked capability call.
    pub fn stop(&self) -> Result<(), ControlError> {
        if !self.is_active() {
            return Err(ControlError::NotActive);
        }
        if self.flags.do_exit() {
            return Err(ControlError::Exiting);
        }
        if self.flags.is_interrupted() {
            return Err(ControlError::AlreadyInterrupted);
        }
        if !self.flags.is_running() {
            return Err(ControlError::NotRunning);
        }
        tracing::info!(actor = %self.name, "stop requested");
        self.registry
            .cancel(Arc::new(CancelledDispatch::new(self.flags.clone())));
        self.mailbox.wake_all();
        Ok(())
    }

    /// Terminate the worker permanently. Interrupts a running cycle first;
    /// a worker parked Idle wakes, observes do_exit and exits.
    pub fn exit(&self) -> Result<(), ControlError> {
        if self.flags.do_exit() {
            return Err(ControlError::Exiting);
        }
        if !self.is_active() {
            return Err(ControlError::NotActive);
        }
        tracing::info!(actor = %self.name, "exit requested");
        self.flags.set_do_exit();
        // Same broadcast as stop(); idempotent if already interrupted.
        self.registry
            .cancel(Arc::new(CancelledDispatch::new(self.flags.clone())));
        self.mailbox.wake_all();
        self.gate.notify();
        Ok(())
    }

    /// Whether the worker thread is still alive.
    pub fn is_active(&self) -> bool {
        !self.flags.is_exited()
    }

    /// True strictly between a successful start() and run() returning.
    pub fn is_running(&self) -> bool {
        self.flags.is_running()
    }

    /// Whether a cancellation has been issued for the current cycle.
    pub fn is_interrupted(&self) -> bool {
        self.flags.is_interrupted()
    }

    /// Queue an inbound message. Never blocks, legal in every state.
    pub fn deliver(&self, sender: impl Into<String>, payload: Value) {
        self.mailbox.push(sender, payload);
    }

    pub fn status(&self) -> ActorStatus {
        ActorStatus {
            id: self.id,
            name: self.name.clone(),
            state: self.flags.view(),
            started_at: *self
                .started_at
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            pending_messages: self.mailbox.len(),
        }
    }

    /// Wait for the worker thread to terminate. No-op if already joined.
    pub fn join(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                tracing::warn!(actor = %self.name, "worker thread panicked");
            }
        }
    }
}

// Not derivable: the hub trait object and the worker join handle carry no
// Debug of their own.
impl std::fmt::Debug for ActorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.flags.view())
            .finish_non_exhaustive()
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    id: Uuid,
    name: &str,
    mut service: Box<dyn Service>,
    flags: &Arc<Flags>,
    gate: &StartGate,
    mailbox: &Arc<Mailbox>,
    registry: &Arc<CancelRegistry>,
    hub: &Arc<dyn Hub>,
    started_at: &Mutex<Option<DateTime<Utc>>>,
) {
    let ctx = ServiceContext::new(id, registry.clone());
    loop {
        gate.wait(flags);

        if flags.do_exit() {
            tracing::debug!(actor = %name, "exit observed while idle");
            best_effort_cleanup(name, &mut service);
            break;
        }

        // Fresh live set for this cycle; carries the cycle's start instant.
        registry.install(Arc::new(LiveDispatch::new(
            id,
            flags.clone(),
            mailbox.clone(),
            registry.clone(),
            hub.clone(),
        )));
        hub.actor_started(id);
        *started_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        flags.set_state(STATE_RUNNING);
        // Gate clears only after state=Running is committed.
        gate.clear();
        tracing::info!(actor = %name, "run cycle started");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| service.run(&ctx)))
            .unwrap_or_else(|payload| {
                Err(RunError::Failed(anyhow!(
                    "service panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });

        match outcome {
            Ok(()) => {
                tracing::info!(actor = %name, "run cycle finished");
                hub.actor_stopped(id);
            }
            Err(RunError::Cancelled(_)) => {
                tracing::info!(actor = %name, "run cycle cancelled");
                best_effort_cleanup(name, &mut service);
                hub.actor_stopped(id);
            }
            Err(RunError::Failed(error)) => {
                tracing::error!(actor = %name, error = %error, "service failed, worker terminating");
                flags.set_do_exit();
                hub.actor_failed(id, &error);
                // No run cycle any more; the snapshot must not keep its
                // start time.
                *started_at.lock().unwrap_or_else(PoisonError::into_inner) = None;
                break;
            }
        }

        *started_at.lock().unwrap_or_else(PoisonError::into_inner) = None;
        flags.set_state(STATE_IDLE);
        // Interrupted clears only after state returned to Idle.
        flags.set_interrupted(false);
    }

    flags.set_state(STATE_EXITED);
    tracing::info!(actor = %name, "worker terminated");
}

fn best_effort_cleanup(name: &str, service: &mut Box<dyn Service>) {
    if panic::catch_unwind(AssertUnwindSafe(|| service.on_cancel())).is_err() {
        tracing::warn!(actor = %name, "on_cancel panicked");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}
