// ============================================================================
// Runtime Module
// ============================================================================
//
// The concurrency core: one dedicated worker thread per actor, a FIFO
// mailbox, one-shot wait handles with broadcast cancellation, and the
// swappable dispatch set that routes every capability call.
//
// Structure:
// - handle.rs   - ActorHandle lifecycle state machine and the worker loop
// - mailbox.rs  - FIFO inbound queue
// - cancel.rs   - wait handles and the cancel registry
// - dispatch.rs - live and cancelled capability handler sets
//
// ============================================================================

// Private module declarations
pub(crate) mod cancel;
pub(crate) mod dispatch;
pub(crate) mod handle;
pub(crate) mod mailbox;

// Re-export only what's needed in the public API
pub use cancel::WaitHandle;
pub use handle::{ActorHandle, ActorState, ActorStatus};
pub use mailbox::Envelope;
