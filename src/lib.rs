// ============================================================================
// servitor - thread-per-service actor runtime
// ============================================================================
//
// Hosts independent "service" units, each bound to its own worker thread,
// with a controlled start/stop/exit lifecycle, cooperative cancellation and
// a FIFO inbox for inter-actor messages.
//
// What lives here:
// - runtime/   - ActorHandle, mailbox, wait handles, dispatch sets
// - contract   - the Service trait user logic implements, plus its
//                capability surface (ServiceContext)
// - hub        - the interface to the external transport collaborator
// - registry   - factory registry and the in-process ActorSystem
// - config     - declarative actor/system configuration
//
// What deliberately does not: network transport, message persistence, and
// supervision/restart policy. A crashed actor terminates permanently;
// whether to rebuild it is the embedder's decision.
//
// ============================================================================

mod config;
mod contract;
mod error;
mod hub;
mod registry;
mod runtime;

#[cfg(test)]
mod test_support;

pub use config::{ActorConfig, SystemConfig};
pub use contract::{Service, ServiceContext};
pub use error::{Cancelled, ControlError, DeliverError, LoadError, RunError};
pub use hub::{Hub, HubEnvelope, NullHub, OutboundRequest, ReplySlot};
pub use registry::{ActorSystem, FactoryRegistry};
pub use runtime::{ActorHandle, ActorState, ActorStatus, Envelope, WaitHandle};
