// ============================================================================
// Factory Registry & Actor System
// ============================================================================
//
// FactoryRegistry is the explicit plugin registry: actor-type name mapped
// to a factory closure, populated at process startup. No reflection, no
// dynamic loading; an unknown name is a LoadError.
//
// ActorSystem is the in-process handle index. It spawns handles from
// configs, routes inbound deliveries from the hub into the right mailbox,
// and fans out shutdown.
//
// ============================================================================

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use uuid::Uuid;

use crate::config::{ActorConfig, SystemConfig};
use crate::contract::Service;
use crate::error::{ControlError, DeliverError, LoadError};
use crate::hub::Hub;
use crate::runtime::{ActorHandle, ActorStatus};

type Factory = Box<dyn Fn(&Value) -> Result<Box<dyn Service>, LoadError> + Send + Sync>;

/// Actor-type name → factory function.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, Factory>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a type name. Last registration wins.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> Result<Box<dyn Service>, LoadError> + Send + Sync + 'static,
    {
        let kind = kind.into();
        tracing::debug!(kind = %kind, "actor factory registered");
        self.factories.insert(kind, Box::new(factory));
    }

    /// Construct a service instance for `kind`.
    pub fn build(&self, kind: &str, params: &Value) -> Result<Box<dyn Service>, LoadError> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| LoadError::UnknownType(kind.to_owned()))?;
        factory(params)
    }
}

/// Index of hosted actors: spawning, inbound delivery, shutdown.
pub struct ActorSystem {
    factories: FactoryRegistry,
    hub: Arc<dyn Hub>,
    handles: RwLock<HashMap<Uuid, Arc<ActorHandle>>>,
}

impl ActorSystem {
    pub fn new(factories: FactoryRegistry, hub: Arc<dyn Hub>) -> Self {
        Self {
            factories,
            hub,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Construct the service from its config and spawn its handle, parked
    /// Idle. A LoadError leaves the system unchanged; that actor slot is
    /// simply never created.
    pub fn spawn(&self, config: &ActorConfig) -> Result<Arc<ActorHandle>, LoadError> {
        let service = self.factories.build(&config.kind, &config.params)?;
        let handle = ActorHandle::spawn(config.name.clone(), service, self.hub.clone())?;
        self.handles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle.id(), handle.clone());
        Ok(handle)
    }

    /// Spawn every actor in the config. Fails on the first LoadError;
    /// earlier actors stay registered.
    pub fn spawn_all(&self, config: &SystemConfig) -> Result<Vec<Arc<ActorHandle>>, LoadError> {
        config.actors.iter().map(|actor| self.spawn(actor)).collect()
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<ActorHandle>> {
        self.handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Inbound entrypoint for the hub: route a payload into the target
    /// actor's mailbox. Callable from any thread, in any actor state.
    pub fn deliver(
        &self,
        actor_id: Uuid,
        sender: impl Into<String>,
        payload: Value,
    ) -> Result<(), DeliverError> {
        let handle = self.get(actor_id).ok_or(DeliverError(actor_id))?;
        handle.deliver(sender, payload);
        Ok(())
    }

    /// Status snapshot of every hosted actor.
    pub fn statuses(&self) -> Vec<ActorStatus> {
        self.handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|handle| handle.status())
            .collect()
    }

    /// Exit every actor and join its worker thread. Handles already
    /// exiting are skipped; the join still runs.
    pub fn shutdown(&self) {
        let handles: Vec<_> = self
            .handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        tracing::info!(actors = handles.len(), "system shutdown");
        for handle in &handles {
            match handle.exit() {
                Ok(()) | Err(ControlError::Exiting) | Err(ControlError::NotActive) => {}
                Err(error) => {
                    tracing::warn!(actor = %handle.name(), error = %error, "exit refused");
                }
            }
        }
        for handle in &handles {
            handle.join();
        }
    }
}
