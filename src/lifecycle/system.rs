use crate::config::RuntimeConfig;
use crate::framework::{
    ActorAddress, ActorRef, AskError, DispatchTable, EntityActor, EntityError, EntityHandle,
    EntityMessage,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

/// Errors reported by [`EntitySystem::shutdown`].
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error(transparent)]
    Entity(#[from] EntityError),
    #[error("entity task {entity} failed: {source}")]
    TaskFailed {
        entity: ActorAddress,
        #[source]
        source: JoinError,
    },
}

/// Type-erased view of an [`EntityHandle`], so entities of different state
/// types can be managed together.
#[async_trait]
trait ManagedEntity: Send + Sync {
    fn address(&self) -> &ActorAddress;
    async fn dispose(&self) -> Result<(), EntityError>;
}

#[async_trait]
impl<S: Send + 'static> ManagedEntity for EntityHandle<S> {
    fn address(&self) -> &ActorAddress {
        EntityHandle::address(self)
    }

    async fn dispose(&self) -> Result<(), EntityError> {
        EntityHandle::dispose(self).await
    }
}

struct Managed {
    handle: Box<dyn ManagedEntity>,
    task: JoinHandle<Result<(), EntityError>>,
}

/// Runtime orchestrator that owns every entity task it spawned.
///
/// `EntitySystem` is responsible for:
/// - **Spawning**: one Tokio task per entity, sharing a dispatch table per entity kind
/// - **Diagnostics**: forwarding every entity's diagnostics to one optional sink
/// - **Shutdown**: disposing every entity and waiting for its task
///
/// # Example
///
/// ```ignore
/// let mut system = EntitySystem::new(RuntimeConfig::from_env());
/// let alice = system.spawn("/zone/lobby/alice", session_actor::dispatch_table(zones.clone()));
/// alice.initialize(PlayerState::new("alice", Zone::Lobby)).await?;
///
/// let position: Position = system.ask(alice.actor_ref(), GetPosition).await?;
///
/// system.shutdown().await?;
/// ```
pub struct EntitySystem {
    config: RuntimeConfig,
    diagnostics: Option<mpsc::UnboundedSender<EntityError>>,
    entities: Vec<Managed>,
}

impl EntitySystem {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            diagnostics: None,
            entities: Vec::new(),
        }
    }

    /// Sends the diagnostics of every entity spawned from now on to `sink`.
    pub fn with_diagnostics(mut self, sink: mpsc::UnboundedSender<EntityError>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Number of entities spawned, including stopped ones.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Spawns an uninitialized entity at `address`.
    pub fn spawn<S: Send + 'static>(
        &mut self,
        address: impl Into<ActorAddress>,
        table: Arc<DispatchTable<S>>,
    ) -> EntityHandle<S> {
        let (mut actor, handle) = EntityActor::new(address, table);
        if let Some(sink) = &self.diagnostics {
            actor = actor.with_diagnostics(sink.clone());
        }
        let task = tokio::spawn(actor.run());
        info!(entity = %handle.address(), entities = self.entities.len() + 1, "Entity spawned");
        self.entities.push(Managed {
            handle: Box::new(handle.clone()),
            task,
        });
        handle
    }

    /// [`ActorRef::ask`] bounded by the configured timeout.
    pub async fn ask<Resp, M>(&self, target: &ActorRef, request: M) -> Result<Resp, AskError>
    where
        Resp: EntityMessage + Clone,
        M: EntityMessage,
    {
        target.ask_timeout(request, self.config.ask_timeout()).await
    }

    /// Disposes every entity, then waits for all of their tasks.
    ///
    /// Every entity is shut down even if some fail; the first failure is
    /// returned. An entity that already stopped on a fault reports that fault.
    pub async fn shutdown(self) -> Result<(), ShutdownError> {
        info!(entities = self.entities.len(), "Shutting down entity system");
        let mut first_failure: Option<ShutdownError> = None;

        for managed in &self.entities {
            if let Err(e) = managed.handle.dispose().await {
                error!(entity = %managed.handle.address(), error = %e, "Dispose failed");
                first_failure.get_or_insert(e.into());
            }
        }

        for Managed { handle, task } in self.entities {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(entity = %handle.address(), error = %e, "Entity ended with error");
                    first_failure.get_or_insert(e.into());
                }
                Err(source) => {
                    error!(entity = %handle.address(), error = %source, "Entity task failed");
                    first_failure.get_or_insert(ShutdownError::TaskFailed {
                        entity: handle.address().clone(),
                        source,
                    });
                }
            }
        }

        match first_failure {
            Some(failure) => Err(failure),
            None => {
                info!("Entity system shutdown complete");
                Ok(())
            }
        }
    }
}

impl Default for EntitySystem {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}
