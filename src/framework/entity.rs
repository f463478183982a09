//! # Entity Processing Loop
//!
//! An entity is one Tokio task draining one mailbox. [`EntityActor::run`]
//! processes messages strictly one at a time:
//!
//! 1. Until the entity is initialized, only [`InitializeState<S>`] is
//!    accepted. Everything else is dropped with a
//!    [`EntityError::UninitializedMessageDropped`] diagnostic.
//! 2. The first `InitializeState<S>` assigns the state and dispatches
//!    [`EntityInitialized`] through the handler table. The initialization
//!    message itself is never dispatched, and an `EntityInitialized` that
//!    arrives through the mailbox is just an unhandled message.
//! 3. After that, every message goes through the [`DispatchTable`]. Unhandled
//!    types and repeated initialization are diagnostics; the loop keeps going.
//! 4. A handler error is a fault: the mailbox closes, attached resources are
//!    released, and `run()` returns [`EntityError::HandlerFault`]. Nothing
//!    restarts the entity.
//!
//! ## Managing the entity from outside
//!
//! [`EntityHandle`] is the managing component's side: it can initialize the
//! entity, attach resources, read the state, and dispose the entity.
//! Initialization is queued like any other message and the handle waits for
//! its outcome. The rest take the same per-entity lock the loop holds while a
//! message is being handled, so they never interleave with a handler.

use crate::framework::address::{ActorAddress, ActorRef, Mailbox};
use crate::framework::context::{attach_to, release_undelivered, MessageContext};
use crate::framework::dispatch::DispatchTable;
use crate::framework::disposal::{DisposalChain, Resource};
use crate::framework::error::{EntityError, HandlerError};
use crate::framework::message::{AttachResource, EntityInitialized, Envelope, InitializeState};
use crate::framework::state::{ActorState, EntityState, MutableActorState};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Everything the lock protects.
struct EntityCore<S> {
    initialized: bool,
    state: EntityState<S>,
    resources: DisposalChain,
}

type SharedCore<S> = Arc<Mutex<EntityCore<S>>>;

struct Processor<S: Send + 'static> {
    entity: ActorRef,
    table: Arc<DispatchTable<S>>,
    core: SharedCore<S>,
    diagnostics: Option<mpsc::UnboundedSender<EntityError>>,
}

/// The server half of an entity: owns the mailbox and runs the loop.
pub struct EntityActor<S: Send + 'static> {
    processor: Processor<S>,
    mailbox: Mailbox,
    stop: CancellationToken,
}

impl<S: Send + 'static> EntityActor<S> {
    /// Creates an uninitialized entity at `address` using `table` for dispatch.
    pub fn new(
        address: impl Into<ActorAddress>,
        table: Arc<DispatchTable<S>>,
    ) -> (Self, EntityHandle<S>) {
        let (entity, mailbox) = ActorRef::channel(address);
        let core = Arc::new(Mutex::new(EntityCore {
            initialized: false,
            state: EntityState::new(),
            resources: DisposalChain::new(),
        }));
        let stop = CancellationToken::new();

        let handle = EntityHandle {
            entity: entity.clone(),
            core: core.clone(),
            stop: stop.clone(),
        };
        let actor = Self {
            processor: Processor {
                entity,
                table,
                core,
                diagnostics: None,
            },
            mailbox,
            stop,
        };
        (actor, handle)
    }

    /// Publishes every diagnostic on `sink` in addition to logging it.
    pub fn with_diagnostics(mut self, sink: mpsc::UnboundedSender<EntityError>) -> Self {
        self.processor.diagnostics = Some(sink);
        self
    }

    /// Runs the loop until the entity is disposed or a handler fails.
    ///
    /// Returns `Ok(())` after a clean stop, [`EntityError::HandlerFault`]
    /// after a fault, and [`EntityError::Disposal`] when a clean stop left
    /// resources that failed to release.
    pub async fn run(self) -> Result<(), EntityError> {
        let EntityActor {
            processor,
            mut mailbox,
            stop,
        } = self;
        info!(entity = %processor.entity, handlers = ?processor.table.message_types(), "Entity started");

        let outcome = loop {
            let envelope = tokio::select! {
                biased;
                _ = stop.cancelled() => break Ok(()),
                envelope = mailbox.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break Ok(()),
                },
            };
            if let ControlFlow::Break(outcome) = processor.process(envelope).await {
                break outcome;
            }
        };

        // no message after the one that stopped us is ever delivered
        mailbox.close();
        let disposal = processor.core.lock().await.resources.dispose_all();
        let mut released = 0usize;
        while let Some(envelope) = mailbox.try_recv() {
            if release_undelivered(processor.entity.address(), &*envelope.message).is_some() {
                released += 1;
            }
        }
        if released > 0 {
            info!(entity = %processor.entity, released, "Released resources still queued at stop");
        }

        match (outcome, disposal) {
            (Err(fault), _) => {
                warn!(entity = %processor.entity, "Entity stopped after fault");
                Err(fault)
            }
            (Ok(()), Err(disposal)) => {
                warn!(entity = %processor.entity, error = %disposal, "Entity stopped, disposal incomplete");
                Err(disposal.into())
            }
            (Ok(()), Ok(())) => {
                info!(entity = %processor.entity, "Entity stopped");
                Ok(())
            }
        }
    }
}

impl<S: Send + 'static> Processor<S> {
    async fn process(&self, envelope: Envelope) -> ControlFlow<Result<(), EntityError>> {
        let mut core = self.core.lock().await;
        let message_type = envelope.message_type();
        let message = &*envelope.message;

        // checked before disposal so a late attach is still released
        if let Some(attach) = message.downcast_ref::<AttachResource>() {
            if let Some(resource) = attach.take() {
                let name = resource.name();
                match attach_to(&self.entity, &mut core.resources, resource) {
                    Ok(()) => debug!(entity = %self.entity, resource = %name, "Resource attached"),
                    Err(e) => debug!(entity = %self.entity, error = %e, "Mailbox attach rejected"),
                }
            }
            return ControlFlow::Continue(());
        }

        if core.resources.is_disposed() {
            return ControlFlow::Break(Ok(()));
        }

        let EntityCore {
            initialized,
            state,
            resources,
        } = &mut *core;
        let mut ctx = MessageContext::new(&self.entity, envelope.sender.as_ref(), state, resources);

        if !*initialized {
            let Some(init) = message.downcast_ref::<InitializeState<S>>() else {
                self.diagnose(EntityError::UninitializedMessageDropped {
                    entity: self.entity.address().clone(),
                    message_type,
                });
                return ControlFlow::Continue(());
            };
            let Some(data) = init.take() else {
                warn!(entity = %self.entity, "Initialization message was already consumed");
                return ControlFlow::Continue(());
            };
            ctx.state_mut().set_data(data);
            *initialized = true;
            info!(entity = %self.entity, "Entity initialized");

            // the hook is optional, so an unhandled one is fine
            return match self.table.dispatch(&mut ctx, &EntityInitialized::new()).await {
                Ok(_) => {
                    init.complete(Ok(()));
                    ControlFlow::Continue(())
                }
                Err(source) => {
                    init.complete(Err(EntityError::ActorClosed));
                    ControlFlow::Break(Err(self.fault("EntityInitialized", source)))
                }
            };
        }

        if let Some(init) = message.downcast_ref::<InitializeState<S>>() {
            let entity = self.entity.address().clone();
            if !init.complete(Err(EntityError::AlreadyInitialized {
                entity: entity.clone(),
            })) {
                self.diagnose(EntityError::AlreadyInitialized { entity });
            }
            return ControlFlow::Continue(());
        }

        match self.table.dispatch(&mut ctx, message).await {
            Ok(true) => ControlFlow::Continue(()),
            Ok(false) => {
                self.diagnose(EntityError::UnhandledMessageType {
                    entity: self.entity.address().clone(),
                    message_type,
                });
                ControlFlow::Continue(())
            }
            Err(source) => ControlFlow::Break(Err(self.fault(message_type, source))),
        }
    }

    fn fault(&self, message_type: &'static str, source: HandlerError) -> EntityError {
        error!(entity = %self.entity, message_type, error = %source, "Handler failed, stopping entity");
        EntityError::HandlerFault {
            entity: self.entity.address().clone(),
            message_type,
            source,
        }
    }

    fn diagnose(&self, diagnostic: EntityError) {
        warn!(entity = %self.entity, "{}", diagnostic);
        if let Some(sink) = &self.diagnostics {
            let _ = sink.send(diagnostic);
        }
    }
}

/// The managing component's handle to an entity.
pub struct EntityHandle<S> {
    entity: ActorRef,
    core: SharedCore<S>,
    stop: CancellationToken,
}

impl<S> Clone for EntityHandle<S> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity.clone(),
            core: self.core.clone(),
            stop: self.stop.clone(),
        }
    }
}

impl<S: Send + 'static> EntityHandle<S> {
    /// The entity's address, for `tell` and `ask`.
    pub fn actor_ref(&self) -> &ActorRef {
        &self.entity
    }

    pub fn address(&self) -> &ActorAddress {
        self.entity.address()
    }

    /// Initializes the entity and waits until its loop has taken the state.
    ///
    /// The state travels through the mailbox, so anything told before this
    /// call is still dropped as uninitialized. Exactly one initialization
    /// succeeds per entity, whichever path it takes; every later attempt fails
    /// with [`EntityError::AlreadyInitialized`]. Returns once the
    /// [`EntityInitialized`] hook has run, so the loop must be running.
    pub async fn initialize(&self, state: S) -> Result<(), EntityError> {
        if self.is_disposed().await {
            return Err(EntityError::ActorClosed);
        }
        let (message, outcome) = InitializeState::with_completion(state);
        self.entity.tell(message)?;
        outcome.await.unwrap_or(Err(EntityError::ActorClosed))
    }

    pub async fn is_initialized(&self) -> bool {
        self.core.lock().await.initialized
    }

    /// Attaches a resource to be released when the entity terminates.
    ///
    /// After disposal the resource is released right away and
    /// [`EntityError::AlreadyDisposed`] is returned.
    pub async fn attach(&self, resource: impl Resource) -> Result<(), EntityError> {
        let mut core = self.core.lock().await;
        attach_to(&self.entity, &mut core.resources, Box::new(resource))
    }

    /// Releases every attached resource and stops the loop.
    ///
    /// Waits for an in-flight message to finish first. Calling it again is a no-op.
    pub async fn dispose(&self) -> Result<(), EntityError> {
        let mut core = self.core.lock().await;
        let result = core.resources.dispose_all();
        self.stop.cancel();
        info!(entity = %self.entity, "Entity disposed");
        result.map_err(EntityError::from)
    }

    pub async fn is_disposed(&self) -> bool {
        self.core.lock().await.resources.is_disposed()
    }

    /// Runs `read` against the current state under the entity lock.
    pub async fn read_state<R>(&self, read: impl FnOnce(&dyn ActorState<S>) -> R) -> R {
        let core = self.core.lock().await;
        read(core.state.view())
    }

    /// Completes once the entity's loop has stopped.
    pub async fn terminated(&self) {
        self.entity.terminated().await
    }
}
