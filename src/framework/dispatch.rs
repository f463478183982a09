//! # Handler Dispatch Table
//!
//! Maps a message's concrete type to the ordered list of handlers registered
//! for it. A table is assembled once with [`DispatchTableBuilder`], frozen into
//! an `Arc`, and shared by every entity of the same kind. Nothing registers
//! handlers after that, so lookups never race with registration.
//!
//! Registering several handlers for one message type is fan-out, not
//! replacement: all of them run, in registration order, one after the other.

use crate::framework::context::MessageContext;
use crate::framework::error::HandlerError;
use crate::framework::message::EntityMessage;
use async_trait::async_trait;
use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Handles one message type for entities whose state is `S`.
///
/// Returning an error is a fault: the entity stops and its resources are released.
#[async_trait]
pub trait Handler<M: EntityMessage, S: Send + 'static>: Send + Sync + 'static {
    async fn handle(
        &self,
        ctx: &mut MessageContext<'_, S>,
        message: &M,
    ) -> Result<(), HandlerError>;
}

#[async_trait]
impl<M, S, H> Handler<M, S> for Arc<H>
where
    M: EntityMessage,
    S: Send + 'static,
    H: Handler<M, S>,
{
    async fn handle(
        &self,
        ctx: &mut MessageContext<'_, S>,
        message: &M,
    ) -> Result<(), HandlerError> {
        (**self).handle(ctx, message).await
    }
}

/// Type-erased handler stored in the table.
#[async_trait]
trait ErasedHandler<S: Send + 'static>: Send + Sync {
    async fn handle_erased(
        &self,
        ctx: &mut MessageContext<'_, S>,
        message: &dyn EntityMessage,
    ) -> Result<(), HandlerError>;
}

struct TypedHandler<M, H> {
    handler: H,
    _message: PhantomData<fn(&M)>,
}

#[async_trait]
impl<M, S, H> ErasedHandler<S> for TypedHandler<M, H>
where
    M: EntityMessage,
    S: Send + 'static,
    H: Handler<M, S>,
{
    async fn handle_erased(
        &self,
        ctx: &mut MessageContext<'_, S>,
        message: &dyn EntityMessage,
    ) -> Result<(), HandlerError> {
        match message.downcast_ref::<M>() {
            Some(message) => self.handler.handle(ctx, message).await,
            // routes are keyed by TypeId, so this is never reached
            None => Ok(()),
        }
    }
}

struct Route<S: Send + 'static> {
    message_type: &'static str,
    handlers: Vec<Arc<dyn ErasedHandler<S>>>,
}

/// Read-only routing table from message type to handlers.
pub struct DispatchTable<S: Send + 'static> {
    routes: HashMap<TypeId, Route<S>>,
}

impl<S: Send + 'static> DispatchTable<S> {
    pub fn builder() -> DispatchTableBuilder<S> {
        DispatchTableBuilder::new()
    }

    /// Number of handlers registered for `M`.
    pub fn handler_count<M: EntityMessage>(&self) -> usize {
        self.routes
            .get(&TypeId::of::<M>())
            .map_or(0, |route| route.handlers.len())
    }

    /// Names of every routed message type, for startup logs.
    pub fn message_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.routes.values().map(|r| r.message_type).collect();
        names.sort_unstable();
        names
    }

    /// Runs every handler registered for the message's type, in registration order.
    ///
    /// Returns `Ok(false)` when nothing is registered for the type. The first
    /// handler error ends the fan-out and is returned as is.
    pub async fn dispatch(
        &self,
        ctx: &mut MessageContext<'_, S>,
        message: &dyn EntityMessage,
    ) -> Result<bool, HandlerError> {
        let Some(route) = self.routes.get(&message.message_type_id()) else {
            return Ok(false);
        };
        debug!(
            entity = %ctx.entity(),
            message_type = route.message_type,
            handlers = route.handlers.len(),
            "Dispatch"
        );
        for handler in &route.handlers {
            handler.handle_erased(ctx, message).await?;
        }
        Ok(true)
    }
}

/// Assembles a [`DispatchTable`].
///
/// This is the hand-off point for whatever decides which handlers an entity
/// kind has; the table itself never discovers handlers.
pub struct DispatchTableBuilder<S: Send + 'static> {
    routes: HashMap<TypeId, Route<S>>,
}

impl<S: Send + 'static> DispatchTableBuilder<S> {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Appends `handler` to the handlers of message type `M`.
    pub fn register<M, H>(mut self, handler: H) -> Self
    where
        M: EntityMessage,
        H: Handler<M, S>,
    {
        let erased: Arc<dyn ErasedHandler<S>> = Arc::new(TypedHandler {
            handler,
            _message: PhantomData::<fn(&M)>,
        });
        self.routes
            .entry(TypeId::of::<M>())
            .or_insert_with(|| Route {
                message_type: crate::framework::message::short_type_name(
                    std::any::type_name::<M>(),
                ),
                handlers: Vec::with_capacity(4),
            })
            .handlers
            .push(erased);
        self
    }

    pub fn build(self) -> Arc<DispatchTable<S>> {
        Arc::new(DispatchTable {
            routes: self.routes,
        })
    }
}

impl<S: Send + 'static> Default for DispatchTableBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::address::ActorRef;
    use crate::framework::disposal::DisposalChain;
    use crate::framework::state::EntityState;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Tick;
    impl EntityMessage for Tick {}

    #[derive(Debug)]
    struct Unknown;
    impl EntityMessage for Unknown {}

    struct Record {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Handler<Tick, ()> for Record {
        async fn handle(
            &self,
            _ctx: &mut MessageContext<'_, ()>,
            _message: &Tick,
        ) -> Result<(), HandlerError> {
            self.log.lock().unwrap().push(self.label);
            Ok(())
        }
    }

    struct Fail;

    #[async_trait]
    impl Handler<Tick, ()> for Fail {
        async fn handle(
            &self,
            _ctx: &mut MessageContext<'_, ()>,
            _message: &Tick,
        ) -> Result<(), HandlerError> {
            Err("tick rejected".into())
        }
    }

    async fn dispatch(table: &DispatchTable<()>, message: &dyn EntityMessage) -> Result<bool, HandlerError> {
        let (entity, _mailbox) = ActorRef::channel("/test/entity");
        let mut state = EntityState::new();
        let mut resources = DisposalChain::new();
        let mut ctx = MessageContext::new(&entity, None, &mut state, &mut resources);
        table.dispatch(&mut ctx, message).await
    }

    #[tokio::test]
    async fn fans_out_in_registration_order_with_duplicates() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let shared = Arc::new(Record {
            label: "shared",
            log: log.clone(),
        });
        let table = DispatchTable::<()>::builder()
            .register::<Tick, _>(Record {
                label: "first",
                log: log.clone(),
            })
            .register::<Tick, _>(shared.clone())
            .register::<Tick, _>(shared)
            .build();

        assert_eq!(table.handler_count::<Tick>(), 3);
        assert!(dispatch(&table, &Tick).await.unwrap());
        assert_eq!(*log.lock().unwrap(), vec!["first", "shared", "shared"]);
    }

    #[tokio::test]
    async fn unregistered_type_is_not_handled() {
        let table = DispatchTable::<()>::builder().build();
        assert_eq!(table.handler_count::<Unknown>(), 0);
        assert!(!dispatch(&table, &Unknown).await.unwrap());
    }

    #[tokio::test]
    async fn first_failure_stops_the_fan_out() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let table = DispatchTable::<()>::builder()
            .register::<Tick, _>(Fail)
            .register::<Tick, _>(Record {
                label: "after",
                log: log.clone(),
            })
            .build();

        let err = dispatch(&table, &Tick).await.unwrap_err();
        assert_eq!(err.to_string(), "tick rejected");
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(table.message_types(), vec!["Tick"]);
    }
}
