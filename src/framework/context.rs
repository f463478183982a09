//! # Message Context
//!
//! What a handler gets besides the message: the entity's own address, the
//! sender's address (if any), the entity's state, and its disposal chain.
//! Everything is lent for the duration of one handler call.

use crate::framework::address::{ActorAddress, ActorRef};
use crate::framework::disposal::{DisposalChain, Rejected, Resource};
use crate::framework::error::EntityError;
use crate::framework::message::{AttachResource, EntityMessage};
use crate::framework::state::{ActorState, EntityState, MutableActorState};
use tracing::warn;

/// Per-message context handed to every handler.
pub struct MessageContext<'a, S> {
    entity: &'a ActorRef,
    sender: Option<&'a ActorRef>,
    state: &'a mut EntityState<S>,
    resources: &'a mut DisposalChain,
}

impl<'a, S> MessageContext<'a, S> {
    pub(crate) fn new(
        entity: &'a ActorRef,
        sender: Option<&'a ActorRef>,
        state: &'a mut EntityState<S>,
        resources: &'a mut DisposalChain,
    ) -> Self {
        Self {
            entity,
            sender,
            state,
            resources,
        }
    }

    /// The entity processing this message.
    pub fn entity(&self) -> &ActorRef {
        self.entity
    }

    /// Where replies should go, if the sender gave an address.
    pub fn sender(&self) -> Option<&ActorRef> {
        self.sender
    }

    pub fn state(&self) -> &dyn ActorState<S> {
        &*self.state
    }

    pub fn state_mut(&mut self) -> &mut dyn MutableActorState<S> {
        &mut *self.state
    }

    /// Sends `message` back to the sender, with this entity as reply address.
    ///
    /// Messages without a sender are answered by nobody; that is not an error.
    pub fn reply<M: EntityMessage>(&self, message: M) -> Result<(), EntityError> {
        match self.sender {
            Some(sender) => sender.tell_from(message, self.entity),
            None => Ok(()),
        }
    }

    /// Attaches a resource that will be released when this entity terminates.
    pub fn attach(&mut self, resource: impl Resource) -> Result<(), EntityError> {
        attach_to(self.entity, self.resources, Box::new(resource))
    }
}

/// Attaches to `chain`, releasing the resource right away if the chain is already disposed.
pub(crate) fn attach_to(
    entity: &ActorRef,
    chain: &mut DisposalChain,
    resource: Box<dyn Resource>,
) -> Result<(), EntityError> {
    chain
        .attach(resource)
        .map_err(|Rejected(resource)| reject(entity.address(), resource))
}

/// Releases the resource carried by an [`AttachResource`] that will never be processed.
///
/// Returns `None` for any other message, or when the payload was already taken.
pub(crate) fn release_undelivered(
    entity: &ActorAddress,
    message: &dyn EntityMessage,
) -> Option<EntityError> {
    let resource = message.downcast_ref::<AttachResource>()?.take()?;
    Some(reject(entity, resource))
}

fn reject(entity: &ActorAddress, mut resource: Box<dyn Resource>) -> EntityError {
    let name = resource.name();
    warn!(entity = %entity, resource = %name, "Attach after disposal, releasing immediately");
    if let Err(e) = resource.release() {
        warn!(entity = %entity, resource = %name, error = %e, "Rejected resource failed to release");
    }
    EntityError::AlreadyDisposed {
        entity: entity.clone(),
        resource: name,
    }
}
