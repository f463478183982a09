//! # Entity Messages
//!
//! This module defines the message contract shared by every entity, the
//! [`Envelope`] that carries a message through a mailbox, and the messages the
//! framework itself understands ([`InitializeState`], [`EntityInitialized`],
//! [`AttachResource`]).
//!
//! A message's concrete Rust type is its dispatch key. There is no payload
//! schema: anything `Debug + Send + Sync + 'static` can be a message once it
//! opts in with `impl EntityMessage for MyMessage {}`.

use crate::framework::address::ActorRef;
use crate::framework::disposal::Resource;
use crate::framework::error::EntityError;
use std::any::{Any, TypeId};
use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Object-safe access to the concrete type behind a `dyn EntityMessage`.
///
/// Implemented for every sized `Any + Send + Sync` type; you never implement it by hand.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
    /// Short type name used in logs (e.g. `Move` instead of `my_game::session::Move`).
    fn message_type(&self) -> &'static str;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn message_type(&self) -> &'static str {
        short_type_name(std::any::type_name::<T>())
    }
}

/// Marker trait for values that can be sent to an entity.
///
/// ```rust
/// use entity_actor::framework::EntityMessage;
///
/// #[derive(Debug)]
/// struct Move { x: i32, y: i32 }
///
/// impl EntityMessage for Move {}
/// ```
pub trait EntityMessage: AsAny + Debug {}

impl dyn EntityMessage {
    /// The dispatch key of this message.
    pub fn message_type_id(&self) -> TypeId {
        Any::type_id(self.as_any())
    }

    pub fn is<M: EntityMessage>(&self) -> bool {
        self.as_any().is::<M>()
    }

    pub fn downcast_ref<M: EntityMessage>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }
}

/// Converts a shared message back into its concrete type.
///
/// Returns the original `Arc` untouched when the type does not match.
pub fn downcast_arc<M: EntityMessage>(
    message: Arc<dyn EntityMessage>,
) -> Result<Arc<M>, Arc<dyn EntityMessage>> {
    if !message.is::<M>() {
        return Err(message);
    }
    match message.into_any_arc().downcast::<M>() {
        Ok(typed) => Ok(typed),
        // type was checked above
        Err(_) => unreachable!("message type changed during downcast"),
    }
}

pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = match full.find('<') {
        Some(generic_start) => &full[..generic_start],
        None => full,
    };
    base.rsplit("::").next().unwrap_or(base)
}

/// A message in flight: the payload plus the address replies should go to.
///
/// Messages are shared (`Arc`) so a group broadcast hands the same value to
/// every member without copying it.
#[derive(Clone)]
pub struct Envelope {
    pub message: Arc<dyn EntityMessage>,
    pub sender: Option<ActorRef>,
}

impl Envelope {
    pub fn new<M: EntityMessage>(message: M, sender: Option<ActorRef>) -> Self {
        Self {
            message: Arc::new(message),
            sender,
        }
    }

    pub fn message_type(&self) -> &'static str {
        (*self.message).message_type()
    }
}

impl Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("message", &self.message)
            .field("sender", &self.sender.as_ref().map(|s| s.address()))
            .finish()
    }
}

/// The distinguished message that moves an entity from uninitialized to initialized.
///
/// Exactly one is accepted per entity lifetime. The payload is taken out by
/// the entity that consumes it, so the message itself stays immutable from the
/// sender's point of view.
pub struct InitializeState<T> {
    state: Mutex<Option<T>>,
    done: Mutex<Option<oneshot::Sender<Result<(), EntityError>>>>,
}

impl<T: Send + 'static> InitializeState<T> {
    pub fn new(state: T) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            done: Mutex::new(None),
        }
    }

    /// Same as [`InitializeState::new`], but reports the outcome once the entity processed it.
    pub(crate) fn with_completion(
        state: T,
    ) -> (Self, oneshot::Receiver<Result<(), EntityError>>) {
        let (done, outcome) = oneshot::channel();
        let message = Self {
            state: Mutex::new(Some(state)),
            done: Mutex::new(Some(done)),
        };
        (message, outcome)
    }

    pub(crate) fn take(&self) -> Option<T> {
        take_slot(&self.state)
    }

    /// Reports `outcome` to whoever waits on this message. Returns `false` if nobody does.
    pub(crate) fn complete(&self, outcome: Result<(), EntityError>) -> bool {
        match take_slot(&self.done) {
            Some(done) => {
                let _ = done.send(outcome);
                true
            }
            None => false,
        }
    }
}

fn take_slot<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    match slot.lock() {
        Ok(mut slot) => slot.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    }
}

impl<T> Debug for InitializeState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitializeState")
            .field("state", &short_type_name(std::any::type_name::<T>()))
            .finish()
    }
}

impl<T: Send + 'static> EntityMessage for InitializeState<T> {}

/// Dispatched once, right after the state was assigned.
///
/// Register a handler for it to run post-initialization logic; entities that
/// don't care simply leave it unhandled. Only the entity itself raises it:
/// one arriving through the mailbox is an unhandled message like any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityInitialized {
    _sealed: (),
}

impl EntityInitialized {
    pub(crate) fn new() -> Self {
        Self { _sealed: () }
    }
}

impl EntityMessage for EntityInitialized {}

/// Attaches a resource to the receiving entity, ordered with its other messages.
pub struct AttachResource {
    resource: Mutex<Option<Box<dyn Resource>>>,
}

impl AttachResource {
    pub fn new(resource: impl Resource) -> Self {
        Self {
            resource: Mutex::new(Some(Box::new(resource))),
        }
    }

    pub(crate) fn take(&self) -> Option<Box<dyn Resource>> {
        take_slot(&self.resource)
    }
}

impl Debug for AttachResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AttachResource")
    }
}

impl EntityMessage for AttachResource {}
