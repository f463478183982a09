//! # Actor Addresses
//!
//! The minimal substrate every entity is built on: a logical [`ActorAddress`],
//! an [`ActorRef`] that can `tell` messages to it, and the [`Mailbox`] the
//! owning task reads from.
//!
//! Two `ActorRef`s are the same actor when their addresses are equal, even if
//! they were cloned or rebuilt separately. That is what group membership
//! compares on.
//!
//! Mailboxes are unbounded: `tell` never waits for the receiver. Messages from
//! one sender to one actor arrive in send order.
//!
//! Dropping (or closing) a [`Mailbox`] is the actor's death: every `ActorRef`
//! pointing at it observes [`ActorRef::terminated`] completing.

use crate::framework::context::release_undelivered;
use crate::framework::error::EntityError;
use crate::framework::message::{EntityMessage, Envelope};
use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Logical identity of an actor (e.g. `/zone/3/player/42`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorAddress(Arc<str>);

impl ActorAddress {
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(Arc::from(path.as_ref()))
    }

    /// A fresh, process-unique address under `/temp`, used for ask reply slots.
    pub fn temporary() -> Self {
        static NEXT_TEMP: AtomicU64 = AtomicU64::new(1);
        let id = NEXT_TEMP.fetch_add(1, Ordering::Relaxed);
        Self::new(format!("/temp/ask-{}", id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ActorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Debug for ActorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&*self.0, f)
    }
}

impl From<&str> for ActorAddress {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for ActorAddress {
    fn from(path: String) -> Self {
        Self(Arc::from(path))
    }
}

/// A cloneable handle used to send messages to an actor.
#[derive(Clone)]
pub struct ActorRef {
    address: ActorAddress,
    sender: mpsc::UnboundedSender<Envelope>,
    terminated: CancellationToken,
}

impl ActorRef {
    /// Creates an address, its handle, and the mailbox that receives from it.
    pub fn channel(address: impl Into<ActorAddress>) -> (ActorRef, Mailbox) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let terminated = CancellationToken::new();
        let actor = ActorRef {
            address: address.into(),
            sender,
            terminated: terminated.clone(),
        };
        let mailbox = Mailbox {
            receiver,
            terminated,
        };
        (actor, mailbox)
    }

    pub fn address(&self) -> &ActorAddress {
        &self.address
    }

    /// Fire-and-forget send with no reply address.
    pub fn tell<M: EntityMessage>(&self, message: M) -> Result<(), EntityError> {
        self.deliver(Envelope::new(message, None))
    }

    /// Fire-and-forget send; replies go to `sender`.
    pub fn tell_from<M: EntityMessage>(
        &self,
        message: M,
        sender: &ActorRef,
    ) -> Result<(), EntityError> {
        self.deliver(Envelope::new(message, Some(sender.clone())))
    }

    /// Sends an already-built envelope, e.g. a message shared by a broadcast.
    ///
    /// A resource attached through a closed mailbox is released on the spot.
    pub fn deliver(&self, envelope: Envelope) -> Result<(), EntityError> {
        self.sender.send(envelope).map_err(|mpsc::error::SendError(envelope)| {
            release_undelivered(&self.address, &*envelope.message)
                .unwrap_or(EntityError::ActorClosed)
        })
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.is_cancelled() || self.sender.is_closed()
    }

    /// Completes once the actor behind this reference has stopped.
    pub async fn terminated(&self) {
        self.terminated.cancelled().await
    }
}

impl PartialEq for ActorRef {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for ActorRef {}

impl Hash for ActorRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state)
    }
}

impl Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorRef({})", self.address)
    }
}

impl Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.address, f)
    }
}

/// The receiving end of an actor's message queue.
pub struct Mailbox {
    receiver: mpsc::UnboundedReceiver<Envelope>,
    terminated: CancellationToken,
}

impl Mailbox {
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.receiver.try_recv().ok()
    }

    /// Stops accepting messages and signals termination to every `ActorRef`.
    ///
    /// Messages already queued are dropped with the mailbox.
    pub fn close(&mut self) {
        self.receiver.close();
        self.terminated.cancel();
    }
}

impl Drop for Mailbox {
    fn drop(&mut self) {
        self.terminated.cancel();
    }
}
