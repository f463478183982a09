//! # Test Probe
//!
//! Utilities for testing entities and routers in isolation.
//!
//! A [`TestProbe`] is an address with nobody behind it but the test: hand its
//! [`ActorRef`] to the code under test (as a group member, a reply address,
//! or a collaborator) and then assert on what arrives.
//!
//! # Example
//! ```ignore
//! let mut probe = TestProbe::new("/test/probe");
//! zones.add_to_group(Zone::Lobby, probe.actor_ref())?;
//! zones.broadcast(Zone::Lobby, Say::new("hi"))?;
//!
//! let say: Arc<Say> = probe.expect_message().await;
//! probe.expect_no_message(Duration::from_millis(50)).await;
//! ```

use crate::framework::address::{ActorAddress, ActorRef, Mailbox};
use crate::framework::message::{downcast_arc, EntityMessage, Envelope};
use std::sync::Arc;
use std::time::Duration;

/// How long `expect_*` waits before failing the test.
const DEFAULT_WAIT: Duration = Duration::from_secs(3);

/// A mailbox owned by the test, with assertion helpers.
pub struct TestProbe {
    actor: ActorRef,
    mailbox: Mailbox,
    wait: Duration,
}

impl TestProbe {
    pub fn new(address: impl Into<ActorAddress>) -> Self {
        let (actor, mailbox) = ActorRef::channel(address);
        Self {
            actor,
            mailbox,
            wait: DEFAULT_WAIT,
        }
    }

    /// Overrides how long `expect_*` waits.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn actor_ref(&self) -> ActorRef {
        self.actor.clone()
    }

    pub fn address(&self) -> &ActorAddress {
        self.actor.address()
    }

    /// Waits for the next envelope, whatever its type.
    ///
    /// # Panics
    /// If nothing arrives in time.
    pub async fn expect_envelope(&mut self) -> Envelope {
        match tokio::time::timeout(self.wait, self.mailbox.recv()).await {
            Ok(Some(envelope)) => envelope,
            Ok(None) => panic!("{}: mailbox closed while waiting", self.actor),
            Err(_) => panic!("{}: no message within {:?}", self.actor, self.wait),
        }
    }

    /// Waits for the next message and asserts it is an `M`.
    ///
    /// # Panics
    /// If nothing arrives in time or the next message has another type.
    pub async fn expect_message<M: EntityMessage>(&mut self) -> Arc<M> {
        let envelope = self.expect_envelope().await;
        match downcast_arc::<M>(envelope.message) {
            Ok(message) => message,
            Err(other) => panic!(
                "{}: expected {}, got {:?}",
                self.actor,
                std::any::type_name::<M>(),
                other
            ),
        }
    }

    /// Like [`expect_message`](TestProbe::expect_message), also returning the reply address.
    pub async fn expect_message_from<M: EntityMessage>(&mut self) -> (Arc<M>, Option<ActorRef>) {
        let envelope = self.expect_envelope().await;
        let sender = envelope.sender;
        match downcast_arc::<M>(envelope.message) {
            Ok(message) => (message, sender),
            Err(other) => panic!(
                "{}: expected {}, got {:?}",
                self.actor,
                std::any::type_name::<M>(),
                other
            ),
        }
    }

    /// Asserts that nothing arrives within `within`.
    ///
    /// # Panics
    /// If a message arrives.
    pub async fn expect_no_message(&mut self, within: Duration) {
        if let Ok(Some(envelope)) = tokio::time::timeout(within, self.mailbox.recv()).await {
            panic!("{}: unexpected message {:?}", self.actor, envelope.message);
        }
    }
}
