//! # Deterministic Group Router
//!
//! A [`GroupRouter`] is a small actor that owns one broadcast group: an
//! ordered set of member [`ActorRef`]s. Because joins, leaves and broadcasts
//! for a group all go through the same router mailbox, they are applied in
//! the order they were sent and never race each other.
//!
//! Membership rules:
//!
//! - Members are compared by [`ActorAddress`], not by handle identity.
//! - Joining twice is a no-op. Leaving when not a member is a no-op.
//! - Broadcast follows join order. A member that leaves and rejoins goes last.
//! - A member whose mailbox dies is removed automatically.
//!
//! The router never keeps a member alive. It only holds the member's address
//! and sending half.
//!
//! [`GroupBroadcaster`] keys one router per value of a closed set of groups
//! (usually a fieldless enum), creating each router the first time its group
//! is used.

use crate::framework::address::{ActorAddress, ActorRef};
use crate::framework::error::EntityError;
use crate::framework::message::{EntityMessage, Envelope};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Commands understood by a [`GroupRouter`].
#[derive(Debug)]
pub enum RouterCommand {
    AddMember(ActorRef),
    RemoveMember(ActorAddress),
    Broadcast(Envelope),
    SendToOne {
        target: ActorAddress,
        envelope: Envelope,
    },
    /// A member's death notification fired. `incarnation` identifies the
    /// join it was watching, so a stale notice never removes a later rejoin.
    Terminated {
        member: ActorAddress,
        incarnation: u64,
    },
    Members(oneshot::Sender<Vec<ActorAddress>>),
}

struct Member {
    actor: ActorRef,
    incarnation: u64,
    /// Cancels the watcher that reports this member's death.
    watch: CancellationToken,
}

/// The actor that owns one group's membership.
pub struct GroupRouter {
    name: Arc<str>,
    receiver: mpsc::UnboundedReceiver<RouterCommand>,
    watcher_sender: mpsc::WeakUnboundedSender<RouterCommand>,
    members: Vec<Member>,
    next_incarnation: u64,
    stop: CancellationToken,
}

impl GroupRouter {
    pub fn new(name: impl Into<Arc<str>>) -> (Self, RouterRef) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let name = name.into();
        let stop = CancellationToken::new();
        let router = Self {
            name: name.clone(),
            receiver,
            watcher_sender: sender.downgrade(),
            members: Vec::new(),
            next_incarnation: 0,
            stop: stop.clone(),
        };
        let client = RouterRef { name, sender, stop };
        (router, client)
    }

    /// Processes commands until stopped or every [`RouterRef`] is dropped.
    pub async fn run(mut self) {
        info!(group = %self.name, "Router started");
        loop {
            let command = tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                command = self.receiver.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };
            self.apply(command);
        }
        for member in self.members.drain(..) {
            member.watch.cancel();
        }
        info!(group = %self.name, "Router stopped");
    }

    fn position(&self, address: &ActorAddress) -> Option<usize> {
        self.members.iter().position(|m| m.actor.address() == address)
    }

    fn apply(&mut self, command: RouterCommand) {
        match command {
            RouterCommand::AddMember(actor) => {
                if self.position(actor.address()).is_some() {
                    debug!(group = %self.name, member = %actor, "Already a member");
                    return;
                }
                let incarnation = self.next_incarnation;
                self.next_incarnation += 1;
                let watch = self.stop.child_token();
                self.watch(actor.clone(), incarnation, watch.clone());
                debug!(group = %self.name, member = %actor, size = self.members.len() + 1, "Member added");
                self.members.push(Member {
                    actor,
                    incarnation,
                    watch,
                });
            }
            RouterCommand::RemoveMember(address) => {
                if let Some(index) = self.position(&address) {
                    self.remove_at(index);
                }
            }
            RouterCommand::Terminated {
                member,
                incarnation,
            } => match self.position(&member) {
                Some(index) if self.members[index].incarnation == incarnation => {
                    self.remove_at(index)
                }
                Some(_) => {
                    debug!(group = %self.name, member = %member, "Ignoring death of an earlier membership")
                }
                None => {}
            },
            RouterCommand::Broadcast(envelope) => {
                debug!(
                    group = %self.name,
                    message_type = envelope.message_type(),
                    members = self.members.len(),
                    "Broadcast"
                );
                for member in &self.members {
                    if member.actor.deliver(envelope.clone()).is_err() {
                        debug!(group = %self.name, member = %member.actor, "Member mailbox closed");
                    }
                }
            }
            RouterCommand::SendToOne { target, envelope } => match self.position(&target) {
                Some(index) => {
                    if self.members[index].actor.deliver(envelope).is_err() {
                        debug!(group = %self.name, member = %target, "Member mailbox closed");
                    }
                }
                None => {
                    warn!(group = %self.name, target = %target, message_type = envelope.message_type(), "Target is not a member")
                }
            },
            RouterCommand::Members(respond_to) => {
                let members = self.members.iter().map(|m| m.actor.address().clone()).collect();
                let _ = respond_to.send(members);
            }
        }
    }

    fn remove_at(&mut self, index: usize) {
        // Vec::remove keeps the remaining join order intact
        let member = self.members.remove(index);
        member.watch.cancel();
        debug!(group = %self.name, member = %member.actor, size = self.members.len(), "Member removed");
    }

    fn watch(&self, member: ActorRef, incarnation: u64, watch: CancellationToken) {
        let router = self.watcher_sender.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = watch.cancelled() => {}
                _ = member.terminated() => {
                    if let Some(router) = router.upgrade() {
                        let _ = router.send(RouterCommand::Terminated {
                            member: member.address().clone(),
                            incarnation,
                        });
                    }
                }
            }
        });
    }
}

/// Cloneable client for a [`GroupRouter`].
#[derive(Clone)]
pub struct RouterRef {
    name: Arc<str>,
    sender: mpsc::UnboundedSender<RouterCommand>,
    stop: CancellationToken,
}

impl RouterRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, command: RouterCommand) -> Result<(), EntityError> {
        self.sender.send(command).map_err(|_| EntityError::ActorClosed)
    }

    pub fn add_member(&self, member: ActorRef) -> Result<(), EntityError> {
        self.send(RouterCommand::AddMember(member))
    }

    pub fn remove_member(&self, member: &ActorAddress) -> Result<(), EntityError> {
        self.send(RouterCommand::RemoveMember(member.clone()))
    }

    /// Delivers `envelope` to every member in join order.
    pub fn broadcast(&self, envelope: Envelope) -> Result<(), EntityError> {
        self.send(RouterCommand::Broadcast(envelope))
    }

    /// Delivers `envelope` to `target` only if it is currently a member.
    pub fn send_to_one(&self, target: &ActorAddress, envelope: Envelope) -> Result<(), EntityError> {
        self.send(RouterCommand::SendToOne {
            target: target.clone(),
            envelope,
        })
    }

    /// Current members in broadcast order.
    pub async fn members(&self) -> Result<Vec<ActorAddress>, EntityError> {
        let (respond_to, response) = oneshot::channel();
        self.send(RouterCommand::Members(respond_to))?;
        response.await.map_err(|_| EntityError::ActorClosed)
    }

    pub fn stop(&self) {
        self.stop.cancel();
    }
}

struct Group {
    router: RouterRef,
    task: JoinHandle<()>,
}

/// One lazily created router per broadcast group key.
///
/// Clones share the same routers.
///
/// ```rust,ignore
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Zone { Lobby, Arena }
///
/// let zones = GroupBroadcaster::<Zone>::new("zones");
/// zones.add_to_group(Zone::Lobby, player.clone())?;
/// zones.broadcast(Zone::Lobby, Say::new("hello"))?;
/// ```
pub struct GroupBroadcaster<G> {
    name: Arc<str>,
    groups: Arc<Mutex<HashMap<G, Group>>>,
}

impl<G> Clone for GroupBroadcaster<G> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            groups: self.groups.clone(),
        }
    }
}

impl<G> GroupBroadcaster<G>
where
    G: Copy + Eq + Hash + Debug + Send + 'static,
{
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            groups: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the router for `group`, spawning it on first use.
    pub fn ensure_group(&self, group: G) -> RouterRef {
        let mut groups = match self.groups.lock() {
            Ok(groups) => groups,
            Err(poisoned) => poisoned.into_inner(),
        };
        groups
            .entry(group)
            .or_insert_with(|| {
                let (router, client) = GroupRouter::new(format!("{}/{:?}", self.name, group));
                Group {
                    router: client,
                    task: tokio::spawn(router.run()),
                }
            })
            .router
            .clone()
    }

    pub fn add_to_group(&self, group: G, member: ActorRef) -> Result<(), EntityError> {
        self.ensure_group(group).add_member(member)
    }

    pub fn remove_from_group(&self, group: G, member: &ActorAddress) -> Result<(), EntityError> {
        self.ensure_group(group).remove_member(member)
    }

    /// Broadcasts without a reply address.
    pub fn broadcast<M: EntityMessage>(&self, group: G, message: M) -> Result<(), EntityError> {
        self.ensure_group(group).broadcast(Envelope::new(message, None))
    }

    /// Broadcasts with `sender` as the reply address seen by every member.
    pub fn broadcast_from<M: EntityMessage>(
        &self,
        group: G,
        message: M,
        sender: &ActorRef,
    ) -> Result<(), EntityError> {
        self.ensure_group(group)
            .broadcast(Envelope::new(message, Some(sender.clone())))
    }

    pub fn send_to_one<M: EntityMessage>(
        &self,
        group: G,
        message: M,
        target: &ActorAddress,
        sender: Option<&ActorRef>,
    ) -> Result<(), EntityError> {
        self.ensure_group(group)
            .send_to_one(target, Envelope::new(message, sender.cloned()))
    }

    pub async fn members(&self, group: G) -> Result<Vec<ActorAddress>, EntityError> {
        self.ensure_group(group).members().await
    }

    pub async fn member_count(&self, group: G) -> Result<usize, EntityError> {
        Ok(self.members(group).await?.len())
    }

    /// Stops every router and waits for them to finish.
    pub async fn shutdown(&self) {
        let groups: Vec<(G, Group)> = match self.groups.lock() {
            Ok(mut groups) => groups.drain().collect(),
            Err(poisoned) => poisoned.into_inner().drain().collect(),
        };
        for (group, Group { router, task }) in groups {
            router.stop();
            if let Err(e) = task.await {
                warn!(broadcaster = %self.name, ?group, error = %e, "Router task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::address::Mailbox;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Note(&'static str);
    impl EntityMessage for Note {}

    async fn next_note(mailbox: &mut Mailbox) -> Note {
        let envelope = tokio::time::timeout(Duration::from_secs(1), mailbox.recv())
            .await
            .unwrap()
            .unwrap();
        envelope.message.downcast_ref::<Note>().unwrap().clone()
    }

    #[tokio::test]
    async fn duplicate_join_and_absent_leave_are_no_ops() {
        let (router, client) = GroupRouter::new("test");
        let task = tokio::spawn(router.run());
        let (a, _mailbox_a) = ActorRef::channel("/a");
        let (a_again, _mailbox_a_again) = ActorRef::channel("/a");

        client.add_member(a).unwrap();
        client.add_member(a_again).unwrap();
        client.remove_member(&ActorAddress::new("/nobody")).unwrap();

        assert_eq!(client.members().await.unwrap(), vec![ActorAddress::new("/a")]);
        client.stop();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn send_to_one_requires_membership() {
        let (router, client) = GroupRouter::new("test");
        let task = tokio::spawn(router.run());
        let (a, mut mailbox_a) = ActorRef::channel("/a");
        let (outsider, mut mailbox_outsider) = ActorRef::channel("/outsider");

        client.add_member(a.clone()).unwrap();
        client
            .send_to_one(outsider.address(), Envelope::new(Note("lost"), None))
            .unwrap();
        client
            .send_to_one(a.address(), Envelope::new(Note("direct"), None))
            .unwrap();

        assert_eq!(next_note(&mut mailbox_a).await, Note("direct"));
        client.members().await.unwrap();
        assert!(mailbox_outsider.try_recv().is_none());
        client.stop();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn dead_members_are_removed() {
        let (router, client) = GroupRouter::new("test");
        let task = tokio::spawn(router.run());
        let (a, mailbox_a) = ActorRef::channel("/a");
        let (b, _mailbox_b) = ActorRef::channel("/b");
        client.add_member(a).unwrap();
        client.add_member(b).unwrap();

        drop(mailbox_a);

        let mut members = client.members().await.unwrap();
        for _ in 0..50 {
            if members.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            members = client.members().await.unwrap();
        }
        assert_eq!(members, vec![ActorAddress::new("/b")]);
        client.stop();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn groups_are_created_lazily_and_independent() {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        enum Channel {
            Red,
            Blue,
        }

        let broadcaster = GroupBroadcaster::<Channel>::new("channels");
        let (a, mut mailbox_a) = ActorRef::channel("/a");
        broadcaster.add_to_group(Channel::Red, a).unwrap();

        broadcaster.broadcast(Channel::Blue, Note("blue")).unwrap();
        broadcaster.broadcast(Channel::Red, Note("red")).unwrap();

        assert_eq!(next_note(&mut mailbox_a).await, Note("red"));
        assert_eq!(broadcaster.member_count(Channel::Red).await.unwrap(), 1);
        assert_eq!(broadcaster.member_count(Channel::Blue).await.unwrap(), 0);
        broadcaster.shutdown().await;
    }

    #[tokio::test]
    async fn stale_death_notice_leaves_a_rejoined_member_alone() {
        let (mut router, _client) = GroupRouter::new("test");
        let (a, _mailbox_a) = ActorRef::channel("/a");

        router.apply(RouterCommand::AddMember(a.clone()));
        router.apply(RouterCommand::RemoveMember(a.address().clone()));
        router.apply(RouterCommand::AddMember(a.clone()));
        router.apply(RouterCommand::Terminated {
            member: a.address().clone(),
            incarnation: 0,
        });
        assert_eq!(router.position(a.address()), Some(0));

        router.apply(RouterCommand::Terminated {
            member: a.address().clone(),
            incarnation: 1,
        });
        assert!(router.members.is_empty());
    }
}
