//! # Request / Response
//!
//! `tell` is fire-and-forget. This module layers "send and wait for the
//! answer" on top of it:
//!
//! - On the calling side, [`ActorRef::ask`] sends the request with a
//!   temporary reply address and suspends the caller (never the target) until
//!   a reply of the expected type arrives, the request is cancelled, or the
//!   target stops. A target that decides not to answer leaves the caller
//!   waiting, so bound the wait with a timeout or a token.
//! - On the answering side, a [`RequestHandler`] computes the response; the
//!   framework sends it back to the requester with the entity as reply-from
//!   address and then runs [`RequestHandler::on_response_sent`].
//!
//! Cancellation is local to the caller: the target may still process the
//! request after the caller stopped waiting.

use crate::framework::address::{ActorAddress, ActorRef};
use crate::framework::context::MessageContext;
use crate::framework::dispatch::{DispatchTableBuilder, Handler};
use crate::framework::error::{AskError, HandlerError};
use crate::framework::message::{downcast_arc, EntityMessage, Envelope};
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Answers requests of type `Req` for entities whose state is `S`.
#[async_trait]
pub trait RequestHandler<Req: EntityMessage, S: Send + 'static>: Send + Sync + 'static {
    type Response: EntityMessage;

    /// Computes the response. `Ok(None)` means "no reply": nothing is sent
    /// and the requester keeps waiting until its own timeout or cancellation.
    async fn handle_request(
        &self,
        ctx: &mut MessageContext<'_, S>,
        request: &Req,
    ) -> Result<Option<Self::Response>, HandlerError>;

    /// Runs after the response was handed to the requester's mailbox.
    ///
    /// Also runs when the reply could not be delivered, and never for `Ok(None)`.
    ///
    /// The entity does not wait for anything started here; spawn follow-up
    /// work instead of doing it inline, or the next message waits for it.
    fn on_response_sent(
        &self,
        _ctx: &MessageContext<'_, S>,
        _request: &Req,
        _response: &Self::Response,
    ) {
    }
}

/// Adapts a [`RequestHandler`] into a plain [`Handler`].
pub struct Responder<Req, H> {
    handler: H,
    _request: PhantomData<fn(&Req)>,
}

impl<Req, H> Responder<Req, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _request: PhantomData,
        }
    }
}

#[async_trait]
impl<Req, S, H> Handler<Req, S> for Responder<Req, H>
where
    Req: EntityMessage,
    S: Send + 'static,
    H: RequestHandler<Req, S>,
{
    async fn handle(
        &self,
        ctx: &mut MessageContext<'_, S>,
        request: &Req,
    ) -> Result<(), HandlerError> {
        let Some(response) = self.handler.handle_request(ctx, request).await? else {
            debug!(entity = %ctx.entity(), "Request produced no reply");
            return Ok(());
        };
        let response = Arc::new(response);

        match ctx.sender() {
            Some(requester) => {
                let envelope = Envelope {
                    message: response.clone(),
                    sender: Some(ctx.entity().clone()),
                };
                if let Err(e) = requester.deliver(envelope) {
                    warn!(entity = %ctx.entity(), requester = %requester, error = %e, "Reply not delivered");
                }
            }
            None => warn!(entity = %ctx.entity(), "Request has no reply address"),
        }

        self.handler.on_response_sent(ctx, request, &response);
        Ok(())
    }
}

impl<S: Send + 'static> DispatchTableBuilder<S> {
    /// Registers a request handler for `Req`.
    pub fn register_request<Req, H>(self, handler: H) -> Self
    where
        Req: EntityMessage,
        H: RequestHandler<Req, S>,
    {
        self.register::<Req, _>(Responder::new(handler))
    }
}

impl ActorRef {
    /// Sends `request` and waits for the first reply of type `Resp`.
    ///
    /// Replies of any other type are ignored. The wait ends with
    /// [`AskError::Cancelled`] when `cancellation` fires and with
    /// [`AskError::NoReply`] when the target stopped without answering. A
    /// live target that chose not to reply is indistinguishable from a slow
    /// one: only `cancellation` ends that wait.
    pub async fn ask<Resp, M>(
        &self,
        request: M,
        cancellation: &CancellationToken,
    ) -> Result<Resp, AskError>
    where
        Resp: EntityMessage + Clone,
        M: EntityMessage,
    {
        // the reply address stays open while we wait, even if the target drops the request
        let (reply_to, mut replies) = ActorRef::channel(ActorAddress::temporary());
        self.tell_from(request, &reply_to)
            .map_err(|_| AskError::Closed)?;

        loop {
            let envelope = tokio::select! {
                biased;
                _ = cancellation.cancelled() => return Err(AskError::Cancelled),
                envelope = replies.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => return Err(AskError::NoReply),
                },
                _ = self.terminated() => return Err(AskError::NoReply),
            };
            match downcast_arc::<Resp>(envelope.message) {
                Ok(reply) => return Ok(Arc::unwrap_or_clone(reply)),
                Err(other) => {
                    debug!(target_actor = %self, message_type = (*other).message_type(), "Ignoring unexpected reply")
                }
            }
        }
    }

    /// [`ask`](ActorRef::ask) bounded by a timeout instead of a token.
    pub async fn ask_timeout<Resp, M>(&self, request: M, timeout: Duration) -> Result<Resp, AskError>
    where
        Resp: EntityMessage + Clone,
        M: EntityMessage,
    {
        let never = CancellationToken::new();
        tokio::time::timeout(timeout, self.ask(request, &never))
            .await
            .map_err(|_| AskError::Timeout(timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::address::Mailbox;
    use crate::framework::disposal::DisposalChain;
    use crate::framework::state::EntityState;

    #[derive(Debug, Clone, PartialEq)]
    struct Add(i64, i64);
    impl EntityMessage for Add {}

    #[derive(Debug, Clone, PartialEq)]
    struct Sum(i64);
    impl EntityMessage for Sum {}

    #[derive(Debug, Clone)]
    struct Noise;
    impl EntityMessage for Noise {}

    #[tokio::test]
    async fn ask_ignores_replies_of_other_types() {
        let (target, mut mailbox) = ActorRef::channel("/calc");
        let server = tokio::spawn(async move {
            let envelope = mailbox.recv().await.unwrap();
            let request = envelope.message.downcast_ref::<Add>().unwrap().clone();
            let requester = envelope.sender.unwrap();
            requester.tell(Noise).unwrap();
            requester.tell(Sum(request.0 + request.1)).unwrap();
            mailbox
        });

        let sum: Sum = target.ask_timeout(Add(2, 3), Duration::from_secs(1)).await.unwrap();
        assert_eq!(sum, Sum(5));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn ask_is_cancelled_locally() {
        let (target, _mailbox) = ActorRef::channel("/silent");
        let token = CancellationToken::new();
        token.cancel();
        let result = target.ask::<Sum, _>(Add(1, 1), &token).await;
        assert_eq!(result, Err(AskError::Cancelled));
    }

    #[tokio::test]
    async fn dropped_request_yields_no_reply() {
        let (target, mailbox) = ActorRef::channel("/dying");
        let killer = tokio::spawn(async move {
            let mut mailbox = mailbox;
            let _ = mailbox.recv().await;
        });
        let result = target.ask::<Sum, _>(Add(1, 1), &CancellationToken::new()).await;
        assert_eq!(result, Err(AskError::NoReply));
        killer.await.unwrap();
    }

    #[tokio::test]
    async fn ask_to_closed_actor_fails_fast() {
        let (target, mailbox) = ActorRef::channel("/gone");
        drop(mailbox);
        let result = target.ask::<Sum, _>(Add(1, 1), &CancellationToken::new()).await;
        assert_eq!(result, Err(AskError::Closed));
    }

    struct Adder;

    #[async_trait]
    impl RequestHandler<Add, ()> for Adder {
        type Response = Sum;

        async fn handle_request(
            &self,
            _ctx: &mut MessageContext<'_, ()>,
            request: &Add,
        ) -> Result<Option<Sum>, HandlerError> {
            Ok(Some(Sum(request.0 + request.1)))
        }
    }

    #[tokio::test]
    async fn responder_replies_from_the_entity_address() {
        let (entity, _entity_mailbox) = ActorRef::channel("/calc");
        let (requester, mut requester_mailbox) = ActorRef::channel("/client");
        let mut state = EntityState::new();
        let mut resources = DisposalChain::new();
        let mut ctx = MessageContext::new(&entity, Some(&requester), &mut state, &mut resources);

        Responder::new(Adder).handle(&mut ctx, &Add(20, 22)).await.unwrap();

        let reply = requester_mailbox.recv().await.unwrap();
        assert_eq!(reply.message.downcast_ref::<Sum>(), Some(&Sum(42)));
        assert_eq!(reply.sender.as_ref(), Some(&entity));
    }

    /// Records whether the reply was already queued for the requester when the hook ran.
    struct CheckedAdder {
        requester: Arc<std::sync::Mutex<Mailbox>>,
        seen: Arc<std::sync::Mutex<Vec<Option<bool>>>>,
    }

    #[async_trait]
    impl RequestHandler<Add, ()> for CheckedAdder {
        type Response = Sum;

        async fn handle_request(
            &self,
            _ctx: &mut MessageContext<'_, ()>,
            request: &Add,
        ) -> Result<Option<Sum>, HandlerError> {
            Ok((request.0 >= 0).then_some(Sum(request.0 + request.1)))
        }

        fn on_response_sent(&self, _ctx: &MessageContext<'_, ()>, _request: &Add, response: &Sum) {
            let queued = self
                .requester
                .lock()
                .unwrap()
                .try_recv()
                .map(|reply| reply.message.downcast_ref::<Sum>() == Some(response));
            self.seen.lock().unwrap().push(queued);
        }
    }

    #[tokio::test]
    async fn response_hook_runs_after_delivery_and_only_for_replies() {
        let (entity, _entity_mailbox) = ActorRef::channel("/calc");
        let (requester, requester_mailbox) = ActorRef::channel("/client");
        let requester_mailbox = Arc::new(std::sync::Mutex::new(requester_mailbox));
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let responder = Responder::new(CheckedAdder {
            requester: requester_mailbox.clone(),
            seen: seen.clone(),
        });
        let mut state = EntityState::new();
        let mut resources = DisposalChain::new();
        let mut ctx = MessageContext::new(&entity, Some(&requester), &mut state, &mut resources);

        responder.handle(&mut ctx, &Add(1, 2)).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![Some(true)]);

        // no reply, no hook
        responder.handle(&mut ctx, &Add(-1, 2)).await.unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);

        // an undeliverable reply still runs the hook
        requester_mailbox.lock().unwrap().close();
        responder.handle(&mut ctx, &Add(3, 4)).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![Some(true), None]);
    }

    #[tokio::test]
    async fn ask_waits_for_a_live_target_that_does_not_answer() {
        let (target, mut mailbox) = ActorRef::channel("/mute");
        let token = CancellationToken::new();
        let server = tokio::spawn({
            let token = token.clone();
            async move {
                // drop the request unanswered, then let the caller give up
                drop(mailbox.recv().await);
                token.cancel();
                mailbox
            }
        });

        let result = target.ask::<Sum, _>(Add(1, 1), &token).await;
        assert_eq!(result, Err(AskError::Cancelled));
        server.await.unwrap();
    }
}
