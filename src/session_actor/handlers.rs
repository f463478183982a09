//! Handler implementations for the session entity.
//!
//! Every handler shares the zone broadcaster, so they are plain structs
//! holding a clone of it.

use super::error::SessionError;
use super::messages::{Chat, GetPosition, Kick, Move, Position, Say};
use super::model::{PlayerState, Zone, WORLD_RADIUS};
use crate::framework::{
    EntityInitialized, FnResource, GroupBroadcaster, Handler, HandlerError, MessageContext,
    RequestHandler,
};
use async_trait::async_trait;
use tracing::{debug, info, warn};

type Ctx<'a> = MessageContext<'a, PlayerState>;

fn player<'c>(ctx: &'c Ctx<'_>) -> Result<&'c PlayerState, SessionError> {
    ctx.state().data().ok_or(SessionError::MissingState)
}

fn player_mut<'c>(ctx: &'c mut Ctx<'_>) -> Result<&'c mut PlayerState, SessionError> {
    ctx.state_mut().data_mut().ok_or(SessionError::MissingState)
}

/// Joins the player's zone once the state is set, and leaves it on disposal.
pub struct JoinZone {
    pub zones: GroupBroadcaster<Zone>,
}

#[async_trait]
impl Handler<EntityInitialized, PlayerState> for JoinZone {
    async fn handle(&self, ctx: &mut Ctx<'_>, _message: &EntityInitialized) -> Result<(), HandlerError> {
        let zone = player(ctx)?.zone;
        let me = ctx.entity().clone();
        self.zones.add_to_group(zone, me.clone())?;
        info!(entity = %me, zone = zone.as_str(), "Joined zone");

        let zones = self.zones.clone();
        ctx.attach(FnResource::new("zone membership", move || {
            zones
                .remove_from_group(zone, me.address())
                .map_err(HandlerError::from)
        }))?;
        Ok(())
    }
}

pub struct MoveHandler;

#[async_trait]
impl Handler<Move, PlayerState> for MoveHandler {
    async fn handle(&self, ctx: &mut Ctx<'_>, message: &Move) -> Result<(), HandlerError> {
        let entity = ctx.entity().clone();
        let state = player_mut(ctx)?;
        if state.kicked {
            warn!(entity = %entity, "Kicked player tried to move");
            return Ok(());
        }
        let (x, y) = (state.x + message.dx, state.y + message.dy);
        if x.abs() > WORLD_RADIUS || y.abs() > WORLD_RADIUS {
            return Err(SessionError::OutOfBounds { x, y }.into());
        }
        state.x = x;
        state.y = y;
        debug!(entity = %entity, x, y, "Moved");
        Ok(())
    }
}

pub struct SayHandler {
    pub zones: GroupBroadcaster<Zone>,
}

#[async_trait]
impl Handler<Say, PlayerState> for SayHandler {
    async fn handle(&self, ctx: &mut Ctx<'_>, message: &Say) -> Result<(), HandlerError> {
        let state = player(ctx)?;
        if state.kicked {
            warn!(entity = %ctx.entity(), "Kicked player tried to speak");
            return Ok(());
        }
        let chat = Chat {
            from: state.name.clone(),
            text: message.text.clone(),
        };
        self.zones.broadcast_from(state.zone, chat, ctx.entity())?;
        Ok(())
    }
}

pub struct ChatHandler;

#[async_trait]
impl Handler<Chat, PlayerState> for ChatHandler {
    async fn handle(&self, ctx: &mut Ctx<'_>, message: &Chat) -> Result<(), HandlerError> {
        player_mut(ctx)?
            .inbox
            .push(format!("{}: {}", message.from, message.text));
        Ok(())
    }
}

/// Answers [`GetPosition`]. Kicked players do not answer.
pub struct PositionHandler;

#[async_trait]
impl RequestHandler<GetPosition, PlayerState> for PositionHandler {
    type Response = Position;

    async fn handle_request(
        &self,
        ctx: &mut Ctx<'_>,
        _request: &GetPosition,
    ) -> Result<Option<Position>, HandlerError> {
        let state = player(ctx)?;
        if state.kicked {
            return Ok(None);
        }
        Ok(Some(Position {
            x: state.x,
            y: state.y,
        }))
    }

    fn on_response_sent(&self, ctx: &Ctx<'_>, _request: &GetPosition, response: &Position) {
        debug!(entity = %ctx.entity(), x = response.x, y = response.y, "Position reported");
    }
}

pub struct KickHandler {
    pub zones: GroupBroadcaster<Zone>,
}

#[async_trait]
impl Handler<Kick, PlayerState> for KickHandler {
    async fn handle(&self, ctx: &mut Ctx<'_>, message: &Kick) -> Result<(), HandlerError> {
        let me = ctx.entity().address().clone();
        let state = player_mut(ctx)?;
        if state.kicked {
            return Ok(());
        }
        state.kicked = true;
        self.zones.remove_from_group(state.zone, &me)?;
        info!(entity = %me, reason = %message.reason, "Player kicked");
        Ok(())
    }
}
