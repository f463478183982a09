//! Player session entities, built on the entity framework.
//!
//! A session is uninitialized until it receives its [`PlayerState`]. On
//! initialization it joins its [`Zone`]'s broadcast group and attaches a
//! resource that leaves the group again when the session is disposed.

pub mod error;
pub mod handlers;
pub mod messages;
pub mod model;

pub use error::*;
pub use messages::*;
pub use model::*;

use crate::framework::{DispatchTable, EntityInitialized};
use handlers::{ChatHandler, JoinZone, KickHandler, MoveHandler, PositionHandler, SayHandler};
use std::sync::Arc;

/// Handler table shared by every session using `zones`.
pub fn dispatch_table(zones: crate::framework::GroupBroadcaster<Zone>) -> Arc<DispatchTable<PlayerState>> {
    DispatchTable::builder()
        .register::<EntityInitialized, _>(JoinZone {
            zones: zones.clone(),
        })
        .register::<Move, _>(MoveHandler)
        .register::<Say, _>(SayHandler {
            zones: zones.clone(),
        })
        .register::<Chat, _>(ChatHandler)
        .register_request::<GetPosition, _>(PositionHandler)
        .register::<Kick, _>(KickHandler { zones })
        .build()
}

/// Address of `player`'s session in `zone`, e.g. `/zone/lobby/alice`.
pub fn session_address(zone: Zone, player: &str) -> String {
    format!("/zone/{}/{}", zone.as_str(), player)
}
