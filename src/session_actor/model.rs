use serde::{Deserialize, Serialize};

/// Positions are clamped to `-WORLD_RADIUS..=WORLD_RADIUS` on both axes.
pub const WORLD_RADIUS: i32 = 100;

/// The zones a player can be in. Each zone is one broadcast group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    Lobby,
    Arena,
}

impl Zone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Lobby => "lobby",
            Zone::Arena => "arena",
        }
    }
}

/// State of one player session.
///
/// Assigned once by the initialization message, then owned by the session entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub name: String,
    pub zone: Zone,
    pub x: i32,
    pub y: i32,
    /// Set by `Kick`; a kicked session ignores movement and chat.
    pub kicked: bool,
    /// Chat lines received from the zone, oldest first.
    pub inbox: Vec<String>,
}

impl PlayerState {
    /// A fresh player at the origin of `zone`.
    pub fn new(name: impl Into<String>, zone: Zone) -> Self {
        Self {
            name: name.into(),
            zone,
            x: 0,
            y: 0,
            kicked: false,
            inbox: Vec::new(),
        }
    }
}
