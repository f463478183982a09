//! Messages understood by a player session.

use crate::framework::EntityMessage;
use serde::{Deserialize, Serialize};

/// Moves the player by a relative offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub dx: i32,
    pub dy: i32,
}

impl EntityMessage for Move {}

/// Says something to everyone in the player's zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Say {
    pub text: String,
}

impl Say {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl EntityMessage for Say {}

/// A chat line delivered to every member of a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub from: String,
    pub text: String,
}

impl EntityMessage for Chat {}

/// Asks a session for its position. Answered with [`Position`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPosition;

impl EntityMessage for GetPosition {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl EntityMessage for Position {}

/// Removes the player from its zone. The session keeps running but stays silent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kick {
    pub reason: String,
}

impl EntityMessage for Kick {}
