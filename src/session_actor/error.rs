//! Error types for the session actor.

use crate::framework::EntityError;
use thiserror::Error;

/// Errors raised by session handlers.
///
/// Any of these returned from a handler is a fault and stops the session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A move would leave the world.
    #[error("Move to ({x}, {y}) leaves the world")]
    OutOfBounds { x: i32, y: i32 },

    /// A handler ran before the state was assigned.
    #[error("Session state missing")]
    MissingState,

    /// Zone membership could not be updated.
    #[error("Zone error: {0}")]
    Zone(#[from] EntityError),
}
