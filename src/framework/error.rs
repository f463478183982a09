//! # Framework Errors
//!
//! This module defines the error types used throughout the entity framework.
//! By centralizing error definitions, we keep the distinction between
//! *diagnostics* (absorbed locally, the entity keeps running) and *faults*
//! (surfaced to the caller or the task that runs the entity) in one place.
//!
//! | Condition | Kind | Effect on the entity |
//! |-----------|------|----------------------|
//! | [`EntityError::UninitializedMessageDropped`] | diagnostic | keeps running |
//! | [`EntityError::UnhandledMessageType`] | diagnostic | keeps running |
//! | [`EntityError::AlreadyInitialized`] | fails the initialization attempt | keeps running |
//! | [`EntityError::HandlerFault`] | fault | stops, disposal runs |
//! | [`EntityError::Disposal`] | fault | already terminated |
//! | [`EntityError::AlreadyDisposed`] | rejects the attach | unaffected |

use crate::framework::address::ActorAddress;
use std::time::Duration;

/// Error type returned by message handlers.
///
/// Handlers may fail with any error type; the framework only needs to log it
/// and carry it to the supervisor, so it is boxed.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors and diagnostics produced by an entity.
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    #[error("{entity} dropped {message_type} received before initialization")]
    UninitializedMessageDropped {
        entity: ActorAddress,
        message_type: &'static str,
    },
    #[error("{entity} is already initialized")]
    AlreadyInitialized { entity: ActorAddress },
    #[error("{entity} has no handler for {message_type}")]
    UnhandledMessageType {
        entity: ActorAddress,
        message_type: &'static str,
    },
    #[error("{entity} failed to handle {message_type}: {source}")]
    HandlerFault {
        entity: ActorAddress,
        message_type: &'static str,
        #[source]
        source: HandlerError,
    },
    #[error(transparent)]
    Disposal(#[from] DisposalError),
    #[error("{entity} is disposed, cannot attach {resource}")]
    AlreadyDisposed {
        entity: ActorAddress,
        resource: String,
    },
    #[error("Actor closed")]
    ActorClosed,
}

impl EntityError {
    /// Returns true for conditions that are logged and absorbed by the loop.
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            EntityError::UninitializedMessageDropped { .. }
                | EntityError::UnhandledMessageType { .. }
                | EntityError::AlreadyInitialized { .. }
        )
    }
}

/// A single resource that failed to release.
#[derive(Debug, thiserror::Error)]
#[error("resource #{index} ({resource}) failed to release: {source}")]
pub struct ReleaseFailure {
    /// Position of the resource in attachment order.
    pub index: usize,
    pub resource: String,
    #[source]
    pub source: HandlerError,
}

/// Aggregated failure of a disposal chain.
///
/// Produced only after every attached resource was given a chance to release.
#[derive(Debug, thiserror::Error)]
#[error("failed to dispose {} of {attempted} resources gracefully", failures.len())]
pub struct DisposalError {
    pub attempted: usize,
    pub failures: Vec<ReleaseFailure>,
}

impl DisposalError {
    /// Names of the resources that failed, in attachment order.
    pub fn failed_resources(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.resource.as_str())
    }
}

/// Errors returned to the caller of an `ask`.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum AskError {
    #[error("Actor closed")]
    Closed,
    #[error("Target stopped without replying")]
    NoReply,
    #[error("Request cancelled")]
    Cancelled,
    #[error("No reply within {0:?}")]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_are_distinguished_from_faults() {
        let entity = ActorAddress::new("/entity/1");
        let dropped = EntityError::UninitializedMessageDropped {
            entity: entity.clone(),
            message_type: "Move",
        };
        let fault = EntityError::HandlerFault {
            entity,
            message_type: "Move",
            source: "boom".into(),
        };
        assert!(dropped.is_diagnostic());
        assert!(!fault.is_diagnostic());
        assert_eq!(
            fault.to_string(),
            "/entity/1 failed to handle Move: boom"
        );
    }

    #[test]
    fn disposal_error_reports_failed_resources() {
        let err = DisposalError {
            attempted: 3,
            failures: vec![ReleaseFailure {
                index: 1,
                resource: "socket".to_string(),
                source: "reset".into(),
            }],
        };
        assert_eq!(err.failed_resources().collect::<Vec<_>>(), vec!["socket"]);
        assert_eq!(err.to_string(), "failed to dispose 1 of 3 resources gracefully");
    }
}
