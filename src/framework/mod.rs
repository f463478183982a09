//! Per-entity actor framework.
//!
//! This module provides the building blocks for entities driven by a single
//! sequential message processor.
//!
//! # Main Components
//!
//! - [`EntityActor`] / [`EntityHandle`] - the processing loop and its managing handle
//! - [`DispatchTable`] - message type to handlers, with fan-out
//! - [`RequestHandler`] and [`ActorRef::ask`] - request/response on top of `tell`
//! - [`GroupBroadcaster`] / [`GroupRouter`] - ordered broadcast groups
//! - [`DisposalChain`] - resources released when an entity terminates
//! - [`EntityError`] - diagnostics and faults
//!
//! # Testing
//!
//! See the [`probe`] module for asserting on what an entity or router sends.

pub mod address;
pub mod context;
pub mod dispatch;
pub mod disposal;
pub mod entity;
pub mod error;
pub mod message;
pub mod probe;
pub mod request;
pub mod router;
pub mod state;

pub use address::{ActorAddress, ActorRef, Mailbox};
pub use context::MessageContext;
pub use dispatch::{DispatchTable, DispatchTableBuilder, Handler};
pub use disposal::{DisposalChain, FnResource, Resource};
pub use entity::{EntityActor, EntityHandle};
pub use error::{AskError, DisposalError, EntityError, HandlerError, ReleaseFailure};
pub use message::{downcast_arc, AttachResource, EntityInitialized, EntityMessage, Envelope, InitializeState};
pub use request::{RequestHandler, Responder};
pub use router::{GroupBroadcaster, GroupRouter, RouterRef};
pub use state::{ActorState, EntityState, MutableActorState};
