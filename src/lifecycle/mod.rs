//! # System Lifecycle & Orchestration
//!
//! Individual entities are simple; starting many of them, wiring their
//! diagnostics, and stopping them all cleanly is where the work is. This
//! module provides that conductor.
//!
//! # Main Components
//!
//! - [`EntitySystem`] - spawns entities, keeps their tasks, shuts them down
//! - [`setup_tracing`] - initializes the tracing/logging infrastructure
//!
//! ## Shutdown
//!
//! Entities hold their own address, so they never stop just because every
//! outside handle was dropped. [`EntitySystem::shutdown`] disposes each
//! entity explicitly (releasing its attached resources) and then awaits its
//! task, reporting the first failure it saw.

pub mod system;
pub mod tracing;

pub use system::*;
pub use tracing::*;
