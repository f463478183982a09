//! # Observability & Tracing
//!
//! Structured logging for every entity and router, built on `tracing`.
//!
//! ## Configuration
//!
//! The subscriber uses a compact format that hides the module prefix
//! (`with_target(false)`); entities identify themselves through the `entity`
//! field instead.
//!
//! ## What Gets Traced
//!
//! | Level | Events |
//! |-------|--------|
//! | `info` | entity started / initialized / disposed / stopped, router started / stopped |
//! | `debug` | dispatch (with handler count), membership changes, broadcasts, resources attached |
//! | `warn` | dropped pre-initialization messages, unhandled types, repeated initialization |
//! | `error` | handler faults, resources that failed to release |
//!
//! ## Usage Examples
//!
//! ```bash
//! # Lifecycle only
//! RUST_LOG=info cargo run
//!
//! # Every dispatch and broadcast
//! RUST_LOG=debug cargo run
//!
//! # Framework internals only
//! RUST_LOG=entity_actor::framework=debug cargo run
//! ```
//!
//! With `RUST_LOG=debug` a single `Say` in the demo looks like:
//!
//! ```text
//! DEBUG Dispatch entity=/zone/lobby/alice message_type="Say" handlers=1
//! DEBUG Broadcast group=zones/Lobby message_type="Chat" members=2
//! DEBUG Dispatch entity=/zone/lobby/alice message_type="Chat" handlers=1
//! DEBUG Dispatch entity=/zone/lobby/bob message_type="Chat" handlers=1
//! ```

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber, filtered by `RUST_LOG`.
///
/// # Panics
/// If a global subscriber is already installed.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}

/// Installs the global subscriber with an explicit filter, unless one exists.
///
/// Safe to call from every test; returns `false` when a subscriber was
/// already installed or `filter` does not parse.
pub fn try_setup_tracing(filter: &str) -> bool {
    let Ok(filter) = EnvFilter::try_new(filter) else {
        return false;
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_test_writer()
        .try_init()
        .is_ok()
}
