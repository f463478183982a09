#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Entity Actor
//!
//! > **Sequential, initialization-gated entities on Tokio.**
//!
//! Each entity (a game object, a session, any long-lived unit) is driven by
//! one task that processes its messages one at a time. The crate takes care of
//! the parts that are easy to get subtly wrong when many senders talk to an
//! entity concurrently:
//!
//! - the entity accepts its state exactly once, and ignores everything sent before that
//! - several handlers can react to the same message type, in a fixed order
//! - a failing handler stops the entity instead of leaving it half-updated
//! - resources tied to the entity are released when it stops, even if some fail
//! - broadcasts to a group reach members in join order
//!
//! ## 🚀 Core Concepts
//!
//! ### Messages are types
//! Any `Debug + Send + Sync + 'static` type becomes a message with
//! `impl EntityMessage for MyMessage {}`. The concrete type is the dispatch
//! key; there is no payload schema.
//!
//! ### The state `S`
//! `EntityActor<S>` and `DispatchTable<S>` are generic over the entity's state.
//! One loop implementation serves every kind of entity; a kind differs only
//! in its state type and handler table.
//!
//! ### Testing with probes
//! A [`TestProbe`](framework::probe::TestProbe) is an address owned by the
//! test. Register it as a group member or use it as a reply address, then
//! assert on what arrives.
//!
//! ## 👩‍💻 Architecture Notes
//!
//! ### 1. Diagnostics vs. faults
//! Protocol slips (a message before initialization, a type nobody handles, a
//! second initialization) are logged and the entity keeps going. A handler
//! error is a fault: the entity stops, disposes its resources, and `run()`
//! returns the error. Nothing restarts it. See [`framework::error`].
//!
//! ### 2. One lock per entity
//! The loop holds a per-entity lock for the whole handler chain of a message.
//! The managing side ([`EntityHandle`](framework::EntityHandle)) takes the
//! same lock to attach resources, read state, or dispose, so none of that ever
//! interleaves with a handler. Initialization is queued through the mailbox
//! instead, so it lands in order with everything told before it.
//!
//! ### 3. Observability
//! Every event carries the entity's address as a structured field. See the
//! [`lifecycle::tracing`] module for levels and examples.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Engine ([`framework`])
//! - **Role**: the entity loop, dispatch, request/response, group routing, disposal.
//! - **Key items**: [`EntityActor`](framework::EntityActor),
//!   [`DispatchTable`](framework::DispatchTable),
//!   [`GroupBroadcaster`](framework::GroupBroadcaster).
//!
//! ### 2. The Orchestrator ([`lifecycle`])
//! - **Role**: spawns entities, routes their diagnostics, shuts them all down.
//! - **Key items**: [`EntitySystem`](lifecycle::EntitySystem),
//!   [`shutdown`](lifecycle::EntitySystem::shutdown).
//!
//! ### 3. Settings ([`config`])
//! - **Role**: defaults plus environment overrides for timeouts and log filters.
//!
//! ### 4. The Implementation ([`session_actor`])
//! - **Role**: player sessions that move, chat within a zone, and answer position requests.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Run the demo with info logs
//! RUST_LOG=info cargo run
//!
//! # Run the tests
//! cargo test
//! ```

pub mod config;
pub mod framework;
pub mod lifecycle;
pub mod session_actor;
