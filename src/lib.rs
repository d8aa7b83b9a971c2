//! Wireline - client-side RPC over a persistent duplex connection.
//!
//! Callers issue named method calls with arbitrary arguments; this layer
//! serializes them onto a shared connection, correlates asynchronous
//! responses back to the originating call, and exposes per-call completion
//! to any number of concurrent callers without blocking the connection or
//! each other.
//!
//! # Architecture
//!
//! - **Dispatcher** - correlation registry, call entry point, inbound
//!   delivery routing; one per connection
//! - **CallHandle** - caller-facing view of one in-flight invocation
//! - **LinkStatus / Transport** - injected connection collaborators
//!   (readiness polling and the outbound send primitive)
//!
//! The connection itself (handshake, framing, reconnection policy) lives
//! outside this crate; whatever owns it feeds inbound frames to
//! [`Dispatcher::handle_frame`] (or [`Dispatcher::deliver`] /
//! [`Dispatcher::mark_synchronized`] directly) and keeps a
//! [`SharedLinkState`] current.
//!
//! # Modules
//!
//! - [`call`] - invocation state machine and handles
//! - [`dispatcher`] - registry and delivery routing
//! - [`connection`] - collaborator seams
//! - [`protocol`] - minimal wire vocabulary for correlation
//! - [`config`] - runtime tunables

// Library modules
pub mod call;
pub mod config;
pub mod connection;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod protocol;

// Re-export commonly used types
pub use call::{CallHandle, CallId};
pub use config::Config;
pub use connection::{ConnectionState, LinkStatus, SharedLinkState, Transport};
pub use dispatcher::Dispatcher;
pub use error::{CallError, RemoteError};
