//! Peerline peer-session engine.
//!
//! Every node is both server and client: it accepts inbound TCP links and
//! dials at most one bootstrap peer. Each link starts with both sides sending
//! a handshake line carrying their display name; after that, every line is a
//! chat message.
//!
//! # Architecture
//!
//! ```text
//!  Listener ──┐                         ┌── ConnectionHandler (task per link)
//!             ├─ attach ─> Connection ──┤        │ handshake → registry.add
//!  Dialer ────┘                         │        │ chat      → MessageReceived
//!                                       │        └ on exit   → registry.remove
//!                                       │
//!  Session::broadcast / send_to ── Broadcaster ── snapshot ─> write each
//! ```
//!
//! The [`PeerRegistry`] is the only state shared between tasks. Its lock is
//! held for map operations only, never across a network write.
//!
//! # Components
//!
//! - [`Session`]: facade held by the startup collaborator
//! - [`PeerRegistry`]: connection → display name mapping
//! - [`Broadcaster`]: broadcast/unicast fan-out with per-target pruning
//! - [`Connection`]: shared write half of one link
//! - [`SessionEvent`]: notifications for the presentation layer

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod connection;
mod dialer;
mod error;
mod event;
mod handler;
mod listener;
mod registry;
mod sender;
mod session;

pub use config::{Bootstrap, ConfigError, NO_BOOTSTRAP, SessionConfig};
pub use connection::{Connection, ConnectionId};
pub use error::SessionError;
pub use event::{EventSink, SessionEvent};
pub use listener::ListenerHandle;
pub use registry::{Peer, PeerRegistry};
pub use sender::{Broadcaster, FanOut};
pub use session::Session;
