//! WebSocket layer: the real-time hub, connection handling, and wire
//! messages.
//!
//! The WebSocket endpoint at `/ws` is token-authenticated at connect
//! time. Clients join per-auction rooms and receive bid and lifecycle
//! events pushed by the services after each committed mutation.

pub mod connection;
pub mod handler;
pub mod hub;
pub mod messages;

pub use hub::{ConnectionId, ConnectionMeta, HubStats, RealtimeHub};
pub use messages::{ClientMessage, ServerMessage};
