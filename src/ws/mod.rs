//! WebSocket layer: upgrade, connection loop and session state machine.
//!
//! Clients connect to `/{channel}`, send one `join` event and then any
//! number of `message` events. Chat payloads for the channel arrive as text
//! frames; liveness checks arrive as pings.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod session;

pub use messages::{ClientEvent, JoinRequest};
pub use session::{ConnectionSession, ProtocolViolation, SessionState};
