//! # nebula-relay
//!
//! Horizontally scalable WebSocket chat relay.
//!
//! Clients connect to `/{channel}`, join as a guest or with a session
//! token, and send chat messages. Every relay process publishes accepted
//! messages to a shared broadcast bus (Redis pub/sub) and delivers every
//! bus message to its own local members of the target channel, so a client
//! sees messages from peers connected to any process.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket /{channel}, HTTP /health /api/v1)
//!     │
//!     ├── WS Handler + ConnectionSession (ws/)
//!     ├── REST Handlers (api/)
//!     │
//!     ├── RelayService (service/)
//!     │     ├── SessionGate ──▶ IdentityProvider / ChannelDirectory (identity/)
//!     │     ├── FanoutRouter ◀─▶ BroadcastBus (bus/)
//!     │     └── LivenessMonitor
//!     │
//!     ├── ChannelRegistry, ConnectionTracker (domain/)
//!     │
//!     └── PresenceStore (presence/)
//! ```
//!
//! The channel registry is strictly process-local; the bus is the only
//! cross-process path for chat traffic.

pub mod api;
pub mod app;
pub mod app_state;
pub mod bus;
pub mod config;
pub mod domain;
pub mod error;
pub mod identity;
pub mod presence;
pub mod service;
pub mod ws;
