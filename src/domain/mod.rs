//! Domain layer: channels, connections, viewers and the channel registry.
//!
//! This module contains the process-local model of the relay: typed channel
//! and connection identifiers, the handle other components use to reach a
//! connection, the chat payload and bus envelope, and the registry mapping
//! channels to their local members.

pub mod channel;
pub mod channel_registry;
pub mod connection;
pub mod connection_tracker;
pub mod envelope;
pub mod viewer;

pub use channel::ChannelName;
pub use channel_registry::{ChannelRegistry, ChannelSummary, DeliveryReport};
pub use connection::{ConnectionHandle, ConnectionId, ConnectionMailbox, DeliveryError, Outbound};
pub use connection_tracker::ConnectionTracker;
pub use envelope::{BroadcastEnvelope, ChatPayload, ContentViolation, MAX_MESSAGE_CHARS};
pub use viewer::{Badge, GUEST, Viewer, ViewerIdentity};
