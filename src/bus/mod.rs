//! Broadcast bus: cross-process publish/subscribe keyed by topic.
//!
//! Every relay process publishes chat envelopes to one shared topic and
//! subscribes to it, so a message sent on any process reaches the members
//! of its channel on every process. [`LocalBus`] serves a single process;
//! [`RedisBus`] spans processes through Redis Pub/Sub.

pub mod local;
pub mod redis;

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::RelayError;

pub use self::local::LocalBus;
pub use self::redis::RedisBus;

/// One message received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Topic the message was published on.
    pub topic: String,
    /// Raw message body.
    pub body: String,
}

/// Stream of messages from a bus subscription. Ends when the underlying
/// connection is lost.
pub type BusStream = BoxStream<'static, BusMessage>;

/// Publish/subscribe transport shared by all relay processes.
#[async_trait]
pub trait BroadcastBus: Send + Sync + fmt::Debug {
    /// Publishes `body` on `topic` to every subscribed process.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Bus`] if the transport rejects the publish.
    async fn publish(&self, topic: &str, body: String) -> Result<(), RelayError>;

    /// Opens a subscription to `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Bus`] if the subscription cannot be set up.
    async fn subscribe(&self, topic: &str) -> Result<BusStream, RelayError>;
}
