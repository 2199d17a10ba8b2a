//! Redis Pub/Sub broadcast bus.
//!
//! Publishing goes through a shared multiplexed [`ConnectionManager`];
//! every subscription opens its own dedicated Pub/Sub connection, because a
//! Redis connection in subscribe mode cannot issue other commands.

use std::fmt;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::future::ready;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::{BroadcastBus, BusMessage, BusStream};
use crate::error::RelayError;

/// Broadcast bus spanning every relay process connected to the same Redis.
#[derive(Clone)]
pub struct RedisBus {
    client: redis::Client,
    publisher: ConnectionManager,
}

impl RedisBus {
    /// Creates a bus from an opened client and a connection manager used
    /// for publishing.
    #[must_use]
    pub fn new(client: redis::Client, publisher: ConnectionManager) -> Self {
        Self { client, publisher }
    }
}

impl fmt::Debug for RedisBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBus").finish_non_exhaustive()
    }
}

#[async_trait]
impl BroadcastBus for RedisBus {
    async fn publish(&self, topic: &str, body: String) -> Result<(), RelayError> {
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn.publish(topic, body).await?;
        tracing::trace!(topic, receivers, "published to redis");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<BusStream, RelayError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(topic).await?;
        tracing::info!(topic, "subscribed to redis topic");

        let stream = pubsub.into_on_message().filter_map(|msg| {
            let message = match msg.get_payload::<String>() {
                Ok(body) => Some(BusMessage {
                    topic: msg.get_channel_name().to_string(),
                    body,
                }),
                Err(err) => {
                    tracing::warn!(error = %err, "non-text payload on redis topic");
                    None
                }
            };
            ready(message)
        });

        Ok(stream.boxed())
    }
}
