//! In-process broadcast bus.
//!
//! [`LocalBus`] wraps a [`tokio::sync::broadcast`] channel. It is the bus for
//! a relay running without Redis, and the bus the test suites run against.

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::future::ready;
use tokio::sync::broadcast;

use super::{BroadcastBus, BusMessage, BusStream};
use crate::error::RelayError;

/// Broadcast bus confined to the current process.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity
/// (default 10 000). When the ring buffer is full, the oldest messages are
/// dropped for lagging subscribers.
#[derive(Debug, Clone)]
pub struct LocalBus {
    sender: broadcast::Sender<BusMessage>,
}

impl LocalBus {
    /// Creates a new `LocalBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns the current number of active subscriptions.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl BroadcastBus for LocalBus {
    async fn publish(&self, topic: &str, body: String) -> Result<(), RelayError> {
        // No subscribers is not an error: the message simply has no audience.
        let _ = self.sender.send(BusMessage {
            topic: topic.to_string(),
            body,
        });
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<BusStream, RelayError> {
        let rx = self.sender.subscribe();
        let topic = topic.to_string();

        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(message) => return Some((message, rx)),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "bus subscriber lagged behind local bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .filter(move |message| ready(message.topic == topic));

        Ok(stream.boxed())
    }
}
