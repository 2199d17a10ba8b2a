//! Fan-out router: publishes chat envelopes to the bus and delivers what
//! comes back to local channel members.
//!
//! There is no local shortcut. A message published on this process reaches
//! this process's members through the same bus round trip as everyone
//! else's, so content policy is applied in exactly one place.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::task::JoinHandle;

use crate::bus::{BroadcastBus, BusMessage, BusStream};
use crate::domain::{BroadcastEnvelope, ChannelRegistry, ContentViolation, DeliveryReport};
use crate::error::RelayError;

/// What happened to one bus message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutOutcome {
    /// Message arrived on a topic this router does not own.
    ForeignTopic,
    /// Body was not a valid envelope.
    Malformed,
    /// Envelope failed the content policy and was dropped.
    Dropped(ContentViolation),
    /// Envelope was handed to the channel's local members.
    Delivered(DeliveryReport),
}

/// Connects the bus topic to the local channel registry.
#[derive(Debug, Clone)]
pub struct FanoutRouter {
    registry: Arc<ChannelRegistry>,
    bus: Arc<dyn BroadcastBus>,
    topic: String,
}

impl FanoutRouter {
    /// Creates a router for `topic`.
    #[must_use]
    pub fn new(registry: Arc<ChannelRegistry>, bus: Arc<dyn BroadcastBus>, topic: &str) -> Self {
        Self {
            registry,
            bus,
            topic: topic.to_string(),
        }
    }

    /// Returns the shared bus topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Serializes and publishes an envelope on the shared topic.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Serialization`] if encoding fails and
    /// [`RelayError::Bus`] if the bus rejects the publish.
    pub async fn publish(&self, envelope: &BroadcastEnvelope) -> Result<(), RelayError> {
        let body = serde_json::to_string(envelope)?;
        self.bus.publish(&self.topic, body).await
    }

    /// Validates one bus message and delivers it locally.
    ///
    /// Never fails: foreign topics, malformed bodies and policy violations
    /// are reported in the outcome and otherwise dropped.
    pub async fn on_bus_message(&self, message: &BusMessage) -> FanoutOutcome {
        if message.topic != self.topic {
            return FanoutOutcome::ForeignTopic;
        }

        let envelope: BroadcastEnvelope = match serde_json::from_str(&message.body) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(topic = %message.topic, error = %err, "malformed envelope on bus");
                return FanoutOutcome::Malformed;
            }
        };

        if let Err(violation) = envelope.data.check_content() {
            tracing::debug!(channel = %envelope.channel, %violation, "message dropped by content policy");
            return FanoutOutcome::Dropped(violation);
        }

        match self
            .registry
            .deliver_local(&envelope.channel, &envelope.data)
            .await
        {
            Ok(report) => {
                tracing::trace!(
                    channel = %envelope.channel,
                    delivered = report.delivered,
                    failed = report.failed,
                    "fan-out delivered"
                );
                FanoutOutcome::Delivered(report)
            }
            Err(err) => {
                tracing::warn!(channel = %envelope.channel, error = %err, "fan-out encoding failed");
                FanoutOutcome::Malformed
            }
        }
    }

    /// Consumes a bus subscription until it ends.
    pub async fn run(&self, mut stream: BusStream) {
        while let Some(message) = stream.next().await {
            self.on_bus_message(&message).await;
        }
    }

    /// Subscribes to the topic and spawns the delivery loop.
    ///
    /// The first subscription happens before this returns, so messages
    /// published afterwards are never missed. When the subscription ends
    /// the loop resubscribes after `reconnect`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Bus`] if the initial subscription fails.
    pub async fn start(self, reconnect: Duration) -> Result<JoinHandle<()>, RelayError> {
        let first = self.bus.subscribe(&self.topic).await?;
        tracing::info!(topic = %self.topic, "fan-out router subscribed");

        Ok(tokio::spawn(async move {
            let mut stream = first;
            loop {
                self.run(stream).await;
                tracing::warn!(
                    topic = %self.topic,
                    "bus subscription ended, resubscribing in {}s",
                    reconnect.as_secs()
                );
                stream = loop {
                    tokio::time::sleep(reconnect).await;
                    match self.bus.subscribe(&self.topic).await {
                        Ok(stream) => {
                            tracing::info!(topic = %self.topic, "fan-out router resubscribed");
                            break stream;
                        }
                        Err(err) => {
                            tracing::error!(topic = %self.topic, error = %err, "bus resubscribe failed");
                        }
                    }
                };
            }
        }))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::bus::LocalBus;
    use crate::domain::{
        ChannelName, ChatPayload, ConnectionHandle, MAX_MESSAGE_CHARS, Outbound, Viewer,
        ViewerIdentity,
    };

    fn room() -> ChannelName {
        let Ok(channel) = ChannelName::parse("room1") else {
            panic!("valid channel");
        };
        channel
    }

    fn envelope(message: &str) -> BroadcastEnvelope {
        BroadcastEnvelope {
            channel: room(),
            data: ChatPayload {
                viewer: Some(Viewer::Identified(ViewerIdentity {
                    id: "u-1".to_string(),
                    username: Some("bob".to_string()),
                })),
                badges: Vec::new(),
                message: message.to_string(),
            },
        }
    }

    fn bus_message(envelope: &BroadcastEnvelope) -> BusMessage {
        BusMessage {
            topic: "chat".to_string(),
            body: serde_json::to_string(envelope).unwrap_or_default(),
        }
    }

    fn router() -> (FanoutRouter, Arc<ChannelRegistry>, LocalBus) {
        let registry = Arc::new(ChannelRegistry::new());
        let bus = LocalBus::new(64);
        let router = FanoutRouter::new(Arc::clone(&registry), Arc::new(bus.clone()), "chat");
        (router, registry, bus)
    }

    #[tokio::test]
    async fn valid_message_reaches_members() {
        let (router, registry, _bus) = router();
        let (member, mut mailbox) = ConnectionHandle::new(8);
        registry.join(&room(), member).await;

        let outcome = router.on_bus_message(&bus_message(&envelope("hello"))).await;
        assert_eq!(
            outcome,
            FanoutOutcome::Delivered(DeliveryReport { delivered: 1, failed: 0 })
        );

        let Ok(Outbound::Text(frame)) = mailbox.frames.try_recv() else {
            panic!("member should receive the payload");
        };
        let Ok(payload) = serde_json::from_str::<ChatPayload>(&frame) else {
            panic!("frame should be a chat payload");
        };
        assert_eq!(payload.message, "hello");
    }

    #[tokio::test]
    async fn over_long_message_is_dropped() {
        let (router, registry, _bus) = router();
        let (member, mut mailbox) = ConnectionHandle::new(8);
        registry.join(&room(), member).await;

        let long = "a".repeat(MAX_MESSAGE_CHARS + 1);
        let outcome = router.on_bus_message(&bus_message(&envelope(&long))).await;
        assert_eq!(outcome, FanoutOutcome::Dropped(ContentViolation::TooLong(501)));
        assert!(mailbox.frames.try_recv().is_err());
    }

    #[tokio::test]
    async fn blank_message_is_dropped() {
        let (router, registry, _bus) = router();
        let (member, mut mailbox) = ConnectionHandle::new(8);
        registry.join(&room(), member).await;

        let outcome = router.on_bus_message(&bus_message(&envelope("   "))).await;
        assert_eq!(outcome, FanoutOutcome::Dropped(ContentViolation::Blank));
        assert!(mailbox.frames.try_recv().is_err());
    }

    #[tokio::test]
    async fn foreign_topic_is_ignored() {
        let (router, _registry, _bus) = router();
        let mut message = bus_message(&envelope("hello"));
        message.topic = "other".to_string();
        assert_eq!(router.on_bus_message(&message).await, FanoutOutcome::ForeignTopic);
    }

    #[tokio::test]
    async fn malformed_body_is_ignored() {
        let (router, _registry, _bus) = router();
        let message = BusMessage {
            topic: "chat".to_string(),
            body: "{not json".to_string(),
        };
        assert_eq!(router.on_bus_message(&message).await, FanoutOutcome::Malformed);
    }

    #[tokio::test]
    async fn channel_without_local_members_is_noop() {
        let (router, _registry, _bus) = router();
        let outcome = router.on_bus_message(&bus_message(&envelope("hello"))).await;
        assert_eq!(outcome, FanoutOutcome::Delivered(DeliveryReport::default()));
    }

    #[tokio::test]
    async fn published_envelopes_loop_back_through_the_bus() {
        let (router, registry, _bus) = router();
        let (member, mut mailbox) = ConnectionHandle::new(8);
        registry.join(&room(), member).await;

        let Ok(task) = router.clone().start(Duration::from_secs(1)).await else {
            panic!("local bus subscription cannot fail");
        };
        assert!(router.publish(&envelope("round trip")).await.is_ok());

        let frame = tokio::time::timeout(Duration::from_secs(1), mailbox.frames.recv()).await;
        let Ok(Some(Outbound::Text(frame))) = frame else {
            panic!("published message should be delivered locally");
        };
        assert!(frame.contains("round trip"));
        task.abort();
    }
}
