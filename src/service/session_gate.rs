//! Session gate: background identity and channel checks for a connection.
//!
//! Lookups run as spawned tasks so the connection keeps processing frames
//! while the identity provider answers. Results come back to the
//! connection task as [`GateEvent`]s; only that task ever mutates session
//! state. Every lookup is wrapped in a [`GateTask`] that aborts it when
//! dropped, so closing a connection cancels its in-flight lookups and a
//! late answer can never reach a closed session.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::{Badge, ChannelName, ViewerIdentity};
use crate::identity::{ChannelDirectory, IdentityProvider};

/// Result of a background lookup, delivered to the connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    /// The channel named in the request path does not exist or could not be
    /// checked.
    ChannelRejected(String),
    /// The session token resolved to this identity.
    Identified(ViewerIdentity),
    /// A group membership granted a badge.
    BadgeGranted(Badge),
    /// The session token was rejected or could not be checked.
    Rejected(String),
}

/// Sender half the gate reports into.
pub type GateSender = mpsc::UnboundedSender<GateEvent>;

/// In-flight lookup; aborted when dropped.
#[derive(Debug)]
pub struct GateTask(JoinHandle<()>);

impl Drop for GateTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Spawns identity and channel lookups for connections.
#[derive(Debug, Clone)]
pub struct SessionGate {
    identity: Arc<dyn IdentityProvider>,
    channels: Arc<dyn ChannelDirectory>,
}

impl SessionGate {
    /// Creates a gate over the given identity provider and channel
    /// directory.
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>, channels: Arc<dyn ChannelDirectory>) -> Self {
        Self { identity, channels }
    }

    /// Checks that `channel` exists. Reports only on failure.
    #[must_use]
    pub fn check_channel(&self, channel: ChannelName, events: GateSender) -> GateTask {
        let channels = Arc::clone(&self.channels);
        GateTask(tokio::spawn(async move {
            let reason = match channels.channel_exists(&channel).await {
                Ok(true) => return,
                Ok(false) => format!("unknown channel {channel}"),
                Err(err) => format!("channel lookup failed: {err}"),
            };
            let _ = events.send(GateEvent::ChannelRejected(reason));
        }))
    }

    /// Resolves a session token, then each of the user's groups.
    ///
    /// Emits [`GateEvent::Identified`] once, followed by one
    /// [`GateEvent::BadgeGranted`] per badge-granting group in the order the
    /// group lookups complete. A failed group lookup is logged and skipped.
    #[must_use]
    pub fn resolve(&self, token: String, events: GateSender) -> GateTask {
        let identity = Arc::clone(&self.identity);
        GateTask(tokio::spawn(async move {
            let user = match identity.resolve_token(&token).await {
                Ok(user) => user,
                Err(err) => {
                    let _ = events.send(GateEvent::Rejected(err.to_string()));
                    return;
                }
            };
            if events.send(GateEvent::Identified(user.identity)).is_err() {
                return;
            }

            let mut lookups: FuturesUnordered<_> = user
                .memberships
                .iter()
                .map(|membership| identity.group_name(&membership.group_id))
                .collect();

            while let Some(result) = lookups.next().await {
                match result {
                    Ok(name) => {
                        if let Some(badge) = Badge::for_group(&name)
                            && events.send(GateEvent::BadgeGranted(badge)).is_err()
                        {
                            return;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "group lookup failed");
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::identity::{
        GroupMembership, IdentityChannelDirectory, InMemoryIdentityProvider, OpenDirectory,
        ResolvedUser,
    };

    fn founder() -> ResolvedUser {
        ResolvedUser {
            identity: ViewerIdentity {
                id: "u-1".to_string(),
                username: Some("ada".to_string()),
            },
            memberships: vec![
                GroupMembership {
                    group_id: "g-founder".to_string(),
                },
                GroupMembership {
                    group_id: "g-viewers".to_string(),
                },
                GroupMembership {
                    group_id: "g-missing".to_string(),
                },
            ],
        }
    }

    fn provider() -> InMemoryIdentityProvider {
        InMemoryIdentityProvider::new()
            .with_session("tok", founder())
            .with_group("g-founder", "Founder")
            .with_group("g-viewers", "Viewers")
    }

    fn gate(provider: InMemoryIdentityProvider) -> SessionGate {
        let provider = Arc::new(provider);
        SessionGate::new(
            Arc::clone(&provider) as Arc<dyn IdentityProvider>,
            Arc::new(IdentityChannelDirectory::new(provider)),
        )
    }

    fn channel(name: &str) -> ChannelName {
        let Ok(channel) = ChannelName::parse(name) else {
            panic!("valid channel");
        };
        channel
    }

    async fn drain(mut rx: mpsc::UnboundedReceiver<GateEvent>) -> Vec<GateEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await
        {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn valid_token_yields_identity_then_badge() {
        let (tx, rx) = mpsc::unbounded_channel();
        let _task = gate(provider()).resolve("tok".to_string(), tx);

        let events = drain(rx).await;
        assert_eq!(
            events,
            vec![
                GateEvent::Identified(founder().identity),
                GateEvent::BadgeGranted(Badge {
                    name: "Founder".to_string(),
                    icon: "code".to_string(),
                    color: "D66853".to_string(),
                }),
            ]
        );
    }

    #[tokio::test]
    async fn invalid_token_is_rejected() {
        let (tx, rx) = mpsc::unbounded_channel();
        let _task = gate(provider()).resolve("bogus".to_string(), tx);

        let events = drain(rx).await;
        assert!(matches!(events.as_slice(), [GateEvent::Rejected(_)]));
    }

    #[tokio::test]
    async fn known_channel_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        let _task = gate(provider()).check_channel(channel("u-1"), tx);
        assert!(drain(rx).await.is_empty());
    }

    #[tokio::test]
    async fn unknown_channel_is_rejected() {
        let (tx, rx) = mpsc::unbounded_channel();
        let _task = gate(provider()).check_channel(channel("nobody"), tx);
        let events = drain(rx).await;
        assert!(matches!(events.as_slice(), [GateEvent::ChannelRejected(_)]));
    }

    #[tokio::test]
    async fn open_directory_accepts_unknown_channel() {
        let gate = SessionGate::new(Arc::new(provider()), Arc::new(OpenDirectory));
        let (tx, rx) = mpsc::unbounded_channel();
        let _task = gate.check_channel(channel("anything"), tx);
        assert!(drain(rx).await.is_empty());
    }

    #[tokio::test]
    async fn dropping_the_task_cancels_the_lookup() {
        let slow = provider().with_latency(Duration::from_millis(100));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = gate(slow).resolve("tok".to_string(), tx);
        drop(task);

        let late = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
        // Sender is dropped with the aborted task; nothing arrives.
        assert!(matches!(late, Ok(None)));
    }
}
