//! Connection session state machine.
//!
//! ```text
//! Connecting ──open──▶ AwaitingJoin ──join──▶ Joined ──close──▶ Closed
//!                           │                   │
//!                           └──── violation ────┴──▶ (terminated) ──▶ Closed
//! ```
//!
//! The session owns the connection's viewer, badges and in-flight gate
//! lookups. Events that are invalid for the current state are protocol
//! violations; the connection loop terminates the socket on any of them.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::messages::{ClientEvent, JoinRequest};
use crate::domain::{
    Badge, BroadcastEnvelope, ChannelName, ChatPayload, ConnectionHandle, ConnectionId, Viewer,
};
use crate::presence::PresenceWriter;
use crate::service::{GateEvent, GateSender, GateTask, RelayService};

/// Lifecycle state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet registered with the relay.
    Connecting,
    /// Registered; waiting for the client's join event.
    AwaitingJoin,
    /// Member of its channel.
    Joined,
    /// Torn down; absorbs every further event.
    Closed,
}

/// Reason a connection is terminated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    /// Frame is not a well-formed client event.
    #[error("malformed frame: {0}")]
    Malformed(String),
    /// Binary frame is not valid UTF-8.
    #[error("binary frame is not UTF-8")]
    NonUtf8Frame,
    /// Event is not allowed in the current state.
    #[error("{event} event not allowed while {state:?}")]
    UnexpectedEvent {
        /// Event name.
        event: &'static str,
        /// State the session was in.
        state: SessionState,
    },
    /// Message sent by a connection missing from its channel's registry
    /// entry.
    #[error("connection is not a member of its channel")]
    NotAMember,
    /// Channel from the request path was rejected.
    #[error("channel rejected: {0}")]
    ChannelRejected(String),
    /// Session token was rejected.
    #[error("session rejected: {0}")]
    Unauthenticated(String),
}

/// State machine for one client connection.
#[derive(Debug)]
pub struct ConnectionSession {
    relay: Arc<RelayService>,
    handle: ConnectionHandle,
    channel: ChannelName,
    state: SessionState,
    viewer: Option<Viewer>,
    badges: Vec<Badge>,
    gate_events: GateSender,
    lookups: Vec<GateTask>,
    presence: Option<PresenceWriter>,
}

impl ConnectionSession {
    /// Creates a session in [`SessionState::Connecting`]. Gate results are
    /// reported to `gate_events`; the caller feeds them back through
    /// [`Self::handle_gate`].
    #[must_use]
    pub fn new(
        relay: Arc<RelayService>,
        handle: ConnectionHandle,
        channel: ChannelName,
        gate_events: GateSender,
    ) -> Self {
        Self {
            relay,
            handle,
            channel,
            state: SessionState::Connecting,
            viewer: None,
            badges: Vec::new(),
            gate_events,
            lookups: Vec::new(),
            presence: None,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the connection id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.handle.id()
    }

    /// Returns the channel this connection targets.
    #[must_use]
    pub const fn channel(&self) -> &ChannelName {
        &self.channel
    }

    /// Returns the viewer, once known.
    #[must_use]
    pub const fn viewer(&self) -> Option<&Viewer> {
        self.viewer.as_ref()
    }

    /// Returns the badges granted so far.
    #[must_use]
    pub fn badges(&self) -> &[Badge] {
        &self.badges
    }

    /// Registers the connection for liveness checks and starts channel
    /// validation. Moves to [`SessionState::AwaitingJoin`].
    pub async fn open(&mut self) {
        if self.state != SessionState::Connecting {
            return;
        }
        self.relay.connections().insert(self.handle.clone()).await;
        let check = self
            .relay
            .gate()
            .check_channel(self.channel.clone(), self.gate_events.clone());
        self.lookups.push(check);
        self.state = SessionState::AwaitingJoin;
        tracing::debug!(connection_id = %self.id(), channel = %self.channel, "connection opened");
    }

    /// Handles one text frame from the client.
    ///
    /// # Errors
    ///
    /// Returns the [`ProtocolViolation`] that requires the connection to be
    /// terminated.
    pub async fn handle_text(&mut self, text: &str) -> Result<(), ProtocolViolation> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        match ClientEvent::parse(text)? {
            ClientEvent::Join(data) => self.join(data.into()).await,
            ClientEvent::Message(message) => self.message(message).await,
        }
    }

    async fn join(&mut self, request: JoinRequest) -> Result<(), ProtocolViolation> {
        if self.state != SessionState::AwaitingJoin {
            return Err(ProtocolViolation::UnexpectedEvent {
                event: "join",
                state: self.state,
            });
        }

        match request {
            JoinRequest::Guest => self.viewer = Some(Viewer::Guest),
            JoinRequest::Token(token) => {
                let lookup = self.relay.gate().resolve(token, self.gate_events.clone());
                self.lookups.push(lookup);
            }
        }
        // Membership does not wait for the identity lookup; badges are
        // cosmetic and arrive whenever the provider answers.
        self.relay
            .registry()
            .join(&self.channel, self.handle.clone())
            .await;
        self.state = SessionState::Joined;
        tracing::debug!(
            connection_id = %self.id(),
            channel = %self.channel,
            guest = self.is_guest(),
            "joined channel"
        );
        Ok(())
    }

    async fn message(&mut self, message: String) -> Result<(), ProtocolViolation> {
        if self.state != SessionState::Joined {
            return Err(ProtocolViolation::UnexpectedEvent {
                event: "message",
                state: self.state,
            });
        }
        if self.is_guest() {
            tracing::trace!(connection_id = %self.id(), "guest message ignored");
            return Ok(());
        }
        if !self
            .relay
            .registry()
            .contains(&self.channel, self.handle.id())
            .await
        {
            return Err(ProtocolViolation::NotAMember);
        }

        let envelope = BroadcastEnvelope {
            channel: self.channel.clone(),
            data: ChatPayload {
                viewer: self.viewer.clone(),
                badges: self.badges.clone(),
                message,
            },
        };
        if let Err(err) = self.relay.router().publish(&envelope).await {
            tracing::warn!(
                connection_id = %self.id(),
                channel = %self.channel,
                error = %err,
                "publish failed, message lost"
            );
        }
        Ok(())
    }

    /// Applies a gate result.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolViolation::ChannelRejected`] or
    /// [`ProtocolViolation::Unauthenticated`] when the gate refuses the
    /// connection.
    pub fn handle_gate(&mut self, event: GateEvent) -> Result<(), ProtocolViolation> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        match event {
            GateEvent::ChannelRejected(reason) => Err(ProtocolViolation::ChannelRejected(reason)),
            GateEvent::Rejected(reason) => Err(ProtocolViolation::Unauthenticated(reason)),
            GateEvent::Identified(identity) => {
                let viewer = Viewer::Identified(identity);
                let relay = &self.relay;
                let channel = &self.channel;
                self.presence
                    .get_or_insert_with(|| {
                        PresenceWriter::spawn(Arc::clone(relay.presence()), channel.clone())
                    })
                    .add(&viewer);
                self.viewer = Some(viewer);
                tracing::debug!(connection_id = %self.id(), "viewer identified");
                Ok(())
            }
            GateEvent::BadgeGranted(badge) => {
                self.badges.push(badge);
                Ok(())
            }
        }
    }

    /// Tears the session down: cancels in-flight lookups, leaves the
    /// channel, stops liveness tracking and clears presence. Idempotent.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        let was_joined = self.state == SessionState::Joined;
        self.state = SessionState::Closed;
        self.lookups.clear();

        if was_joined {
            self.relay
                .registry()
                .leave(&self.channel, self.handle.id())
                .await;
        }
        self.relay.connections().remove(self.handle.id()).await;

        // Queued behind the insertion; the writer drains and exits.
        if let Some(writer) = self.presence.take()
            && let Some(viewer @ Viewer::Identified(_)) = &self.viewer
        {
            writer.remove(viewer);
        }
        tracing::debug!(connection_id = %self.id(), channel = %self.channel, "connection closed");
    }

    fn is_guest(&self) -> bool {
        self.viewer.as_ref().is_some_and(Viewer::is_guest)
    }
}

/// Creates the gate channel a session reports into.
#[must_use]
pub fn gate_channel() -> (GateSender, mpsc::UnboundedReceiver<GateEvent>) {
    mpsc::unbounded_channel()
}
