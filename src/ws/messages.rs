//! Client → server WebSocket events.
//!
//! Clients send `{"event": "join" | "message", "data": <string>}`. The
//! server → client direction carries [`crate::domain::ChatPayload`] frames
//! and needs no wrapper.

use serde::Deserialize;

use super::session::ProtocolViolation;
use crate::domain::GUEST;

/// Event sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ClientEvent {
    /// Join the connection's channel as a guest or with a session token.
    Join(String),
    /// Send a chat message to the channel.
    Message(String),
}

/// How a client asked to join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinRequest {
    /// Anonymous, receive-only.
    Guest,
    /// Signed in with a session token.
    Token(String),
}

impl ClientEvent {
    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolViolation::Malformed`] if the frame is not a known
    /// event with string data.
    pub fn parse(text: &str) -> Result<Self, ProtocolViolation> {
        serde_json::from_str(text).map_err(|err| ProtocolViolation::Malformed(err.to_string()))
    }
}

impl From<String> for JoinRequest {
    fn from(data: String) -> Self {
        if data == GUEST {
            Self::Guest
        } else {
            Self::Token(data)
        }
    }
}
