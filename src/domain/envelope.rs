//! Chat payloads and the broadcast envelope carried over the bus.
//!
//! Content policy is enforced where envelopes are consumed, so every relay
//! process applies it independently to everything it delivers, including
//! the messages it published itself.

use serde::{Deserialize, Serialize};

use super::{Badge, ChannelName, Viewer};

/// Longest accepted message, in UTF-16 code units.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Payload forwarded verbatim to every client in the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    /// Sender. Absent while the sender's identity is still resolving.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer: Option<Viewer>,
    /// Sender's badges at publish time.
    #[serde(default)]
    pub badges: Vec<Badge>,
    /// Message text.
    pub message: String,
}

/// Unit published to the bus: a channel tag plus the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastEnvelope {
    /// Target channel.
    pub channel: ChannelName,
    /// Payload delivered to the channel's members.
    pub data: ChatPayload,
}

/// Reason a payload was dropped by the content policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContentViolation {
    /// Message exceeds [`MAX_MESSAGE_CHARS`].
    #[error("message is {0} UTF-16 units long")]
    TooLong(usize),
    /// Message is empty or whitespace only.
    #[error("message is blank")]
    Blank,
}

impl ChatPayload {
    /// Checks the message against the content policy.
    ///
    /// Length is measured in UTF-16 code units, so a character outside the
    /// Basic Multilingual Plane counts twice.
    ///
    /// # Errors
    ///
    /// Returns the [`ContentViolation`] that disqualifies the message.
    pub fn check_content(&self) -> Result<(), ContentViolation> {
        let len = self.message.encode_utf16().count();
        if len > MAX_MESSAGE_CHARS {
            return Err(ContentViolation::TooLong(len));
        }
        if self.message.chars().all(is_blank_char) {
            return Err(ContentViolation::Blank);
        }
        Ok(())
    }
}

/// Whitespace as ECMAScript's `\s` defines it: Unicode `White_Space`
/// without U+0085, plus the byte order mark.
fn is_blank_char(c: char) -> bool {
    match c {
        '\u{FEFF}' => true,
        '\u{85}' => false,
        other => other.is_whitespace(),
    }
}
