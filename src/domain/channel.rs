//! Type-safe channel name.
//!
//! [`ChannelName`] wraps the path component of a WebSocket request so that
//! channel names cannot be confused with tokens, viewer ids or topic names.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Name of a chat channel (a room).
///
/// Taken verbatim from the request path, minus the leading separator. Never
/// persisted: it exists as a key in [`super::ChannelRegistry`] and as the
/// suffix of the presence-store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelName(String);

impl ChannelName {
    /// Builds a channel name from a request path or path segment.
    ///
    /// A single leading `/` is stripped.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRequest`] if the remaining name is empty.
    pub fn parse(raw: &str) -> Result<Self, RelayError> {
        let name = raw.strip_prefix('/').unwrap_or(raw);
        if name.is_empty() {
            return Err(RelayError::InvalidRequest(
                "channel name must not be empty".to_string(),
            ));
        }
        Ok(Self(name.to_string()))
    }

    /// Returns the channel name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the presence-store set holding this channel's viewers.
    #[must_use]
    pub fn viewers_key(&self) -> String {
        format!("stream:{}:viewers", self.0)
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
