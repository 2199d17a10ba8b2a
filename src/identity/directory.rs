//! Channel directories.

use std::sync::Arc;

use async_trait::async_trait;

use super::{ChannelDirectory, IdentityProvider};
use crate::domain::ChannelName;
use crate::error::RelayError;

/// Accepts every channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenDirectory;

#[async_trait]
impl ChannelDirectory for OpenDirectory {
    async fn channel_exists(&self, _channel: &ChannelName) -> Result<bool, RelayError> {
        Ok(true)
    }
}

/// Channels are owned by users: a channel exists when a user with the
/// channel's name as id exists in the identity provider.
#[derive(Debug, Clone)]
pub struct IdentityChannelDirectory {
    provider: Arc<dyn IdentityProvider>,
}

impl IdentityChannelDirectory {
    /// Creates a directory backed by the given identity provider.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ChannelDirectory for IdentityChannelDirectory {
    async fn channel_exists(&self, channel: &ChannelName) -> Result<bool, RelayError> {
        self.provider.user_exists(channel.as_str()).await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ViewerIdentity;
    use crate::identity::{InMemoryIdentityProvider, ResolvedUser};

    fn channel(name: &str) -> ChannelName {
        let Ok(channel) = ChannelName::parse(name) else {
            panic!("valid channel");
        };
        channel
    }

    #[tokio::test]
    async fn open_directory_accepts_anything() {
        let Ok(exists) = OpenDirectory.channel_exists(&channel("whatever")).await else {
            panic!("open directory never fails");
        };
        assert!(exists);
    }

    #[tokio::test]
    async fn identity_directory_follows_user_records() {
        let provider = InMemoryIdentityProvider::new().with_session(
            "tok",
            ResolvedUser {
                identity: ViewerIdentity {
                    id: "streamer-1".to_string(),
                    username: Some("streamer".to_string()),
                },
                memberships: Vec::new(),
            },
        );
        let directory = IdentityChannelDirectory::new(Arc::new(provider));

        assert!(matches!(
            directory.channel_exists(&channel("streamer-1")).await,
            Ok(true)
        ));
        assert!(matches!(
            directory.channel_exists(&channel("nobody")).await,
            Ok(false)
        ));
    }
}
