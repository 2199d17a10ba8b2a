//! In-memory identity provider for local development and tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use super::{IdentityProvider, ResolvedUser};
use crate::error::RelayError;

/// Fixed set of sessions and groups, configured up front.
///
/// An empty provider rejects every token and knows no users, which is what
/// a relay without an identity provider configured runs with.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityProvider {
    sessions: HashMap<String, ResolvedUser>,
    groups: HashMap<String, String>,
    latency: Option<Duration>,
}

impl InMemoryIdentityProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session token for a user. The user also becomes known to
    /// [`IdentityProvider::user_exists`].
    #[must_use]
    pub fn with_session(mut self, token: &str, user: ResolvedUser) -> Self {
        self.sessions.insert(token.to_string(), user);
        self
    }

    /// Registers a group's display name.
    #[must_use]
    pub fn with_group(mut self, group_id: &str, name: &str) -> Self {
        self.groups.insert(group_id.to_string(), name.to_string());
        self
    }

    /// Delays every lookup, simulating a remote round trip.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn resolve_token(&self, token: &str) -> Result<ResolvedUser, RelayError> {
        self.simulate_latency().await;
        self.sessions
            .get(token)
            .cloned()
            .ok_or_else(|| RelayError::Unauthenticated("unknown session token".to_string()))
    }

    async fn group_name(&self, group_id: &str) -> Result<String, RelayError> {
        self.simulate_latency().await;
        self.groups
            .get(group_id)
            .cloned()
            .ok_or_else(|| RelayError::IdentityNotFound(format!("group {group_id}")))
    }

    async fn user_exists(&self, user_id: &str) -> Result<bool, RelayError> {
        self.simulate_latency().await;
        Ok(self
            .sessions
            .values()
            .any(|user| user.identity.id == user_id))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ViewerIdentity;
    use crate::identity::GroupMembership;

    fn provider() -> InMemoryIdentityProvider {
        InMemoryIdentityProvider::new()
            .with_session(
                "tok-bob",
                ResolvedUser {
                    identity: ViewerIdentity {
                        id: "u-bob".to_string(),
                        username: Some("bob".to_string()),
                    },
                    memberships: vec![GroupMembership {
                        group_id: "g-1".to_string(),
                    }],
                },
            )
            .with_group("g-1", "Founder")
    }

    #[tokio::test]
    async fn known_token_resolves() {
        let Ok(user) = provider().resolve_token("tok-bob").await else {
            panic!("token should resolve");
        };
        assert_eq!(user.identity.id, "u-bob");
        assert_eq!(user.memberships.len(), 1);
    }

    #[tokio::test]
    async fn unknown_token_is_unauthenticated() {
        let result = provider().resolve_token("nope").await;
        assert!(matches!(result, Err(RelayError::Unauthenticated(_))));
    }

    #[tokio::test]
    async fn groups_resolve_by_id() {
        let p = provider();
        assert!(matches!(p.group_name("g-1").await.as_deref(), Ok("Founder")));
        assert!(matches!(
            p.group_name("g-2").await,
            Err(RelayError::IdentityNotFound(_))
        ));
    }

    #[tokio::test]
    async fn user_exists_follows_sessions() {
        let p = provider();
        assert!(matches!(p.user_exists("u-bob").await, Ok(true)));
        assert!(matches!(p.user_exists("u-eve").await, Ok(false)));
    }
}
