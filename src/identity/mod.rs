//! Identity provider seam: session tokens, groups, and channel validation.
//!
//! The relay never authenticates anyone itself. It asks an
//! [`IdentityProvider`] who a session token belongs to and which groups
//! that user is in, and asks a [`ChannelDirectory`] whether a channel named
//! in a request path exists.

pub mod directory;
pub mod fusionauth;
pub mod memory;

use std::fmt;

use async_trait::async_trait;

use crate::domain::{ChannelName, ViewerIdentity};
use crate::error::RelayError;

pub use self::directory::{IdentityChannelDirectory, OpenDirectory};
pub use self::fusionauth::FusionAuthClient;
pub use self::memory::InMemoryIdentityProvider;

/// Membership of a user in an identity-provider group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMembership {
    /// Group id, resolved to a display name on demand.
    pub group_id: String,
}

/// User behind an accepted session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUser {
    /// Identity attached to the user's chat messages.
    pub identity: ViewerIdentity,
    /// Groups the user belongs to.
    pub memberships: Vec<GroupMembership>,
}

/// Async lookups against the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync + fmt::Debug {
    /// Resolves a session token to its user.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Unauthenticated`] for an invalid or expired
    /// token and [`RelayError::IdentityProvider`] if the provider fails.
    async fn resolve_token(&self, token: &str) -> Result<ResolvedUser, RelayError>;

    /// Resolves a group id to the group's display name.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::IdentityNotFound`] for an unknown group and
    /// [`RelayError::IdentityProvider`] if the provider fails.
    async fn group_name(&self, group_id: &str) -> Result<String, RelayError>;

    /// Returns whether a user with this id exists.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::IdentityProvider`] if the provider fails.
    async fn user_exists(&self, user_id: &str) -> Result<bool, RelayError>;
}

/// Decides whether a channel named in a request path may be used.
#[async_trait]
pub trait ChannelDirectory: Send + Sync + fmt::Debug {
    /// Returns whether the channel exists.
    ///
    /// # Errors
    ///
    /// Returns a [`RelayError`] if the backing lookup fails.
    async fn channel_exists(&self, channel: &ChannelName) -> Result<bool, RelayError>;
}
