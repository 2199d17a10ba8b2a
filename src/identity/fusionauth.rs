//! FusionAuth identity provider over its REST API.
//!
//! - `GET /api/user` with `Authorization: Bearer <jwt>` resolves a session.
//! - `GET /api/user/{id}` with the API key checks that a user exists.
//! - `GET /api/group/{id}` with the API key resolves a group name.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use super::{GroupMembership, IdentityProvider, ResolvedUser};
use crate::config::FusionAuthConfig;
use crate::domain::ViewerIdentity;
use crate::error::RelayError;

#[derive(Debug, Deserialize)]
struct UserResponse {
    user: FusionAuthUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FusionAuthUser {
    id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    memberships: Vec<FusionAuthMembership>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FusionAuthMembership {
    group_id: String,
}

#[derive(Debug, Deserialize)]
struct GroupResponse {
    group: FusionAuthGroup,
}

#[derive(Debug, Deserialize)]
struct FusionAuthGroup {
    name: String,
}

impl From<FusionAuthUser> for ResolvedUser {
    fn from(user: FusionAuthUser) -> Self {
        Self {
            identity: ViewerIdentity {
                id: user.id,
                username: user.username,
            },
            memberships: user
                .memberships
                .into_iter()
                .map(|m| GroupMembership {
                    group_id: m.group_id,
                })
                .collect(),
        }
    }
}

/// HTTP client for a FusionAuth instance.
#[derive(Debug, Clone)]
pub struct FusionAuthClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

fn upstream(err: reqwest::Error) -> RelayError {
    RelayError::IdentityProvider(err.to_string())
}

impl FusionAuthClient {
    /// Creates a client for the configured instance.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRequest`] if the base URL is not an
    /// absolute URL, and [`RelayError::IdentityProvider`] if the HTTP client
    /// cannot be built.
    pub fn new(config: &FusionAuthConfig, timeout: Duration) -> Result<Self, RelayError> {
        let base_url = Url::parse(&config.base_url).map_err(|err| {
            RelayError::InvalidRequest(format!("invalid FusionAuth URL {}: {err}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(RelayError::InvalidRequest(format!(
                "FusionAuth URL cannot be a base: {}",
                config.base_url
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(upstream)?;
        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    /// Appends path segments (percent-encoded) to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl IdentityProvider for FusionAuthClient {
    async fn resolve_token(&self, token: &str) -> Result<ResolvedUser, RelayError> {
        let response = self
            .http
            .get(self.endpoint(&["api", "user"]))
            .bearer_auth(token)
            .send()
            .await
            .map_err(upstream)?;

        match response.status() {
            StatusCode::OK => {
                let body: UserResponse = response.json().await.map_err(upstream)?;
                Ok(body.user.into())
            }
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Err(RelayError::Unauthenticated(
                "session token rejected".to_string(),
            )),
            status => Err(RelayError::IdentityProvider(format!(
                "unexpected status {status} resolving session"
            ))),
        }
    }

    async fn group_name(&self, group_id: &str) -> Result<String, RelayError> {
        let response = self
            .http
            .get(self.endpoint(&["api", "group", group_id]))
            .header(AUTHORIZATION, &self.api_key)
            .send()
            .await
            .map_err(upstream)?;

        match response.status() {
            StatusCode::OK => {
                let body: GroupResponse = response.json().await.map_err(upstream)?;
                Ok(body.group.name)
            }
            StatusCode::NOT_FOUND => Err(RelayError::IdentityNotFound(format!("group {group_id}"))),
            status => Err(RelayError::IdentityProvider(format!(
                "unexpected status {status} resolving group"
            ))),
        }
    }

    async fn user_exists(&self, user_id: &str) -> Result<bool, RelayError> {
        let response = self
            .http
            .get(self.endpoint(&["api", "user", user_id]))
            .header(AUTHORIZATION, &self.api_key)
            .send()
            .await
            .map_err(upstream)?;

        match response.status() {
            StatusCode::OK => Ok(true),
            // FusionAuth answers 400 for ids that are not UUIDs.
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Ok(false),
            status => Err(RelayError::IdentityProvider(format!(
                "unexpected status {status} looking up user"
            ))),
        }
    }
}
