//! Channel introspection: local membership and presence.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::domain::{ChannelName, ChannelSummary, Viewer};
use crate::error::{ErrorResponse, RelayError};

/// Channels joined on this process.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChannelListResponse {
    /// One entry per channel, sorted by name.
    pub channels: Vec<ChannelSummary>,
}

/// Viewers currently recorded in a channel's presence set.
#[derive(Debug, Serialize, ToSchema)]
pub struct ViewerListResponse {
    /// Channel name.
    pub channel: String,
    /// Local member count on this process.
    pub local_members: usize,
    /// Presence set members across all processes.
    #[schema(value_type = Vec<Object>)]
    pub viewers: Vec<Viewer>,
}

/// `GET /channels` — List channels joined on this process.
#[utoipa::path(
    get,
    path = "/api/v1/channels",
    tag = "Channels",
    summary = "List channels",
    description = "Returns every channel joined on this process with its current local member count.",
    responses(
        (status = 200, description = "Channel list", body = ChannelListResponse),
    )
)]
pub async fn list_channels(State(state): State<AppState>) -> Json<ChannelListResponse> {
    Json(ChannelListResponse {
        channels: state.relay.registry().channels().await,
    })
}

/// `GET /channels/{channel}/viewers` — Presence set of a channel.
///
/// Entries that do not decode as a viewer are skipped.
///
/// # Errors
///
/// Returns [`RelayError::InvalidRequest`] for an empty channel name and
/// [`RelayError::Presence`] if the presence store cannot be read.
#[utoipa::path(
    get,
    path = "/api/v1/channels/{channel}/viewers",
    tag = "Channels",
    summary = "List channel viewers",
    description = "Returns the identified viewers recorded for a channel across all relay processes.",
    params(("channel" = String, Path, description = "Channel name")),
    responses(
        (status = 200, description = "Viewer list", body = ViewerListResponse),
        (status = 400, description = "Invalid channel", body = ErrorResponse),
        (status = 500, description = "Presence store unavailable", body = ErrorResponse),
    )
)]
pub async fn channel_viewers(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Json<ViewerListResponse>, RelayError> {
    let channel = ChannelName::parse(&channel)?;
    let members = state.relay.presence().viewers(&channel).await?;

    let viewers = members
        .iter()
        .filter_map(|member| match serde_json::from_str::<Viewer>(member) {
            Ok(viewer) => Some(viewer),
            Err(err) => {
                tracing::debug!(channel = %channel, error = %err, "skipping undecodable presence member");
                None
            }
        })
        .collect();

    Ok(Json(ViewerListResponse {
        channel: channel.to_string(),
        local_members: state.relay.registry().member_count(&channel).await,
        viewers,
    }))
}

/// Channel routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/channels", get(list_channels))
        .route("/channels/{channel}/viewers", get(channel_viewers))
}
