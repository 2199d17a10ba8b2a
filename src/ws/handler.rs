//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::domain::ChannelName;
use crate::error::RelayError;

/// `GET /{channel}` — Upgrade to a chat connection on `channel`.
///
/// Channel existence is checked after the upgrade by the session gate; the
/// path only needs to name a channel.
///
/// # Errors
///
/// Returns [`RelayError::InvalidRequest`] if the channel name is empty.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(channel): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, RelayError> {
    let channel = ChannelName::parse(&channel)?;
    let relay = Arc::clone(&state.relay);
    Ok(ws.on_upgrade(move |socket| run_connection(socket, relay, channel)))
}
