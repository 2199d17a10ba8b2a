//! WebSocket connection loop.
//!
//! Owns the socket for one client. Multiplexes four sources: client
//! frames, queued outbound frames, gate results and the termination
//! signal. Every exit path runs [`ConnectionSession::close`].

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use super::session::{ConnectionSession, ProtocolViolation, gate_channel};
use crate::domain::{ChannelName, ConnectionHandle, Outbound};
use crate::service::RelayService;

/// Runs the read/write loop for a single WebSocket connection.
pub async fn run_connection(socket: WebSocket, relay: Arc<RelayService>, channel: ChannelName) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (handle, mut mailbox) = ConnectionHandle::new(relay.outbound_buffer());
    let (gate_tx, mut gate_rx) = gate_channel();
    let liveness = handle.clone();

    let mut session = ConnectionSession::new(relay, handle, channel, gate_tx);
    session.open().await;

    let violation = loop {
        tokio::select! {
            () = mailbox.terminate.notified() => {
                tracing::debug!(connection_id = %session.id(), "terminated by liveness monitor");
                break None;
            }
            // Incoming frame from client
            msg = ws_rx.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text.to_string(),
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => text,
                        Err(_) => break Some(ProtocolViolation::NonUtf8Frame),
                    },
                    Some(Ok(Message::Pong(_))) => {
                        liveness.mark_alive();
                        continue;
                    }
                    Some(Ok(Message::Ping(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break None,
                    Some(Err(err)) => {
                        tracing::debug!(connection_id = %session.id(), error = %err, "socket error");
                        break None;
                    }
                };
                if let Err(violation) = session.handle_text(&text).await {
                    break Some(violation);
                }
            }
            // Frame queued by the registry or the liveness monitor
            frame = mailbox.frames.recv() => {
                let message = match frame {
                    Some(Outbound::Text(json)) => Message::text(json),
                    Some(Outbound::Ping) => Message::Ping(Bytes::new()),
                    None => break None,
                };
                if ws_tx.send(message).await.is_err() {
                    break None;
                }
            }
            // Result of a background identity or channel lookup
            Some(event) = gate_rx.recv() => {
                if let Err(violation) = session.handle_gate(event) {
                    break Some(violation);
                }
            }
        }
    };

    if let Some(violation) = violation {
        tracing::info!(
            connection_id = %session.id(),
            channel = %session.channel(),
            reason = %violation,
            "terminating connection"
        );
    }
    session.close().await;
    // Dropping the socket halves ends the connection without a close
    // handshake.
    drop(ws_tx);
    drop(ws_rx);
}
