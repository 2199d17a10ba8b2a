//! Presence store: the best-effort "current viewers" set per channel.
//!
//! Presence is bookkeeping for observers, never a source of truth for
//! delivery. Each connection queues its writes on a [`PresenceWriter`]; a
//! broken store must not affect the channel registry or any connection.

pub mod memory;
pub mod redis;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::{ChannelName, Viewer};
use crate::error::RelayError;

pub use self::memory::InMemoryPresence;
pub use self::redis::RedisPresence;

/// Per-channel set of serialized viewers.
#[async_trait]
pub trait PresenceStore: Send + Sync + fmt::Debug {
    /// Adds a serialized viewer to the channel's set.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Presence`] if the store rejects the write.
    async fn add_viewer(&self, channel: &ChannelName, member: &str) -> Result<(), RelayError>;

    /// Removes a serialized viewer from the channel's set.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Presence`] if the store rejects the write.
    async fn remove_viewer(&self, channel: &ChannelName, member: &str) -> Result<(), RelayError>;

    /// Lists the serialized viewers of a channel.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Presence`] if the store cannot be read.
    async fn viewers(&self, channel: &ChannelName) -> Result<Vec<String>, RelayError>;
}

/// Background writer mirroring one connection's viewer into the store.
///
/// Writes queued through one writer are applied strictly in order, so a
/// removal can never overtake the insertion it undoes. Failures are logged
/// and swallowed. Dropping the writer lets the queued writes drain, then
/// the task exits.
#[derive(Debug)]
pub struct PresenceWriter {
    channel: ChannelName,
    writes: mpsc::UnboundedSender<PresenceWrite>,
    task: JoinHandle<()>,
}

#[derive(Debug)]
enum PresenceWrite {
    Add(String),
    Remove(String),
}

impl PresenceWriter {
    /// Spawns the writer task for `channel`.
    #[must_use]
    pub fn spawn(store: Arc<dyn PresenceStore>, channel: ChannelName) -> Self {
        let (writes, mut rx) = mpsc::unbounded_channel();
        let task_channel = channel.clone();
        let task = tokio::spawn(async move {
            while let Some(write) = rx.recv().await {
                let result = match &write {
                    PresenceWrite::Add(member) => store.add_viewer(&task_channel, member).await,
                    PresenceWrite::Remove(member) => {
                        store.remove_viewer(&task_channel, member).await
                    }
                };
                if let Err(err) = result {
                    tracing::warn!(channel = %task_channel, ?write, error = %err, "presence update failed");
                }
            }
        });
        Self {
            channel,
            writes,
            task,
        }
    }

    /// Queues the viewer's insertion.
    pub fn add(&self, viewer: &Viewer) {
        self.queue(viewer, PresenceWrite::Add);
    }

    /// Queues the viewer's removal, using the insertion representation.
    pub fn remove(&self, viewer: &Viewer) {
        self.queue(viewer, PresenceWrite::Remove);
    }

    /// Stops accepting writes and returns the task, which finishes once the
    /// queue is drained.
    #[must_use]
    pub fn finish(self) -> JoinHandle<()> {
        self.task
    }

    fn queue(&self, viewer: &Viewer, write: fn(String) -> PresenceWrite) {
        let member = match viewer.presence_member() {
            Ok(member) => member,
            Err(err) => {
                tracing::warn!(channel = %self.channel, error = %err, "cannot serialize viewer for presence");
                return;
            }
        };
        if self.writes.send(write(member)).is_err() {
            tracing::warn!(channel = %self.channel, "presence writer stopped");
        }
    }
}
