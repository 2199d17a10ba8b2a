//! Process-local channel membership with per-channel fine-grained locking.
//!
//! [`ChannelRegistry`] maps each channel to the ordered list of connections
//! that joined it on this process. Each entry is individually protected by a
//! [`tokio::sync::RwLock`], so joins, leaves and deliveries on different
//! channels never serialize behind each other. An entry is dropped when its
//! last member leaves.
//!
//! Lock order is always the outer map before a channel entry.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::{ChannelName, ChatPayload, ConnectionHandle, ConnectionId, Outbound};
use crate::error::RelayError;

type Members = Arc<RwLock<ChannelMembers>>;

#[derive(Debug, Default)]
struct ChannelMembers {
    handles: Vec<ConnectionHandle>,
    /// Set when the entry is pruned from the map; joins retry on a fresh one.
    retired: bool,
}

/// Outcome of delivering one payload to a channel's local members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Members the frame was queued for.
    pub delivered: usize,
    /// Members whose queue was full or already closed.
    pub failed: usize,
}

/// Channel name with its local member count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ChannelSummary {
    /// Channel name.
    #[schema(value_type = String)]
    pub channel: ChannelName,
    /// Connections currently joined on this process.
    pub members: usize,
}

/// Per-process registry of channel members.
///
/// Uses a `RwLock<HashMap<...>>` for the outer map and per-channel
/// `Arc<RwLock<...>>` for fine-grained locking.
///
/// # Invariants
///
/// - A connection id appears at most once in a channel's member list.
/// - Channels are created on first join and removed when their last member
///   leaves, so the map only holds channels with local members.
#[derive(Debug)]
pub struct ChannelRegistry {
    channels: RwLock<HashMap<ChannelName, Members>>,
}

impl ChannelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    async fn entry(&self, channel: &ChannelName) -> Option<Members> {
        self.channels.read().await.get(channel).cloned()
    }

    async fn entry_or_create(&self, channel: &ChannelName) -> Members {
        if let Some(members) = self.entry(channel).await {
            return members;
        }
        let mut map = self.channels.write().await;
        Arc::clone(map.entry(channel.clone()).or_default())
    }

    /// Adds a connection to a channel, creating the channel if absent.
    ///
    /// Returns `false` if the connection was already a member, in which case
    /// the registry is left unchanged.
    pub async fn join(&self, channel: &ChannelName, handle: ConnectionHandle) -> bool {
        loop {
            let members = self.entry_or_create(channel).await;
            let mut members = members.write().await;
            if members.retired {
                continue;
            }
            if members.handles.iter().any(|m| m.id() == handle.id()) {
                tracing::debug!(%channel, connection_id = %handle.id(), "duplicate join ignored");
                return false;
            }
            members.handles.push(handle);
            return true;
        }
    }

    /// Removes a connection from a channel, dropping the channel once it is
    /// empty.
    ///
    /// Returns `false` (and logs) when the channel or the connection is not
    /// found.
    pub async fn leave(&self, channel: &ChannelName, connection_id: ConnectionId) -> bool {
        let Some(entry) = self.entry(channel).await else {
            tracing::debug!(%channel, %connection_id, "leave on unknown channel");
            return false;
        };
        let now_empty = {
            let mut members = entry.write().await;
            let before = members.handles.len();
            members.handles.retain(|m| m.id() != connection_id);
            if members.handles.len() == before {
                tracing::debug!(%channel, %connection_id, "leave for non-member");
                return false;
            }
            members.handles.is_empty()
        };
        if now_empty {
            self.prune(channel, &entry).await;
        }
        true
    }

    /// Removes `entry` from the map if it is still the current entry for
    /// `channel` and still empty.
    async fn prune(&self, channel: &ChannelName, entry: &Members) {
        let mut map = self.channels.write().await;
        let Some(current) = map.get(channel) else {
            return;
        };
        if !Arc::ptr_eq(current, entry) {
            return;
        }
        let mut members = entry.write().await;
        if members.handles.is_empty() {
            members.retired = true;
            map.remove(channel);
            tracing::debug!(%channel, "channel emptied");
        }
    }

    /// Returns `true` if the connection is a member of the channel.
    pub async fn contains(&self, channel: &ChannelName, connection_id: ConnectionId) -> bool {
        match self.entry(channel).await {
            Some(members) => members
                .read()
                .await
                .handles
                .iter()
                .any(|m| m.id() == connection_id),
            None => false,
        }
    }

    /// Queues the payload for every member of the channel.
    ///
    /// A full or closed queue on one member is counted in the report and
    /// never stops delivery to the remaining members. An unknown channel
    /// yields an empty report.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Serialization`] if the payload cannot be encoded.
    pub async fn deliver_local(
        &self,
        channel: &ChannelName,
        payload: &ChatPayload,
    ) -> Result<DeliveryReport, RelayError> {
        let Some(members) = self.entry(channel).await else {
            return Ok(DeliveryReport::default());
        };
        let frame = serde_json::to_string(payload)?;

        let mut report = DeliveryReport::default();
        for member in members.read().await.handles.iter() {
            match member.send(Outbound::Text(frame.clone())) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    tracing::debug!(
                        %channel,
                        connection_id = %member.id(),
                        error = %err,
                        "local delivery failed"
                    );
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Returns the number of local members of a channel.
    pub async fn member_count(&self, channel: &ChannelName) -> usize {
        match self.entry(channel).await {
            Some(members) => members.read().await.handles.len(),
            None => 0,
        }
    }

    /// Returns every channel with local members and its member count, sorted
    /// by name.
    pub async fn channels(&self) -> Vec<ChannelSummary> {
        let map = self.channels.read().await;
        let mut summaries = Vec::with_capacity(map.len());
        for (channel, members) in map.iter() {
            summaries.push(ChannelSummary {
                channel: channel.clone(),
                members: members.read().await.handles.len(),
            });
        }
        summaries.sort_by(|a, b| a.channel.cmp(&b.channel));
        summaries
    }

    /// Returns the number of channels with local members.
    pub async fn len(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Returns `true` if no channel has local members.
    pub async fn is_empty(&self) -> bool {
        self.channels.read().await.is_empty()
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ConnectionMailbox, Viewer};

    fn channel(name: &str) -> ChannelName {
        let Ok(channel) = ChannelName::parse(name) else {
            panic!("valid channel");
        };
        channel
    }

    fn connection() -> (ConnectionHandle, ConnectionMailbox) {
        ConnectionHandle::new(8)
    }

    fn payload(message: &str) -> ChatPayload {
        ChatPayload {
            viewer: Some(Viewer::Guest),
            badges: Vec::new(),
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn join_creates_channel() {
        let registry = ChannelRegistry::new();
        assert!(registry.is_empty().await);

        let (conn, _mb) = connection();
        let id = conn.id();
        assert!(registry.join(&channel("room1"), conn).await);

        assert_eq!(registry.len().await, 1);
        assert!(registry.contains(&channel("room1"), id).await);
        assert!(!registry.contains(&channel("room2"), id).await);
    }

    #[tokio::test]
    async fn duplicate_join_is_ignored() {
        let registry = ChannelRegistry::new();
        let (conn, mut mb) = connection();

        assert!(registry.join(&channel("room1"), conn.clone()).await);
        assert!(!registry.join(&channel("room1"), conn).await);
        assert_eq!(registry.member_count(&channel("room1")).await, 1);

        let Ok(report) = registry.deliver_local(&channel("room1"), &payload("hi")).await else {
            panic!("delivery failed");
        };
        assert_eq!(report.delivered, 1);
        assert!(mb.frames.try_recv().is_ok());
        assert!(mb.frames.try_recv().is_err());
    }

    #[tokio::test]
    async fn leave_removes_member() {
        let registry = ChannelRegistry::new();
        let (conn, _mb) = connection();
        let id = conn.id();
        registry.join(&channel("room1"), conn).await;

        assert!(registry.leave(&channel("room1"), id).await);
        assert!(!registry.contains(&channel("room1"), id).await);
        assert_eq!(registry.member_count(&channel("room1")).await, 0);
    }

    #[tokio::test]
    async fn empty_channel_is_dropped() {
        let registry = ChannelRegistry::new();
        let (a, _a_mb) = connection();
        let (b, _b_mb) = connection();
        let (a_id, b_id) = (a.id(), b.id());
        registry.join(&channel("room1"), a).await;
        registry.join(&channel("room1"), b).await;

        registry.leave(&channel("room1"), a_id).await;
        assert_eq!(registry.len().await, 1);

        registry.leave(&channel("room1"), b_id).await;
        assert!(registry.is_empty().await);
        assert!(registry.channels().await.is_empty());
    }

    #[tokio::test]
    async fn rejoin_after_drop_recreates_channel() {
        let registry = ChannelRegistry::new();
        let (a, _a_mb) = connection();
        let a_id = a.id();
        registry.join(&channel("room1"), a).await;
        registry.leave(&channel("room1"), a_id).await;

        let (b, mut b_mb) = connection();
        assert!(registry.join(&channel("room1"), b).await);
        let Ok(report) = registry.deliver_local(&channel("room1"), &payload("hi")).await else {
            panic!("delivery failed");
        };
        assert_eq!(report.delivered, 1);
        assert!(b_mb.frames.try_recv().is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_churn_never_loses_a_join() {
        let registry = Arc::new(ChannelRegistry::new());
        let mut tasks = Vec::new();
        let mut keep = Vec::new();
        for i in 0..64 {
            let (conn, mb) = connection();
            let registry = Arc::clone(&registry);
            if i % 2 == 0 {
                keep.push((conn.id(), mb));
                tasks.push(tokio::spawn(async move {
                    registry.join(&channel("room1"), conn).await;
                }));
            } else {
                tasks.push(tokio::spawn(async move {
                    let id = conn.id();
                    registry.join(&channel("room1"), conn).await;
                    registry.leave(&channel("room1"), id).await;
                    drop(mb);
                }));
            }
        }
        for task in tasks {
            assert!(task.await.is_ok());
        }

        assert_eq!(registry.member_count(&channel("room1")).await, keep.len());
        for (id, _mb) in &keep {
            assert!(registry.contains(&channel("room1"), *id).await);
        }
    }

    #[tokio::test]
    async fn leave_unknown_is_noop() {
        let registry = ChannelRegistry::new();
        let (conn, _mb) = connection();
        assert!(!registry.leave(&channel("nowhere"), conn.id()).await);

        registry.join(&channel("room1"), conn).await;
        assert!(!registry.leave(&channel("room1"), ConnectionId::new()).await);
        assert_eq!(registry.member_count(&channel("room1")).await, 1);
    }

    #[tokio::test]
    async fn deliver_to_unknown_channel_is_empty() {
        let registry = ChannelRegistry::new();
        let report = registry.deliver_local(&channel("ghost"), &payload("hi")).await;
        let Ok(report) = report else {
            panic!("delivery should not fail");
        };
        assert_eq!(report, DeliveryReport::default());
    }

    #[tokio::test]
    async fn one_failed_member_does_not_block_others() {
        let registry = ChannelRegistry::new();
        let room = channel("room1");

        let (first, mut first_mb) = connection();
        let (dead, dead_mb) = connection();
        let (last, mut last_mb) = connection();
        drop(dead_mb);

        registry.join(&room, first).await;
        registry.join(&room, dead).await;
        registry.join(&room, last).await;

        let Ok(report) = registry.deliver_local(&room, &payload("hello")).await else {
            panic!("delivery failed");
        };
        assert_eq!(report, DeliveryReport { delivered: 2, failed: 1 });

        let Ok(Outbound::Text(frame)) = first_mb.frames.try_recv() else {
            panic!("first member missed the frame");
        };
        assert!(frame.contains("hello"));
        assert!(last_mb.frames.try_recv().is_ok());
    }

    #[tokio::test]
    async fn delivery_is_scoped_to_channel() {
        let registry = ChannelRegistry::new();
        let (a, mut a_mb) = connection();
        let (b, mut b_mb) = connection();
        registry.join(&channel("room1"), a).await;
        registry.join(&channel("room2"), b).await;

        let _ = registry.deliver_local(&channel("room1"), &payload("hi")).await;
        assert!(a_mb.frames.try_recv().is_ok());
        assert!(b_mb.frames.try_recv().is_err());
    }

    #[tokio::test]
    async fn channels_lists_counts_sorted() {
        let registry = ChannelRegistry::new();
        let (a, _a_mb) = connection();
        let (b, _b_mb) = connection();
        let (c, _c_mb) = connection();
        registry.join(&channel("zeta"), a).await;
        registry.join(&channel("alpha"), b).await;
        registry.join(&channel("alpha"), c).await;

        let list = registry.channels().await;
        assert_eq!(
            list,
            vec![
                ChannelSummary { channel: channel("alpha"), members: 2 },
                ChannelSummary { channel: channel("zeta"), members: 1 },
            ]
        );
    }
}
