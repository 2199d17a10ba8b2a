//! In-memory presence store for single-process relays and tests.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::PresenceStore;
use crate::domain::ChannelName;
use crate::error::RelayError;

/// Presence sets kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryPresence {
    sets: RwLock<HashMap<ChannelName, BTreeSet<String>>>,
}

impl InMemoryPresence {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the channel's members in sorted order.
    pub async fn snapshot(&self, channel: &ChannelName) -> Vec<String> {
        self.sets
            .read()
            .await
            .get(channel)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PresenceStore for InMemoryPresence {
    async fn add_viewer(&self, channel: &ChannelName, member: &str) -> Result<(), RelayError> {
        self.sets
            .write()
            .await
            .entry(channel.clone())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn remove_viewer(&self, channel: &ChannelName, member: &str) -> Result<(), RelayError> {
        if let Some(set) = self.sets.write().await.get_mut(channel) {
            set.remove(member);
        }
        Ok(())
    }

    async fn viewers(&self, channel: &ChannelName) -> Result<Vec<String>, RelayError> {
        Ok(self.snapshot(channel).await)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn channel(name: &str) -> ChannelName {
        let Ok(channel) = ChannelName::parse(name) else {
            panic!("valid channel");
        };
        channel
    }

    #[tokio::test]
    async fn add_is_idempotent() {
        let store = InMemoryPresence::new();
        let _ = store.add_viewer(&channel("room1"), "a").await;
        let _ = store.add_viewer(&channel("room1"), "a").await;
        assert_eq!(store.snapshot(&channel("room1")).await, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn remove_missing_member_is_ok() {
        let store = InMemoryPresence::new();
        assert!(store.remove_viewer(&channel("room1"), "a").await.is_ok());
    }

    #[tokio::test]
    async fn sets_are_per_channel() {
        let store = InMemoryPresence::new();
        let _ = store.add_viewer(&channel("room1"), "a").await;
        let _ = store.add_viewer(&channel("room2"), "b").await;

        let Ok(viewers) = store.viewers(&channel("room2")).await else {
            panic!("in-memory reads never fail");
        };
        assert_eq!(viewers, vec!["b".to_string()]);
    }
}
