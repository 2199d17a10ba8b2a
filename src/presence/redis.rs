//! Redis-backed presence store.
//!
//! One Redis set per channel, keyed `stream:{channel}:viewers`, holding the
//! JSON serialization of each viewer.

use std::fmt;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::PresenceStore;
use crate::domain::ChannelName;
use crate::error::RelayError;

/// Presence sets stored in Redis.
#[derive(Clone)]
pub struct RedisPresence {
    conn: ConnectionManager,
}

impl RedisPresence {
    /// Creates a store on top of a shared connection manager.
    #[must_use]
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

impl fmt::Debug for RedisPresence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisPresence").finish_non_exhaustive()
    }
}

fn presence_error(err: redis::RedisError) -> RelayError {
    RelayError::Presence(err.to_string())
}

#[async_trait]
impl PresenceStore for RedisPresence {
    async fn add_viewer(&self, channel: &ChannelName, member: &str) -> Result<(), RelayError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .sadd(channel.viewers_key(), member)
            .await
            .map_err(presence_error)?;
        Ok(())
    }

    async fn remove_viewer(&self, channel: &ChannelName, member: &str) -> Result<(), RelayError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .srem(channel.viewers_key(), member)
            .await
            .map_err(presence_error)?;
        Ok(())
    }

    async fn viewers(&self, channel: &ChannelName) -> Result<Vec<String>, RelayError> {
        let mut conn = self.conn.clone();
        let mut members: Vec<String> = conn
            .smembers(channel.viewers_key())
            .await
            .map_err(presence_error)?;
        members.sort();
        Ok(members)
    }
}
