//! Liveness monitor: two-tick dead-peer detection over WebSocket pings.
//!
//! Each tick, a connection that has not answered since the previous tick is
//! terminated; every other connection is marked unanswered and pinged. A pong
//! marks it alive again. A peer that never answers is dropped within two
//! intervals.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::domain::{ConnectionTracker, DeliveryError, Outbound};

/// Counts from one liveness tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LivenessSweep {
    /// Connections sent a ping.
    pub pinged: usize,
    /// Connections told to terminate.
    pub terminated: usize,
}

/// Shortest ping interval a monitor runs with.
pub const MIN_LIVENESS_INTERVAL: Duration = Duration::from_secs(1);

/// Periodic pinger over every tracked connection.
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    connections: Arc<ConnectionTracker>,
    interval: Duration,
}

impl LivenessMonitor {
    /// Creates a monitor pinging every `interval`, raised to
    /// [`MIN_LIVENESS_INTERVAL`] if shorter.
    #[must_use]
    pub fn new(connections: Arc<ConnectionTracker>, interval: Duration) -> Self {
        if interval < MIN_LIVENESS_INTERVAL {
            tracing::warn!(
                requested_ms = interval.as_millis(),
                "liveness interval too short, using {}s",
                MIN_LIVENESS_INTERVAL.as_secs()
            );
        }
        Self {
            connections,
            interval: interval.max(MIN_LIVENESS_INTERVAL),
        }
    }

    /// Returns the effective ping interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one ping round.
    pub async fn tick(&self) -> LivenessSweep {
        let mut sweep = LivenessSweep::default();
        for handle in self.connections.snapshot().await {
            if !handle.take_alive() {
                tracing::debug!(connection_id = %handle.id(), "terminating unresponsive connection");
                handle.terminate();
                sweep.terminated += 1;
                continue;
            }
            match handle.send(Outbound::Ping) {
                Ok(()) => sweep.pinged += 1,
                // A clogged queue cannot carry the ping; the next tick evicts it.
                Err(DeliveryError::Full) => {}
                Err(DeliveryError::Closed) => {
                    self.connections.remove(handle.id()).await;
                }
            }
        }
        sweep
    }

    /// Spawns the ping loop. The first round runs one interval after start.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let sweep = self.tick().await;
                if sweep.terminated > 0 {
                    tracing::info!(
                        pinged = sweep.pinged,
                        terminated = sweep.terminated,
                        "liveness sweep evicted connections"
                    );
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ConnectionHandle;

    fn monitor() -> (LivenessMonitor, Arc<ConnectionTracker>) {
        let tracker = Arc::new(ConnectionTracker::new());
        let monitor = LivenessMonitor::new(Arc::clone(&tracker), Duration::from_secs(5));
        (monitor, tracker)
    }

    #[tokio::test]
    async fn first_tick_pings_fresh_connection() {
        let (monitor, tracker) = monitor();
        let (handle, mut mailbox) = ConnectionHandle::new(4);
        tracker.insert(handle).await;

        let sweep = monitor.tick().await;
        assert_eq!(sweep, LivenessSweep { pinged: 1, terminated: 0 });
        assert_eq!(mailbox.frames.try_recv().ok(), Some(Outbound::Ping));
    }

    #[tokio::test]
    async fn silent_connection_is_terminated_on_second_tick() {
        let (monitor, tracker) = monitor();
        let (handle, mailbox) = ConnectionHandle::new(4);
        tracker.insert(handle).await;

        monitor.tick().await;
        let sweep = monitor.tick().await;
        assert_eq!(sweep.terminated, 1);

        tokio::time::timeout(Duration::from_secs(1), mailbox.terminate.notified())
            .await
            .unwrap_or_else(|_| panic!("terminate signal expected"));
    }

    #[tokio::test]
    async fn answering_connection_survives() {
        let (monitor, tracker) = monitor();
        let (handle, _mailbox) = ConnectionHandle::new(4);
        tracker.insert(handle.clone()).await;

        for _ in 0..5 {
            let sweep = monitor.tick().await;
            assert_eq!(sweep.terminated, 0);
            handle.mark_alive();
        }
    }

    #[tokio::test]
    async fn closed_connection_is_forgotten() {
        let (monitor, tracker) = monitor();
        let (handle, mailbox) = ConnectionHandle::new(4);
        tracker.insert(handle).await;
        drop(mailbox);

        monitor.tick().await;
        assert!(tracker.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_monitor_evicts_within_two_intervals() {
        let (monitor, tracker) = monitor();
        let (handle, mailbox) = ConnectionHandle::new(4);
        tracker.insert(handle).await;

        let task = monitor.spawn();
        let evicted = tokio::time::timeout(Duration::from_secs(11), mailbox.terminate.notified()).await;
        assert!(evicted.is_ok());
        task.abort();
    }

    #[test]
    fn zero_interval_is_raised_to_minimum() {
        let monitor = LivenessMonitor::new(Arc::new(ConnectionTracker::new()), Duration::ZERO);
        assert_eq!(monitor.interval(), MIN_LIVENESS_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_monitor_keeps_running() {
        let tracker = Arc::new(ConnectionTracker::new());
        let monitor = LivenessMonitor::new(Arc::clone(&tracker), Duration::ZERO);
        let (handle, mailbox) = ConnectionHandle::new(4);
        tracker.insert(handle).await;

        let task = monitor.spawn();
        let evicted = tokio::time::timeout(Duration::from_secs(3), mailbox.terminate.notified()).await;
        assert!(evicted.is_ok());
        assert!(!task.is_finished());
        task.abort();
    }
}
