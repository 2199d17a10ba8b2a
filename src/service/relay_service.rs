//! Relay service: the per-process hub every connection session talks to.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::{FanoutRouter, LivenessMonitor, SessionGate};
use crate::bus::BroadcastBus;
use crate::domain::{ChannelRegistry, ConnectionTracker};
use crate::error::RelayError;
use crate::identity::{ChannelDirectory, IdentityProvider};
use crate::presence::PresenceStore;

/// Collaborators a relay process is assembled from.
#[derive(Debug, Clone)]
pub struct RelayParts {
    /// Cross-process broadcast bus.
    pub bus: Arc<dyn BroadcastBus>,
    /// Best-effort viewer bookkeeping.
    pub presence: Arc<dyn PresenceStore>,
    /// Session token and group lookups.
    pub identity: Arc<dyn IdentityProvider>,
    /// Channel validation on connect.
    pub channels: Arc<dyn ChannelDirectory>,
    /// Shared bus topic.
    pub topic: String,
    /// Per-connection outbound queue length.
    pub outbound_buffer: usize,
}

/// Process-local relay state and the components operating on it.
///
/// Owns the [`ChannelRegistry`] and [`ConnectionTracker`]; every other
/// component holds shared references to them.
#[derive(Debug)]
pub struct RelayService {
    registry: Arc<ChannelRegistry>,
    connections: Arc<ConnectionTracker>,
    router: FanoutRouter,
    gate: SessionGate,
    presence: Arc<dyn PresenceStore>,
    outbound_buffer: usize,
}

/// Background tasks of a running relay.
#[derive(Debug)]
pub struct RelayWorkers {
    fanout: JoinHandle<()>,
    liveness: JoinHandle<()>,
}

impl RelayWorkers {
    /// Stops the fan-out subscription and the liveness monitor.
    pub fn shutdown(self) {
        self.fanout.abort();
        self.liveness.abort();
    }
}

impl RelayService {
    /// Assembles a relay from its collaborators with an empty registry.
    #[must_use]
    pub fn new(parts: RelayParts) -> Self {
        let registry = Arc::new(ChannelRegistry::new());
        let router = FanoutRouter::new(Arc::clone(&registry), parts.bus, &parts.topic);
        Self {
            registry,
            connections: Arc::new(ConnectionTracker::new()),
            router,
            gate: SessionGate::new(parts.identity, parts.channels),
            presence: parts.presence,
            outbound_buffer: parts.outbound_buffer,
        }
    }

    /// Starts the fan-out subscription and the liveness monitor.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Bus`] if the bus subscription cannot be opened.
    pub async fn spawn_workers(
        &self,
        bus_reconnect: Duration,
        liveness_interval: Duration,
    ) -> Result<RelayWorkers, RelayError> {
        let fanout = self.router.clone().start(bus_reconnect).await?;
        let liveness =
            LivenessMonitor::new(Arc::clone(&self.connections), liveness_interval).spawn();
        Ok(RelayWorkers { fanout, liveness })
    }

    /// Returns the channel registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Returns the tracker of all local connections.
    #[must_use]
    pub fn connections(&self) -> &Arc<ConnectionTracker> {
        &self.connections
    }

    /// Returns the fan-out router.
    #[must_use]
    pub fn router(&self) -> &FanoutRouter {
        &self.router
    }

    /// Returns the session gate.
    #[must_use]
    pub fn gate(&self) -> &SessionGate {
        &self.gate
    }

    /// Returns the presence store.
    #[must_use]
    pub fn presence(&self) -> &Arc<dyn PresenceStore> {
        &self.presence
    }

    /// Returns the per-connection outbound queue length.
    #[must_use]
    pub const fn outbound_buffer(&self) -> usize {
        self.outbound_buffer
    }
}
