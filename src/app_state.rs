//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::RelayService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Relay hub: registry, fan-out, gate and presence.
    pub relay: Arc<RelayService>,
}

impl AppState {
    /// Wraps a relay for sharing across handlers.
    #[must_use]
    pub fn new(relay: Arc<RelayService>) -> Self {
        Self { relay }
    }
}
