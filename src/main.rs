//! nebula-relay server entry point.
//!
//! Wires the bus, presence store and identity provider selected by the
//! environment, starts the relay workers and serves HTTP/WebSocket until
//! Ctrl+C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use nebula_relay::app::build_app;
use nebula_relay::app_state::AppState;
use nebula_relay::bus::{BroadcastBus, LocalBus, RedisBus};
use nebula_relay::config::{ChannelValidation, LogFormat, RelayConfig};
use nebula_relay::identity::{
    ChannelDirectory, FusionAuthClient, IdentityChannelDirectory, IdentityProvider,
    InMemoryIdentityProvider, OpenDirectory,
};
use nebula_relay::presence::{InMemoryPresence, PresenceStore, RedisPresence};
use nebula_relay::service::{RelayParts, RelayService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = RelayConfig::from_env().map_err(|err| anyhow::anyhow!("{err}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting nebula-relay");

    // Build collaborators
    let (bus, presence) = connect_backends(&config).await?;
    let identity = identity_provider(&config)?;
    let channels: Arc<dyn ChannelDirectory> = match config.channel_validation {
        ChannelValidation::Identity => {
            Arc::new(IdentityChannelDirectory::new(Arc::clone(&identity)))
        }
        ChannelValidation::Open => Arc::new(OpenDirectory),
    };

    // Build service layer
    let relay = Arc::new(RelayService::new(RelayParts {
        bus,
        presence,
        identity,
        channels,
        topic: config.bus_topic.clone(),
        outbound_buffer: config.outbound_buffer,
    }));
    let workers = relay
        .spawn_workers(
            Duration::from_secs(config.bus_reconnect_secs),
            config.liveness_interval(),
        )
        .await
        .context("starting relay workers")?;

    // Start server
    let app = build_app(AppState::new(relay));
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    workers.shutdown();
    tracing::info!("relay stopped");
    Ok(())
}

async fn connect_backends(
    config: &RelayConfig,
) -> anyhow::Result<(Arc<dyn BroadcastBus>, Arc<dyn PresenceStore>)> {
    let Some(url) = &config.redis_url else {
        tracing::warn!("no Redis configured, using in-process bus; messages stay on this process");
        let bus: Arc<dyn BroadcastBus> = Arc::new(LocalBus::new(config.local_bus_capacity));
        let presence: Arc<dyn PresenceStore> = Arc::new(InMemoryPresence::new());
        return Ok((bus, presence));
    };

    let client = redis::Client::open(url.as_str()).context("parsing Redis URL")?;
    let manager = client
        .get_connection_manager()
        .await
        .context("connecting to Redis")?;
    tracing::info!(topic = %config.bus_topic, "connected to Redis");

    let bus: Arc<dyn BroadcastBus> = Arc::new(RedisBus::new(client, manager.clone()));
    let presence: Arc<dyn PresenceStore> = Arc::new(RedisPresence::new(manager));
    Ok((bus, presence))
}

fn identity_provider(config: &RelayConfig) -> anyhow::Result<Arc<dyn IdentityProvider>> {
    match &config.fusionauth {
        Some(fusionauth) => {
            let client = FusionAuthClient::new(
                fusionauth,
                Duration::from_secs(config.identity_timeout_secs),
            )
            .context("building FusionAuth client")?;
            Ok(Arc::new(client))
        }
        None => {
            tracing::warn!("no identity provider configured, every session token is rejected");
            if config.channel_validation == ChannelValidation::Identity {
                tracing::warn!("CHANNEL_VALIDATION=identity without a provider rejects every channel");
            }
            Ok(Arc::new(InMemoryIdentityProvider::new()))
        }
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C, shutting down"),
        Err(err) => tracing::error!(error = %err, "failed to install Ctrl+C handler"),
    }
}
