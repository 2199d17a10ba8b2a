//! Relay configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Collaborators that are not configured
//! fall back to in-process implementations so a single relay can run with
//! no external services at all.

use std::net::SocketAddr;
use std::time::Duration;

/// How a channel name taken from the request path is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelValidation {
    /// A channel must be the id of a user known to the identity provider.
    Identity,
    /// Every non-empty channel name is accepted.
    Open,
}

/// Log output format for `tracing-subscriber`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Connection parameters for the FusionAuth identity provider.
#[derive(Debug, Clone)]
pub struct FusionAuthConfig {
    /// Base URL of the FusionAuth instance (e.g. `https://auth.example.com`).
    pub base_url: String,
    /// API key sent on privileged lookups.
    pub api_key: String,
}

/// Top-level relay configuration.
///
/// Loaded once at startup via [`RelayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address to bind the HTTP/WebSocket server to.
    pub listen_addr: SocketAddr,

    /// Redis connection URL used for the broadcast bus and presence store.
    /// `None` selects the in-process bus and in-memory presence store.
    pub redis_url: Option<String>,

    /// Shared bus topic every relay process publishes to and subscribes on.
    pub bus_topic: String,

    /// Capacity of the in-process bus ring buffer.
    pub local_bus_capacity: usize,

    /// Seconds to wait before resubscribing after the bus stream ends.
    pub bus_reconnect_secs: u64,

    /// Identity provider parameters. `None` selects an empty in-memory
    /// provider that rejects every token.
    pub fusionauth: Option<FusionAuthConfig>,

    /// Timeout in seconds for identity provider requests.
    pub identity_timeout_secs: u64,

    /// Channel validation policy applied on connect.
    pub channel_validation: ChannelValidation,

    /// Seconds between liveness pings.
    pub liveness_interval_secs: u64,

    /// Per-connection outbound frame queue length.
    pub outbound_buffer: usize,

    /// Log output format.
    pub log_format: LogFormat,
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`], if `CHANNEL_VALIDATION` names an unknown policy, or
    /// if `LIVENESS_INTERVAL_SECS` is `0`.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:9001".to_string())
            .parse()?;

        let redis_url = std::env::var("REDIS_URL").ok().or_else(|| {
            let host = std::env::var("REDIS_HOST").ok()?;
            Some(redis_url_from_parts(
                &host,
                std::env::var("REDIS_PASS").ok().as_deref(),
            ))
        });

        let bus_topic = std::env::var("BUS_TOPIC").unwrap_or_else(|_| "chat".to_string());
        let local_bus_capacity = parse_env("LOCAL_BUS_CAPACITY", 10_000);
        let bus_reconnect_secs = parse_env("BUS_RECONNECT_SECS", 5);

        let fusionauth = match (
            std::env::var("FUSIONAUTH_URL").ok(),
            std::env::var("FUSIONAUTH_KEY").ok(),
        ) {
            (Some(base_url), Some(api_key)) => Some(FusionAuthConfig { base_url, api_key }),
            _ => None,
        };
        let identity_timeout_secs = parse_env("IDENTITY_TIMEOUT_SECS", 10);

        let channel_validation = match std::env::var("CHANNEL_VALIDATION").ok().as_deref() {
            None | Some("identity") => ChannelValidation::Identity,
            Some("open") => ChannelValidation::Open,
            Some(other) => {
                return Err(format!("unknown CHANNEL_VALIDATION policy: {other}").into());
            }
        };

        let liveness_interval_secs = positive_secs(
            "LIVENESS_INTERVAL_SECS",
            parse_env("LIVENESS_INTERVAL_SECS", 5),
        )?;
        let outbound_buffer = parse_env("OUTBOUND_BUFFER", 256);

        let log_format = match std::env::var("LOG_FORMAT").ok().as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            listen_addr,
            redis_url,
            bus_topic,
            local_bus_capacity,
            bus_reconnect_secs,
            fusionauth,
            identity_timeout_secs,
            channel_validation,
            liveness_interval_secs,
            outbound_buffer,
            log_format,
        })
    }

    /// Returns the liveness ping interval as a [`Duration`].
    #[must_use]
    pub const fn liveness_interval(&self) -> Duration {
        Duration::from_secs(self.liveness_interval_secs)
    }
}

/// Builds a `redis://` URL from a bare host (optionally `host:port`) and an
/// optional password.
fn redis_url_from_parts(host: &str, password: Option<&str>) -> String {
    match password {
        Some(pass) if !pass.is_empty() => format!("redis://:{pass}@{host}"),
        _ => format!("redis://{host}"),
    }
}

/// Rejects a zero-second interval.
fn positive_secs(key: &str, secs: u64) -> Result<u64, String> {
    if secs == 0 {
        return Err(format!("{key} must be at least 1"));
    }
    Ok(secs)
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
