//! Engine-level configuration: timeouts, concurrency limits, and the HTTP
//! bind address, split between `ServerConfig` (operation routing knobs) and
//! `NetworkConfig` (bind/connection knobs).

use std::time::Duration;

use clap::Parser;

/// Tunables for the session controller and transfer pipeline.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval [`crate::controller::SessionController::proceed_to_and_wait`]
    /// sleeps between retries of a non-finished stage.
    pub poll_interval: Duration,
    /// Maximum number of transfer sessions this process will drive at once.
    pub max_concurrent_transfers: u32,
    /// How long an inactive [`morango_core::SyncSession`] may sit before it
    /// is eligible for cleanup.
    pub session_idle_timeout: Duration,
    /// Local profile name this engine syncs.
    pub profile: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_concurrent_transfers: 16,
            session_idle_timeout: Duration::from_secs(600),
            profile: "facilitydata".to_string(),
        }
    }
}

/// Network-facing configuration for the HTTP side of the transport.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub cors_origins: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8014,
            request_timeout: Duration::from_secs(30),
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// Command-line surface for `morango-syncd`.
#[derive(Debug, Parser)]
#[command(name = "morango-syncd", about = "Morango-style peer-to-peer sync daemon")]
pub struct Cli {
    /// Address to bind the HTTP transport to.
    #[arg(long, env = "MORANGO_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "MORANGO_PORT", default_value_t = 8014)]
    pub port: u16,

    /// Profile name this engine syncs.
    #[arg(long, env = "MORANGO_PROFILE", default_value = "facilitydata")]
    pub profile: String,

    /// Poll interval (milliseconds) for `proceed_to_and_wait`.
    #[arg(long, env = "MORANGO_POLL_INTERVAL_MS", default_value_t = 500)]
    pub poll_interval_ms: u64,

    /// Maximum number of concurrent transfer sessions.
    #[arg(long, env = "MORANGO_MAX_CONCURRENT_TRANSFERS", default_value_t = 16)]
    pub max_concurrent_transfers: u32,
}

impl Cli {
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_concurrent_transfers: self.max_concurrent_transfers,
            profile: self.profile.clone(),
            ..EngineConfig::default()
        }
    }

    #[must_use]
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig { host: self.host.clone(), port: self.port, ..NetworkConfig::default() }
    }
}
