//! Configuration management for ofchannel.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transport::TransportConfig;
use crate::types::{ProtocolVersion, VersionSet};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Controller (accept loop) configuration.
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Per-connection configuration.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| Error::Config(format!("Failed to write config: {e}")))?;

        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.controller.listen_addrs.is_empty() {
            return Err(Error::InvalidConfig("No listen addresses".into()));
        }
        self.connection.validate()
    }
}

/// Controller accept-loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Listen addresses.
    #[serde(default = "default_listen_addrs")]
    pub listen_addrs: Vec<SocketAddr>,

    /// Maximum concurrent switch connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_listen_addrs() -> Vec<SocketAddr> {
    vec![SocketAddr::from(([0, 0, 0, 0], crate::DEFAULT_PORT))]
}
fn default_max_connections() -> usize {
    1024
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            listen_addrs: default_listen_addrs(),
            max_connections: default_max_connections(),
        }
    }
}

/// Per-connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Protocol versions advertised during negotiation.
    #[serde(default = "default_versions")]
    pub versions: Vec<ProtocolVersion>,

    /// Time the peer has to send its Hello.
    #[serde(default = "default_handshake_timeout", with = "humantime_serde")]
    pub handshake_timeout: Duration,

    /// Idle time before an echo probe is sent.
    #[serde(default = "default_echo_interval", with = "humantime_serde")]
    pub echo_interval: Duration,

    /// Time allowed for the probe's reply.
    #[serde(default = "default_echo_reply_timeout", with = "humantime_serde")]
    pub echo_reply_timeout: Duration,

    /// Consecutive unanswered probes before the peer is declared dead.
    #[serde(default = "default_max_echo_misses")]
    pub max_echo_misses: u32,

    /// Outbound queue bytes above which inbound reads are suspended.
    #[serde(default = "default_high_watermark")]
    pub outbound_high_watermark: usize,

    /// Outbound queue bytes below which inbound reads resume.
    #[serde(default = "default_low_watermark")]
    pub outbound_low_watermark: usize,

    /// Outbound submission channel depth.
    #[serde(default = "default_queue_depth")]
    pub outbound_queue_depth: usize,

    /// Event channel depth towards the listener.
    #[serde(default = "default_queue_depth")]
    pub event_queue_depth: usize,
}

fn default_versions() -> Vec<ProtocolVersion> {
    vec![ProtocolVersion::V1_0, ProtocolVersion::V1_3]
}
fn default_handshake_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_echo_interval() -> Duration {
    Duration::from_secs(15)
}
fn default_echo_reply_timeout() -> Duration {
    Duration::from_secs(3)
}
fn default_max_echo_misses() -> u32 {
    3
}
fn default_high_watermark() -> usize {
    64 * 1024
}
fn default_low_watermark() -> usize {
    32 * 1024
}
fn default_queue_depth() -> usize {
    256
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            versions: default_versions(),
            handshake_timeout: default_handshake_timeout(),
            echo_interval: default_echo_interval(),
            echo_reply_timeout: default_echo_reply_timeout(),
            max_echo_misses: default_max_echo_misses(),
            outbound_high_watermark: default_high_watermark(),
            outbound_low_watermark: default_low_watermark(),
            outbound_queue_depth: default_queue_depth(),
            event_queue_depth: default_queue_depth(),
        }
    }
}

impl ConnectionConfig {
    /// The advertised versions as a negotiation bitmap.
    pub fn supported_versions(&self) -> VersionSet {
        VersionSet::from_versions(&self.versions)
    }

    pub fn validate(&self) -> Result<()> {
        if self.versions.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one protocol version must be enabled".into(),
            ));
        }
        if self.outbound_low_watermark >= self.outbound_high_watermark {
            return Err(Error::InvalidConfig(
                "Low watermark must be below the high watermark".into(),
            ));
        }
        if self.max_echo_misses == 0 {
            return Err(Error::InvalidConfig(
                "max_echo_misses must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text or json).
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable colored output.
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_color() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_color(),
        }
    }
}

/// Initialize logging.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    } else {
        subscriber
            .with(fmt::layer().with_ansi(config.color))
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    }

    Ok(())
}
