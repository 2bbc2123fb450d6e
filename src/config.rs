//! Configuration for the client and the collector.
//!
//! Configuration is resolved in order (later sources override earlier):
//! 1. Default values
//! 2. An optional YAML file
//! 3. `SUCTION_*` environment variables
//!
//! [`Config::validate`] runs before any task starts; a malformed value is the
//! one error class that aborts the process.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::backoff::BackoffPolicy;
use crate::{Result, TelemetryError};

// ============================================================================
// Default configuration constants
// ============================================================================

/// Default idle timeout in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30;

/// Default keep-alive period in seconds.
pub const DEFAULT_KEEP_ALIVE_PERIOD_SECS: u64 = 10;

/// Default maximum concurrent incoming bidirectional streams.
pub const DEFAULT_MAX_INCOMING_STREAMS: u64 = 100;

/// Default maximum concurrent incoming unidirectional streams.
pub const DEFAULT_MAX_INCOMING_UNI_STREAMS: u64 = 100;

/// Default collector listen address.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:4242";

/// Default client dial address.
pub const DEFAULT_CONNECT_ADDRESS: &str = "127.0.0.1:4242";

/// Default TLS server name presented by the client.
pub const DEFAULT_SERVER_NAME: &str = "localhost";

/// Default per-stream read buffer on the collector (64 KiB).
pub const DEFAULT_STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// Default batch assembly interval in milliseconds.
pub const DEFAULT_BATCH_INTERVAL_MS: u64 = 1_000;

/// Default synthetic producer interval in milliseconds.
pub const DEFAULT_PRODUCER_INTERVAL_MS: u64 = 100;

/// Longest reconnect delay accepted by [`Config::validate`], one day.
pub const MAX_RECONNECT_DELAY_SECS: f64 = 86_400.0;

const MIB: u64 = 1024 * 1024;

/// Complete configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// QUIC transport parameters shared by both sides.
    pub transport: TransportSettings,
    /// Collector settings.
    pub server: ServerSettings,
    /// Client settings.
    pub client: ClientSettings,
}

/// QUIC transport parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub idle_timeout_secs: u64,
    pub keep_alive_period_secs: u64,
    pub max_incoming_streams: u64,
    pub max_incoming_uni_streams: u64,
    pub initial_stream_receive_window_mib: u64,
    pub max_stream_receive_window_mib: u64,
    pub initial_connection_receive_window_mib: u64,
    pub max_connection_receive_window_mib: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            keep_alive_period_secs: DEFAULT_KEEP_ALIVE_PERIOD_SECS,
            max_incoming_streams: DEFAULT_MAX_INCOMING_STREAMS,
            max_incoming_uni_streams: DEFAULT_MAX_INCOMING_UNI_STREAMS,
            initial_stream_receive_window_mib: 1,
            max_stream_receive_window_mib: 6,
            initial_connection_receive_window_mib: 2,
            max_connection_receive_window_mib: 15,
        }
    }
}

impl TransportSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// `None` disables keep-alives.
    pub fn keep_alive_period(&self) -> Option<Duration> {
        (self.keep_alive_period_secs > 0).then(|| Duration::from_secs(self.keep_alive_period_secs))
    }

    pub fn max_stream_receive_window_bytes(&self) -> u64 {
        self.max_stream_receive_window_mib.saturating_mul(MIB)
    }

    pub fn max_connection_receive_window_bytes(&self) -> u64 {
        self.max_connection_receive_window_mib.saturating_mul(MIB)
    }
}

/// Collector settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Listen address; a bare `:port` binds all interfaces.
    pub listen_address: String,
    /// Fixed read buffer size per stream.
    pub stream_buffer_size: usize,
    /// PEM certificate chain.
    pub cert_path: PathBuf,
    /// PEM private key.
    pub key_path: PathBuf,
    /// Optional cache checked for liveness at startup.
    pub cache_url: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            stream_buffer_size: DEFAULT_STREAM_BUFFER_SIZE,
            cert_path: PathBuf::from("samples/server.crt"),
            key_path: PathBuf::from("samples/server.key"),
            cache_url: None,
        }
    }
}

impl ServerSettings {
    /// Parse the listen address into a socket address.
    pub fn listen_socket_addr(&self) -> Result<SocketAddr> {
        let address = self.listen_address.trim();
        let normalized = match address.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => address.to_string(),
        };
        SocketAddr::from_str(&normalized).map_err(|e| {
            TelemetryError::config(format!("invalid listen address '{address}': {e}"))
        })
    }
}

/// Client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Collector address (`host:port`), resolved on every dial.
    pub connect_address: String,
    /// Name verified against the collector's certificate.
    pub server_name: String,
    /// PEM trust anchors for the collector's certificate.
    pub ca_path: PathBuf,
    pub batch_interval_ms: u64,
    pub producer_interval_ms: u64,
    /// Run the synthetic record producer.
    pub synthetic_producer: bool,
    pub reconnect: ReconnectSettings,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_address: DEFAULT_CONNECT_ADDRESS.to_string(),
            server_name: DEFAULT_SERVER_NAME.to_string(),
            ca_path: PathBuf::from("samples/server.crt"),
            batch_interval_ms: DEFAULT_BATCH_INTERVAL_MS,
            producer_interval_ms: DEFAULT_PRODUCER_INTERVAL_MS,
            synthetic_producer: true,
            reconnect: ReconnectSettings::default(),
        }
    }
}

impl ClientSettings {
    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    pub fn producer_interval(&self) -> Duration {
        Duration::from_millis(self.producer_interval_ms)
    }
}

/// Reconnect backoff settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    pub initial_delay_secs: f64,
    pub max_delay_secs: f64,
    pub multiplier: f64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        let policy = BackoffPolicy::default();
        Self {
            initial_delay_secs: policy.initial.as_secs_f64(),
            max_delay_secs: policy.max.as_secs_f64(),
            multiplier: policy.multiplier,
        }
    }
}

impl ReconnectSettings {
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial: delay_from_secs(self.initial_delay_secs),
            max: delay_from_secs(self.max_delay_secs),
            multiplier: self.multiplier,
        }
    }
}

/// Clamp to `[0, MAX_RECONNECT_DELAY_SECS]`; NaN becomes zero.
fn delay_from_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.clamp(0.0, MAX_RECONNECT_DELAY_SECS))
        .unwrap_or(Duration::ZERO)
}

impl Config {
    /// Load configuration from an optional YAML file, then apply environment
    /// overrides from the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML file; missing fields take their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TelemetryError::config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parse YAML text; missing fields take their defaults.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(contents)
            .map_err(|e| TelemetryError::config(format!("invalid config YAML: {e}")))
    }

    /// Override fields from `SUCTION_*` variables returned by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let t = &mut self.transport;
        override_parsed(&lookup, "SUCTION_QUIC_MAX_IDLE_TIMEOUT", &mut t.idle_timeout_secs)?;
        override_parsed(&lookup, "SUCTION_QUIC_KEEP_ALIVE_PERIOD", &mut t.keep_alive_period_secs)?;
        override_parsed(
            &lookup,
            "SUCTION_QUIC_SERVER_MAX_INCOMING_STREAMS",
            &mut t.max_incoming_streams,
        )?;
        override_parsed(
            &lookup,
            "SUCTION_QUIC_SERVER_MAX_INCOMING_UNI_STREAMS",
            &mut t.max_incoming_uni_streams,
        )?;
        override_parsed(
            &lookup,
            "SUCTION_QUIC_SERVER_INITIAL_STREAM_RECEIVE_WINDOW",
            &mut t.initial_stream_receive_window_mib,
        )?;
        override_parsed(
            &lookup,
            "SUCTION_QUIC_SERVER_MAX_STREAM_RECEIVE_WINDOW",
            &mut t.max_stream_receive_window_mib,
        )?;
        override_parsed(
            &lookup,
            "SUCTION_QUIC_SERVER_INITIAL_CONNECTION_RECEIVE_WINDOW",
            &mut t.initial_connection_receive_window_mib,
        )?;
        override_parsed(
            &lookup,
            "SUCTION_QUIC_SERVER_MAX_CONNECTION_RECEIVE_WINDOW",
            &mut t.max_connection_receive_window_mib,
        )?;

        let s = &mut self.server;
        override_parsed(&lookup, "SUCTION_QUIC_SERVER_LISTENING_ADDRESS", &mut s.listen_address)?;
        override_parsed(
            &lookup,
            "SUCTION_QUIC_SERVER_STREAM_BUFFER_SIZE",
            &mut s.stream_buffer_size,
        )?;
        if let Some(url) = lookup("SUCTION_CACHE_URL") {
            s.cache_url = Some(url);
        }

        override_parsed(
            &lookup,
            "SUCTION_QUIC_CLIENT_CONNECTION_ADDRESS",
            &mut self.client.connect_address,
        )?;

        Ok(())
    }

    /// Reject values that cannot produce a working transport.
    pub fn validate(&self) -> Result<()> {
        let t = &self.transport;
        if t.idle_timeout_secs == 0 {
            return Err(TelemetryError::config("idle timeout must be greater than zero"));
        }
        if t.keep_alive_period().is_some_and(|keep_alive| keep_alive >= t.idle_timeout()) {
            return Err(TelemetryError::config(format!(
                "keep-alive period ({}s) must be shorter than idle timeout ({}s)",
                t.keep_alive_period_secs, t.idle_timeout_secs
            )));
        }
        check_window(
            "stream",
            t.initial_stream_receive_window_mib,
            t.max_stream_receive_window_mib,
        )?;
        check_window(
            "connection",
            t.initial_connection_receive_window_mib,
            t.max_connection_receive_window_mib,
        )?;

        if self.server.stream_buffer_size == 0 {
            return Err(TelemetryError::config("server stream buffer size must be non-zero"));
        }
        self.server.listen_socket_addr()?;

        let c = &self.client;
        if c.connect_address.trim().is_empty() {
            return Err(TelemetryError::config("client connection address is empty"));
        }
        if c.batch_interval_ms == 0 {
            return Err(TelemetryError::config("batch interval must be greater than zero"));
        }
        if c.producer_interval_ms == 0 {
            return Err(TelemetryError::config("producer interval must be greater than zero"));
        }

        let r = &c.reconnect;
        if !(r.multiplier.is_finite() && r.multiplier >= 1.0) {
            return Err(TelemetryError::config(format!(
                "reconnect multiplier must be >= 1.0, got {}",
                r.multiplier
            )));
        }
        if !(r.initial_delay_secs.is_finite() && r.initial_delay_secs > 0.0) {
            return Err(TelemetryError::config("reconnect initial delay must be positive"));
        }
        if !r.max_delay_secs.is_finite() || r.initial_delay_secs > r.max_delay_secs {
            return Err(TelemetryError::config(
                "reconnect initial delay must not exceed the max delay",
            ));
        }
        if r.max_delay_secs > MAX_RECONNECT_DELAY_SECS {
            return Err(TelemetryError::config(format!(
                "reconnect max delay must not exceed {MAX_RECONNECT_DELAY_SECS}s, got {}",
                r.max_delay_secs
            )));
        }

        Ok(())
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(());
    };
    *target = raw
        .trim()
        .parse()
        .map_err(|e| TelemetryError::config(format!("invalid {key} '{raw}': {e}")))?;
    Ok(())
}

fn check_window(name: &str, initial: u64, max: u64) -> Result<()> {
    if max == 0 {
        return Err(TelemetryError::config(format!("max {name} receive window must be non-zero")));
    }
    if initial > max {
        return Err(TelemetryError::config(format!(
            "initial {name} receive window ({initial} MiB) exceeds max ({max} MiB)"
        )));
    }
    Ok(())
}
