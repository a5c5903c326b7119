//! ProxyBlueprint - Config Loader output
//!
//! Describes the whole process: listen sockets, upstream receivers,
//! reconnect policy and the optional metrics endpoint.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete proxy configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Downstream side: listeners and broadcast settings
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Receivers to connect out to
    #[serde(default)]
    pub upstreams: Vec<UpstreamSource>,

    /// Reconnect policy shared by every upstream
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Prometheus endpoint (None = disabled)
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
}

/// Listener and broadcast settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Listen addresses (`host:port`)
    #[serde(default = "default_listen")]
    pub listen: Vec<String>,

    /// Deadline for a single subscriber write
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Capacity of the upstream -> dispatcher frame queue
    #[serde(default = "default_frame_queue")]
    pub frame_queue: usize,

    /// Capacity of the acceptor -> dispatcher subscriber queue
    #[serde(default = "default_subscriber_queue")]
    pub subscriber_queue: usize,

    /// TCP keep-alive period applied to every socket
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// Fixed pause after a failed accept
    #[serde(default = "default_accept_retry_ms")]
    pub accept_retry_ms: u64,

    /// Periodic stats log interval (0 = disabled)
    #[serde(default)]
    pub stats_interval_secs: u64,

    /// Hex-dump every relayed frame at debug level
    #[serde(default)]
    pub dump_frames: bool,
}

fn default_listen() -> Vec<String> {
    vec!["localhost:30005".to_string()]
}

fn default_write_timeout_ms() -> u64 {
    2000
}

fn default_frame_queue() -> usize {
    16
}

fn default_subscriber_queue() -> usize {
    4
}

fn default_keepalive_secs() -> u64 {
    60
}

fn default_accept_retry_ms() -> u64 {
    1000
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            write_timeout_ms: default_write_timeout_ms(),
            frame_queue: default_frame_queue(),
            subscriber_queue: default_subscriber_queue(),
            keepalive_secs: default_keepalive_secs(),
            accept_retry_ms: default_accept_retry_ms(),
            stats_interval_secs: 0,
            dump_frames: false,
        }
    }
}

impl ProxyConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    pub fn accept_retry(&self) -> Duration {
        Duration::from_millis(self.accept_retry_ms)
    }

    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }
}

/// One upstream receiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamSource {
    /// Label used in logs and metrics (defaults to `addr`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Receiver address (`host:port`)
    pub addr: String,
}

impl UpstreamSource {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            name: None,
            addr: addr.into(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.addr)
    }
}

/// Reconnect backoff settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Growth unit: next = (unit + previous) * 2
    #[serde(default = "default_backoff_unit_ms")]
    pub unit_ms: u64,

    /// Upper bound on the delay
    #[serde(default = "default_backoff_max_ms")]
    pub max_ms: u64,

    /// A dial failure is logged at most once per this window
    #[serde(default = "default_log_interval_secs")]
    pub log_interval_secs: u64,
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

fn default_log_interval_secs() -> u64 {
    3600
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            unit_ms: default_backoff_unit_ms(),
            max_ms: default_backoff_max_ms(),
            log_interval_secs: default_log_interval_secs(),
        }
    }
}

impl BackoffConfig {
    pub fn unit(&self) -> Duration {
        Duration::from_millis(self.unit_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_secs(self.log_interval_secs)
    }
}

/// Prometheus exporter settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Exporter listen address (`ip:port`)
    pub listen: String,
}
