//! # Upstream
//!
//! Outbound connections to Beast receivers.
//!
//! Responsibilities:
//! - Dial each configured receiver, half-close the write side, enable keep-alive
//! - Drive the frame decoder and forward frames into the dispatcher queue
//! - Reconnect with exponential backoff, rate-limiting failure logs
//!
//! ## Usage Example
//!
//! ```ignore
//! use upstream::{ConnectorConfig, UpstreamConnector};
//!
//! let (tx, rx) = tokio::sync::mpsc::channel(16);
//! let connector = UpstreamConnector::new(ConnectorConfig::new("10.0.0.1:30005"), tx);
//! let handle = connector.spawn();
//! ```

mod backoff;
mod connector;
mod metrics;

pub use backoff::{BackoffPolicy, BackoffState};
pub use connector::{pump, ConnectionEnd, ConnectorConfig, UpstreamConnector, UpstreamState};
pub use metrics::{MetricsSnapshot, UpstreamMetrics};
