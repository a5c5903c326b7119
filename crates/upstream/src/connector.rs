//! Upstream connector: dial, decode, forward, reconnect

use std::fmt;
use std::io;
use std::net::Shutdown;
use std::sync::Arc;
use std::time::Duration;

use beast::{DecodeError, Decoded, FrameReader};
use contracts::{BackoffConfig, Frame, UpstreamSource};
use socket2::{SockRef, TcpKeepalive};
use tokio::io::AsyncRead;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::backoff::{BackoffPolicy, BackoffState};
use crate::metrics::UpstreamMetrics;

/// Connection lifecycle of one upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamState {
    Idle,
    Connecting,
    Connected,
    Reading,
    Disconnected,
}

impl fmt::Display for UpstreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reading => "reading",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// Connector settings
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Label for logs and metrics
    pub name: String,
    /// `host:port` to dial
    pub addr: String,
    pub backoff: BackoffPolicy,
    /// Dial failures are logged at most once per this window
    pub log_interval: Duration,
    pub keepalive: Duration,
}

impl ConnectorConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        let addr = addr.into();
        Self {
            name: addr.clone(),
            addr,
            backoff: BackoffPolicy::default(),
            log_interval: Duration::from_secs(3600),
            keepalive: Duration::from_secs(60),
        }
    }

    pub fn from_source(source: &UpstreamSource, backoff: &BackoffConfig, keepalive: Duration) -> Self {
        Self {
            name: source.display_name().to_string(),
            addr: source.addr.clone(),
            backoff: BackoffPolicy::from_config(backoff),
            log_interval: backoff.log_interval(),
            keepalive,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

}

/// Why a connection stopped being read
#[derive(Debug)]
pub enum ConnectionEnd {
    /// Stream error or end of stream; reconnect
    Closed(DecodeError),
    /// Frame receiver dropped; stop the connector
    DispatcherClosed,
}

/// Maintains one upstream connection for the life of the dispatcher.
///
/// Runs until the frame receiver is dropped. Every other failure is retried
/// after a backoff delay.
pub struct UpstreamConnector {
    config: ConnectorConfig,
    frames: mpsc::Sender<Frame>,
    metrics: Arc<UpstreamMetrics>,
    state: watch::Sender<UpstreamState>,
}

impl UpstreamConnector {
    pub fn new(config: ConnectorConfig, frames: mpsc::Sender<Frame>) -> Self {
        let (state, _) = watch::channel(UpstreamState::Idle);
        Self {
            config,
            frames,
            metrics: Arc::new(UpstreamMetrics::new()),
            state,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Shared counters, readable while the connector runs
    pub fn metrics(&self) -> Arc<UpstreamMetrics> {
        self.metrics.clone()
    }

    /// Watch the connection state
    pub fn subscribe_state(&self) -> watch::Receiver<UpstreamState> {
        self.state.subscribe()
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    #[instrument(
        name = "upstream_connector",
        skip(self),
        fields(upstream = %self.config.name, addr = %self.config.addr)
    )]
    pub async fn run(self) {
        let mut backoff = BackoffState::new(self.config.backoff, self.config.log_interval);

        loop {
            let delay = backoff.delay();
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.frames.closed() => break,
                }
            }

            self.set_state(UpstreamState::Connecting);
            let dialed = tokio::select! {
                r = dial(&self.config) => r,
                _ = self.frames.closed() => break,
            };

            let stream = match dialed {
                Ok(stream) => stream,
                Err(e) => {
                    self.metrics.record_connect(false);
                    observability::record_connect(&self.config.name, false);
                    let retry_in = backoff.on_failure();
                    if backoff.should_log(Instant::now()) {
                        warn!(error = %e, retry_in = ?retry_in, "failed to connect to upstream");
                    } else {
                        debug!(error = %e, retry_in = ?retry_in, "failed to connect to upstream");
                    }
                    self.set_state(UpstreamState::Disconnected);
                    continue;
                }
            };

            backoff.on_success();
            self.metrics.record_connect(true);
            observability::record_connect(&self.config.name, true);
            self.set_state(UpstreamState::Connected);

            let mut reader = FrameReader::new(stream);
            self.set_state(UpstreamState::Reading);

            let end = tokio::select! {
                end = pump(&self.config.name, &mut reader, &self.frames, &self.metrics) => end,
                _ = self.frames.closed() => ConnectionEnd::DispatcherClosed,
            };

            match end {
                ConnectionEnd::DispatcherClosed => break,
                ConnectionEnd::Closed(e) => {
                    self.metrics.record_disconnect();
                    let retry_in = backoff.on_failure();
                    match e {
                        DecodeError::EndOfStream => {
                            info!(retry_in = ?retry_in, "upstream closed connection")
                        }
                        e => warn!(error = %e, retry_in = ?retry_in, "upstream read failed"),
                    }
                    self.set_state(UpstreamState::Disconnected);
                }
            }
        }

        self.set_state(UpstreamState::Idle);
        info!("upstream connector stopped");
    }

    fn set_state(&self, state: UpstreamState) {
        self.state.send_replace(state);
        debug!(state = %state, "upstream state");
    }
}

/// Dial and apply socket options: write side half-closed, keep-alive on.
async fn dial(config: &ConnectorConfig) -> io::Result<TcpStream> {
    let stream = TcpStream::connect(&config.addr).await?;

    let sock_ref = SockRef::from(&stream);
    sock_ref.shutdown(Shutdown::Write)?;
    if config.keepalive.is_zero() {
        // A zero TCP_KEEPIDLE is rejected by the kernel
        sock_ref.set_keepalive(false)?;
    } else {
        sock_ref.set_tcp_keepalive(&TcpKeepalive::new().with_time(config.keepalive))?;
    }

    info!(peer = ?stream.peer_addr().ok(), "connected to upstream");
    Ok(stream)
}

/// Decode frames from `reader` and forward them until the stream fails.
///
/// Framing errors resynchronize at the next byte. They are only logged once
/// the connection has produced a good frame, since a fresh connection often
/// starts mid-frame.
pub async fn pump<R>(
    name: &str,
    reader: &mut FrameReader<R>,
    frames: &mpsc::Sender<Frame>,
    metrics: &UpstreamMetrics,
) -> ConnectionEnd
where
    R: AsyncRead + Unpin,
{
    let mut seen_first = false;

    loop {
        match reader.read().await {
            Ok(Decoded::Frame(frame)) => {
                seen_first = true;
                if frames.send(frame).await.is_err() {
                    return ConnectionEnd::DispatcherClosed;
                }
                metrics.record_received();
                observability::record_frame_received(name);
            }
            Ok(Decoded::Skipped { tag }) => {
                metrics.record_skipped();
                observability::record_frame_skipped(name);
                debug!(upstream = %name, tag = tag, "skipped unknown frame type");
            }
            Err(e) if e.is_resync() => {
                metrics.record_framing_error();
                observability::record_framing_error(name, e.kind());
                if seen_first {
                    warn!(upstream = %name, error = %e, "framing error, resynchronizing");
                }
            }
            Err(e) => return ConnectionEnd::Closed(e),
        }
    }
}
