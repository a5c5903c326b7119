//! Proxy orchestrator - wires listeners, upstream connectors and the dispatcher.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::ProxyBlueprint;
use dispatcher::{
    AcceptorConfig, DispatcherBuilder, DispatcherConfig, DispatcherStats, InboundAcceptor,
    TcpSubscriber,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use upstream::{ConnectorConfig, UpstreamConnector, UpstreamMetrics};

use super::ProxyStats;
use crate::error::CliError;

/// Upper bound on the dispatcher's own shutdown (closing every subscriber)
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

struct RunningUpstream {
    name: String,
    metrics: Arc<UpstreamMetrics>,
    task: JoinHandle<()>,
}

/// A running proxy
pub struct Proxy {
    started: Instant,
    local_addrs: Vec<SocketAddr>,
    dispatcher: JoinHandle<DispatcherStats>,
    acceptors: Vec<JoinHandle<()>>,
    upstreams: Vec<RunningUpstream>,
}

impl Proxy {
    /// Bind every listener and start all tasks.
    ///
    /// Fails if a listener cannot be bound or the metrics exporter cannot be
    /// installed; nothing is left running in that case.
    pub async fn start(blueprint: &ProxyBlueprint) -> Result<Self> {
        let started = Instant::now();
        let proxy = &blueprint.proxy;

        if let Some(metrics) = &blueprint.metrics {
            let addr: SocketAddr = metrics.listen.parse().map_err(|e| {
                CliError::startup("metrics exporter", format!("{}: {e}", metrics.listen))
            })?;
            observability::init_metrics(addr)?;
        }

        let (dispatcher, handle) =
            DispatcherBuilder::new(DispatcherConfig::from_proxy(proxy)).build::<TcpSubscriber>();

        let acceptor_config = AcceptorConfig {
            keepalive: proxy.keepalive(),
            retry_pause: proxy.accept_retry(),
        };
        let mut acceptors = Vec::with_capacity(proxy.listen.len());
        for addr in &proxy.listen {
            let acceptor =
                InboundAcceptor::bind(addr, handle.subscriber_sender(), acceptor_config.clone())
                    .await
                    .with_context(|| format!("Failed to listen on {addr}"))?;
            acceptors.push(acceptor);
        }
        let local_addrs: Vec<SocketAddr> = acceptors.iter().map(|a| a.local_addr()).collect();

        let dispatcher = dispatcher.spawn();
        let acceptors = acceptors.into_iter().map(InboundAcceptor::spawn).collect();

        let upstreams = blueprint
            .upstreams
            .iter()
            .map(|source| {
                let config =
                    ConnectorConfig::from_source(source, &blueprint.backoff, proxy.keepalive());
                let connector = UpstreamConnector::new(config, handle.frame_sender());
                RunningUpstream {
                    name: connector.name().to_string(),
                    metrics: connector.metrics(),
                    task: connector.spawn(),
                }
            })
            .collect::<Vec<_>>();

        info!(
            listeners = ?local_addrs,
            upstreams = upstreams.len(),
            "Proxy started"
        );

        // Connectors now hold the only frame senders
        drop(handle);

        Ok(Self {
            started,
            local_addrs,
            dispatcher,
            acceptors,
            upstreams,
        })
    }

    /// Bound listener addresses, in configuration order
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    /// Stop accepting and connecting, let the dispatcher close every
    /// subscriber, and collect the final stats.
    pub async fn shutdown(self) -> Result<ProxyStats> {
        for task in &self.acceptors {
            task.abort();
        }
        for upstream in &self.upstreams {
            upstream.task.abort();
        }
        for task in self.acceptors {
            let _ = task.await;
        }

        let mut upstreams = Vec::with_capacity(self.upstreams.len());
        for upstream in self.upstreams {
            let _ = upstream.task.await;
            upstreams.push((upstream.name, upstream.metrics.snapshot()));
        }

        let dispatcher = match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.dispatcher).await {
            Ok(Ok(stats)) => stats,
            Ok(Err(e)) => return Err(CliError::shutdown(format!("dispatcher task failed: {e}")).into()),
            Err(_) => {
                warn!(timeout = ?SHUTDOWN_TIMEOUT, "Dispatcher did not stop in time");
                return Err(CliError::shutdown("dispatcher did not stop in time").into());
            }
        };

        Ok(ProxyStats {
            duration: self.started.elapsed(),
            dispatcher,
            upstreams,
        })
    }
}
