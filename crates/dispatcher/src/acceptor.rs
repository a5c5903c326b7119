//! InboundAcceptor - accept loop feeding new subscribers to the dispatcher

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::DispatcherError;
use crate::subscriber::TcpSubscriber;

/// Acceptor settings
#[derive(Debug, Clone)]
pub struct AcceptorConfig {
    /// Keep-alive period applied to every accepted socket
    pub keepalive: Duration,
    /// Fixed pause after a failed accept
    pub retry_pause: Duration,
}

impl Default for AcceptorConfig {
    fn default() -> Self {
        Self {
            keepalive: Duration::from_secs(60),
            retry_pause: Duration::from_secs(1),
        }
    }
}

/// Owns one listening socket
pub struct InboundAcceptor {
    listener: TcpListener,
    local_addr: SocketAddr,
    subscribers: mpsc::Sender<TcpSubscriber>,
    config: AcceptorConfig,
}

impl InboundAcceptor {
    /// Bind `addr`. A bind failure is a startup error.
    pub async fn bind(
        addr: &str,
        subscribers: mpsc::Sender<TcpSubscriber>,
        config: AcceptorConfig,
    ) -> Result<Self, DispatcherError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| DispatcherError::bind(addr, e))?;
        Self::from_listener(listener, subscribers, config).map_err(|e| DispatcherError::bind(addr, e))
    }

    pub fn from_listener(
        listener: TcpListener,
        subscribers: mpsc::Sender<TcpSubscriber>,
        config: AcceptorConfig,
    ) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            subscribers,
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Accept until the dispatcher stops taking subscribers.
    ///
    /// Accept errors never back off exponentially; they are usually
    /// transient resource exhaustion.
    #[instrument(name = "inbound_acceptor", skip(self), fields(listen = %self.local_addr))]
    pub async fn run(self) {
        info!("listening for subscribers");

        loop {
            let accepted = tokio::select! {
                r = self.listener.accept() => r,
                _ = self.subscribers.closed() => break,
            };

            match accepted {
                Ok((stream, peer)) => {
                    let subscriber = match TcpSubscriber::new(stream, self.config.keepalive) {
                        Ok(subscriber) => subscriber,
                        Err(e) => {
                            warn!(peer = %peer, error = %e, "failed to set up subscriber socket");
                            continue;
                        }
                    };
                    debug!(peer = %peer, "accepted subscriber");
                    if self.subscribers.send(subscriber).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, retry_in = ?self.config.retry_pause, "accept failed");
                    tokio::time::sleep(self.config.retry_pause).await;
                }
            }
        }

        info!("acceptor stopped");
    }
}
