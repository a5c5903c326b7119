//! TcpSubscriber - downstream connection receiving the frame stream

use std::io;
use std::net::Shutdown;
use std::time::Duration;

use contracts::{ContractError, Frame, FrameSink};
use socket2::{SockRef, TcpKeepalive};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Write-only sink over an accepted TCP connection
pub struct TcpSubscriber {
    name: String,
    stream: TcpStream,
}

impl TcpSubscriber {
    /// Wrap an accepted connection.
    ///
    /// The read side is shut down immediately; subscribers never send
    /// anything the proxy cares about.
    pub fn new(stream: TcpStream, keepalive: Duration) -> io::Result<Self> {
        let name = stream.peer_addr()?.to_string();

        let sock_ref = SockRef::from(&stream);
        sock_ref.shutdown(Shutdown::Read)?;
        set_keepalive(&sock_ref, keepalive)?;

        Ok(Self { name, stream })
    }
}

/// Enable keep-alive with the given idle time; zero turns it off
/// (the kernel rejects a zero `TCP_KEEPIDLE`).
fn set_keepalive(sock_ref: &SockRef<'_>, idle: Duration) -> io::Result<()> {
    if idle.is_zero() {
        return sock_ref.set_keepalive(false);
    }
    sock_ref.set_tcp_keepalive(&TcpKeepalive::new().with_time(idle))
}

impl FrameSink for TcpSubscriber {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, frame: &Frame) -> Result<(), ContractError> {
        self.stream
            .write_all(frame.as_bytes())
            .await
            .map_err(|e| ContractError::subscriber_write(&self.name, e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::FrameKind;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_write_then_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).await.unwrap();
            received
        });

        let (stream, peer) = listener.accept().await.unwrap();
        let mut sub = TcpSubscriber::new(stream, Duration::from_secs(60)).unwrap();
        assert_eq!(sub.name(), peer.to_string());

        let frame = Frame::from_wire(
            FrameKind::ModeAc,
            bytes::Bytes::from_static(&[0x1a, 0x31, 0, 0, 0, 0, 0, 1, 0x40, 0x12, 0x34]),
        );
        sub.write(&frame).await.unwrap();
        sub.write(&frame).await.unwrap();
        sub.close().await.unwrap();

        let received = client.await.unwrap();
        assert_eq!(received.len(), 2 * frame.len());
        assert_eq!(&received[..frame.len()], frame.as_bytes());
    }

    #[tokio::test]
    async fn test_keepalive_idle_time() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).await.unwrap();

        let (stream, _) = listener.accept().await.unwrap();
        let sub = TcpSubscriber::new(stream, Duration::from_secs(45)).unwrap();
        let sock_ref = SockRef::from(&sub.stream);
        assert!(sock_ref.keepalive().unwrap());
        assert_eq!(sock_ref.keepalive_time().unwrap(), Duration::from_secs(45));
    }

    #[tokio::test]
    async fn test_zero_keepalive_disables_probes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).await.unwrap();

        let (stream, _) = listener.accept().await.unwrap();
        let sub = TcpSubscriber::new(stream, Duration::ZERO).unwrap();
        assert!(!SockRef::from(&sub.stream).keepalive().unwrap());
    }
}
