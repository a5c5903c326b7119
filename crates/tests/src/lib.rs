//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置到各组件配置的贯通
//! - 模拟接收机 -> 上游连接 -> 分发器 -> TCP 订阅者 的 e2e 测试
//! - 慢订阅者驱逐不影响其他订阅者

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use dispatcher::DispatcherConfig;
    use std::time::Duration;
    use upstream::ConnectorConfig;

    #[test]
    fn test_blueprint_flows_into_component_configs() {
        let toml = r#"
[proxy]
listen = ["127.0.0.1:30005", "[::1]:30005"]
write_timeout_ms = 500
dump_frames = true

[[upstreams]]
name = "roof"
addr = "10.0.0.2:30005"

[[upstreams]]
addr = "10.0.0.3:30005"

[backoff]
unit_ms = 250
max_ms = 8000
"#;
        let bp = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();

        let dispatcher = DispatcherConfig::from_proxy(&bp.proxy);
        assert_eq!(dispatcher.write_timeout, Duration::from_millis(500));
        assert!(dispatcher.dump_frames);

        let connectors: Vec<ConnectorConfig> = bp
            .upstreams
            .iter()
            .map(|u| ConnectorConfig::from_source(u, &bp.backoff, bp.proxy.keepalive()))
            .collect();
        assert_eq!(connectors[0].name, "roof");
        assert_eq!(connectors[1].name, "10.0.0.3:30005");
        assert_eq!(connectors[1].backoff.unit(), Duration::from_millis(250));
        assert_eq!(connectors[1].backoff.max(), Duration::from_secs(8));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use beast::{encode_frame, DecodeError, Decoded, Frame, FrameKind, FrameReader};
    use dispatcher::{
        AcceptorConfig, DispatcherBuilder, DispatcherConfig, DispatcherHandle, DispatcherStats,
        InboundAcceptor, TcpSubscriber,
    };
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpSocket, TcpStream};
    use tokio::task::JoinHandle;
    use tokio::time::{sleep, timeout};
    use upstream::{BackoffPolicy, ConnectorConfig, UpstreamConnector};

    struct Harness {
        handle: DispatcherHandle<TcpSubscriber>,
        dispatcher: JoinHandle<DispatcherStats>,
        acceptor: JoinHandle<()>,
        listen: SocketAddr,
    }

    impl Harness {
        async fn start(write_timeout: Duration) -> Self {
            let config = DispatcherConfig {
                write_timeout,
                ..Default::default()
            };
            let (dispatcher, handle) = DispatcherBuilder::new(config).build::<TcpSubscriber>();

            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let acceptor = InboundAcceptor::from_listener(
                listener,
                handle.subscriber_sender(),
                AcceptorConfig {
                    keepalive: Duration::from_secs(60),
                    retry_pause: Duration::from_millis(10),
                },
            )
            .unwrap();
            let listen = acceptor.local_addr();

            Self {
                handle,
                dispatcher: dispatcher.spawn(),
                acceptor: acceptor.spawn(),
                listen,
            }
        }

        fn connect_upstream(&self, addr: SocketAddr) -> JoinHandle<()> {
            let config = ConnectorConfig::new(addr.to_string()).with_backoff(BackoffPolicy::new(
                Duration::from_millis(10),
                Duration::from_millis(100),
            ));
            UpstreamConnector::new(config, self.handle.frame_sender()).spawn()
        }

        /// Stop accepting, drop every frame sender and wait for the final stats.
        async fn finish(self, connectors: Vec<JoinHandle<()>>) -> DispatcherStats {
            self.acceptor.abort();
            for c in &connectors {
                c.abort();
            }
            for c in connectors {
                let _ = c.await;
            }
            drop(self.handle);
            timeout(Duration::from_secs(10), self.dispatcher)
                .await
                .unwrap()
                .unwrap()
        }
    }

    fn frames(signal: u8, count: usize) -> Vec<Frame> {
        (0..count)
            .map(|i| {
                let kind = match i % 3 {
                    0 => FrameKind::ModeAc,
                    1 => FrameKind::ModeSShort,
                    _ => FrameKind::ModeSLong,
                };
                let payload: Vec<u8> = (0..kind.payload_len())
                    .map(|j| if j % 4 == 0 { 0x1a } else { (i + j) as u8 })
                    .collect();
                encode_frame(kind, i as u64 * 12_000, signal, &payload).unwrap()
            })
            .collect()
    }

    /// A receiver that serves `wire` to the first client, then idles.
    async fn fake_receiver(wire: Vec<u8>) -> (SocketAddr, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(&wire).await.unwrap();
            sleep(Duration::from_secs(30)).await;
        });
        (addr, task)
    }

    async fn read_frames(stream: TcpStream, count: usize) -> Vec<Vec<u8>> {
        let mut reader = FrameReader::new(stream);
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            match timeout(Duration::from_secs(5), reader.read()).await.unwrap() {
                Ok(Decoded::Frame(frame)) => out.push(frame.as_bytes().to_vec()),
                other => panic!("unexpected read result: {other:?}"),
            }
        }
        out
    }

    /// Receiver bytes (with leading garbage) reach every subscriber as the
    /// exact frame sequence.
    #[tokio::test]
    async fn test_relay_is_byte_identical() {
        let harness = Harness::start(Duration::from_secs(2)).await;

        let mut a = TcpStream::connect(harness.listen).await.unwrap();
        let mut b = TcpStream::connect(harness.listen).await.unwrap();
        sleep(Duration::from_millis(200)).await;

        let sent = frames(0x40, 60);
        let expected: Vec<u8> = sent.iter().flat_map(|f| f.as_bytes().to_vec()).collect();

        let mut wire = vec![0x00, 0x01, 0x02];
        wire.extend_from_slice(&expected);
        let (receiver, _receiver_task) = fake_receiver(wire).await;
        let connector = harness.connect_upstream(receiver);

        for client in [&mut a, &mut b] {
            let mut buf = vec![0u8; expected.len()];
            timeout(Duration::from_secs(5), client.read_exact(&mut buf))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(buf, expected);
        }

        let stats = harness.finish(vec![connector]).await;
        assert_eq!(stats.frames_broadcast, 60);
        assert_eq!(stats.subscribers_accepted, 2);
        assert_eq!(stats.subscribers_evicted, 0);

        // Clients see EOF once the dispatcher closes them
        let mut rest = Vec::new();
        assert_eq!(a.read_to_end(&mut rest).await.unwrap(), 0);
    }

    /// Frames from several receivers interleave only at frame boundaries.
    #[tokio::test]
    async fn test_multiple_upstreams_merge() {
        let harness = Harness::start(Duration::from_secs(2)).await;

        let client = TcpStream::connect(harness.listen).await.unwrap();
        sleep(Duration::from_millis(200)).await;

        let first = frames(0x11, 100);
        let second = frames(0x22, 100);
        let mut expected: Vec<Vec<u8>> = first
            .iter()
            .chain(second.iter())
            .map(|f| f.as_bytes().to_vec())
            .collect();

        let mut connectors = Vec::new();
        for batch in [&first, &second] {
            let wire: Vec<u8> = batch.iter().flat_map(|f| f.as_bytes().to_vec()).collect();
            let (addr, _) = fake_receiver(wire).await;
            connectors.push(harness.connect_upstream(addr));
        }

        let mut received = read_frames(client, expected.len()).await;
        received.sort();
        expected.sort();
        assert_eq!(received, expected);

        let stats = harness.finish(connectors).await;
        assert_eq!(stats.frames_broadcast, 200);
    }

    /// A subscriber that never reads is evicted; the reading one keeps
    /// receiving every frame.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stalled_subscriber_is_evicted() {
        let harness = Harness::start(Duration::from_millis(500)).await;

        let reader = TcpStream::connect(harness.listen).await.unwrap();
        let stalled_socket = TcpSocket::new_v4().unwrap();
        stalled_socket.set_recv_buffer_size(4096).unwrap();
        let _stalled = stalled_socket.connect(harness.listen).await.unwrap();
        sleep(Duration::from_millis(200)).await;

        let reader_task = tokio::spawn(async move {
            let mut reader = FrameReader::new(reader);
            let mut count = 0u64;
            loop {
                match reader.read().await {
                    Ok(Decoded::Frame(_)) => count += 1,
                    Err(DecodeError::EndOfStream) => break count,
                    other => panic!("unexpected read result: {other:?}"),
                }
            }
        });

        let frame = frames(0x7f, 3).pop().unwrap();
        let mut sent = 0u64;
        let outcome = timeout(Duration::from_secs(60), async {
            loop {
                harness.handle.send_frame(frame.clone()).await.unwrap();
                sent += 1;
                if sent % 512 == 0 && harness.handle.stats().subscribers_evicted > 0 {
                    break;
                }
            }
        })
        .await;
        assert!(outcome.is_ok(), "stalled subscriber was never evicted");

        // Relaying continues for the healthy subscriber
        for _ in 0..100 {
            harness.handle.send_frame(frame.clone()).await.unwrap();
            sent += 1;
        }

        let stats = harness.finish(Vec::new()).await;
        assert_eq!(stats.subscribers_evicted, 1);
        assert_eq!(stats.frames_broadcast, sent);

        let received = timeout(Duration::from_secs(10), reader_task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, sent);
    }
}
