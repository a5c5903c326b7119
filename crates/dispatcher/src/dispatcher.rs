//! Dispatcher - single control loop owning the subscriber set

use std::time::Duration;

use futures::future::join_all;
use slab::Slab;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use contracts::{Frame, FrameSink, ProxyConfig};
use observability::{RunningStats, StatsSummary};

use crate::error::DispatcherError;

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Deadline for each subscriber write, and for closing an evicted one
    pub write_timeout: Duration,
    /// Capacity of the inbound frame queue
    pub frame_queue: usize,
    /// Capacity of the new-subscriber queue
    pub subscriber_queue: usize,
    /// Hex-dump every frame at debug level
    pub dump_frames: bool,
    /// Periodic stats log (None = no tick)
    pub stats_interval: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(2),
            frame_queue: 16,
            subscriber_queue: 4,
            dump_frames: false,
            stats_interval: None,
        }
    }
}

impl DispatcherConfig {
    pub fn from_proxy(proxy: &ProxyConfig) -> Self {
        Self {
            write_timeout: proxy.write_timeout(),
            frame_queue: proxy.frame_queue,
            subscriber_queue: proxy.subscriber_queue,
            dump_frames: proxy.dump_frames,
            stats_interval: proxy.stats_interval(),
        }
    }
}

/// Snapshot published by the control loop after each broadcast pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatcherStats {
    /// Active subscribers after the last pass
    pub subscribers: usize,
    pub frames_broadcast: u64,
    pub subscribers_accepted: u64,
    pub subscribers_evicted: u64,
    /// Wall time of a broadcast pass, in milliseconds
    pub broadcast_ms: StatsSummary,
}

/// Sending side of the dispatcher, cloned into connectors and acceptors
pub struct DispatcherHandle<S> {
    frames: mpsc::Sender<Frame>,
    subscribers: mpsc::Sender<S>,
    stats: watch::Receiver<DispatcherStats>,
}

impl<S> Clone for DispatcherHandle<S> {
    fn clone(&self) -> Self {
        Self {
            frames: self.frames.clone(),
            subscribers: self.subscribers.clone(),
            stats: self.stats.clone(),
        }
    }
}

impl<S> DispatcherHandle<S> {
    pub fn frame_sender(&self) -> mpsc::Sender<Frame> {
        self.frames.clone()
    }

    pub fn subscriber_sender(&self) -> mpsc::Sender<S> {
        self.subscribers.clone()
    }

    /// Forward one frame, waiting while the queue is full
    pub async fn send_frame(&self, frame: Frame) -> Result<(), DispatcherError> {
        self.frames
            .send(frame)
            .await
            .map_err(|_| DispatcherError::Closed)
    }

    pub async fn add_subscriber(&self, subscriber: S) -> Result<(), DispatcherError> {
        self.subscribers
            .send(subscriber)
            .await
            .map_err(|_| DispatcherError::Closed)
    }

    /// Latest published snapshot
    pub fn stats(&self) -> DispatcherStats {
        self.stats.borrow().clone()
    }

    pub fn watch_stats(&self) -> watch::Receiver<DispatcherStats> {
        self.stats.clone()
    }
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig) -> Self {
        Self { config }
    }

    /// Create the control loop and its handle.
    ///
    /// The loop runs until every frame sender (handles and connectors) is
    /// dropped.
    pub fn build<S>(self) -> (Dispatcher<S>, DispatcherHandle<S>)
    where
        S: FrameSink + Send + 'static,
    {
        let (frames_tx, frames_rx) = mpsc::channel(self.config.frame_queue);
        let (subs_tx, subs_rx) = mpsc::channel(self.config.subscriber_queue);
        let (stats_tx, stats_rx) = watch::channel(DispatcherStats::default());

        let dispatcher = Dispatcher {
            config: self.config,
            subscribers: Slab::new(),
            frames_rx,
            subscribers_rx: subs_rx,
            stats_tx,
            stats: DispatcherStats::default(),
            broadcast_ms: RunningStats::default(),
        };
        let handle = DispatcherHandle {
            frames: frames_tx,
            subscribers: subs_tx,
            stats: stats_rx,
        };
        (dispatcher, handle)
    }
}

/// Fan-out control loop
///
/// Owns the subscriber set exclusively. Every write of a pass runs
/// concurrently under its own deadline; a subscriber whose write fails or
/// times out is closed and removed before the next frame.
pub struct Dispatcher<S> {
    config: DispatcherConfig,
    subscribers: Slab<S>,
    frames_rx: mpsc::Receiver<Frame>,
    subscribers_rx: mpsc::Receiver<S>,
    stats_tx: watch::Sender<DispatcherStats>,
    stats: DispatcherStats,
    broadcast_ms: RunningStats,
}

impl<S> Dispatcher<S>
where
    S: FrameSink + Send + 'static,
{
    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<DispatcherStats> {
        tokio::spawn(self.run())
    }

    /// Run the control loop; returns the final stats once the frame queue
    /// closes and every subscriber has been closed.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> DispatcherStats {
        info!(
            write_timeout = ?self.config.write_timeout,
            dump_frames = self.config.dump_frames,
            "Dispatcher started"
        );

        let mut tick = self.config.stats_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        let mut accepting = true;

        loop {
            tokio::select! {
                biased;

                subscriber = self.subscribers_rx.recv(), if accepting => match subscriber {
                    Some(subscriber) => self.register(subscriber),
                    None => {
                        debug!("subscriber queue closed");
                        accepting = false;
                    }
                },
                frame = self.frames_rx.recv() => match frame {
                    Some(frame) => self.broadcast(frame).await,
                    None => break,
                },
                _ = next_tick(&mut tick) => self.log_stats(),
            }
        }

        info!(
            frames = self.stats.frames_broadcast,
            "Dispatcher input closed, shutting down"
        );
        self.shutdown().await;
        info!("Dispatcher shutdown complete");

        self.stats
    }

    fn register(&mut self, subscriber: S) {
        let name = subscriber.name().to_string();
        self.subscribers.insert(subscriber);
        self.stats.subscribers_accepted += 1;
        observability::record_subscriber_accepted();
        info!(
            subscriber = %name,
            active = self.subscribers.len(),
            "subscriber registered"
        );
    }

    async fn broadcast(&mut self, frame: Frame) {
        if self.config.dump_frames {
            debug!(kind = %frame.kind(), frame = %frame.to_hex(), "relaying frame");
        }

        let started = Instant::now();
        let write_timeout = self.config.write_timeout;
        let frame = &frame;

        let writes = self.subscribers.iter_mut().map(|(key, subscriber)| async move {
            let result = match timeout(write_timeout, subscriber.write(frame)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(DispatcherError::write(subscriber.name(), e)),
                Err(_) => Err(DispatcherError::write_timeout(subscriber.name(), write_timeout)),
            };
            (key, result)
        });
        let failed: Vec<(usize, DispatcherError)> = join_all(writes)
            .await
            .into_iter()
            .filter_map(|(key, result)| result.err().map(|e| (key, e)))
            .collect();

        if !failed.is_empty() {
            let mut evicted = Vec::with_capacity(failed.len());
            for (key, err) in failed {
                let subscriber = self.subscribers.remove(key);
                warn!(subscriber = %subscriber.name(), error = %err, "subscriber evicted");
                observability::record_subscriber_evicted(err.reason());
                self.stats.subscribers_evicted += 1;
                evicted.push(subscriber);
            }
            close_all(evicted, write_timeout).await;
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.broadcast_ms.push(elapsed_ms);
        self.stats.frames_broadcast += 1;
        self.stats.subscribers = self.subscribers.len();
        self.stats.broadcast_ms = self.broadcast_ms.summary();
        observability::record_broadcast(self.stats.subscribers, elapsed_ms);
        self.stats_tx.send_replace(self.stats.clone());
    }

    fn log_stats(&self) {
        info!(
            subscribers = self.stats.subscribers,
            frames_broadcast = self.stats.frames_broadcast,
            subscribers_accepted = self.stats.subscribers_accepted,
            subscribers_evicted = self.stats.subscribers_evicted,
            broadcast_ms = %self.stats.broadcast_ms,
            "Dispatcher stats"
        );
    }

    async fn shutdown(&mut self) {
        let remaining: Vec<S> = self.subscribers.drain().collect();
        debug!(count = remaining.len(), "closing subscribers");
        close_all(remaining, self.config.write_timeout).await;

        self.stats.subscribers = 0;
        self.stats_tx.send_replace(self.stats.clone());
    }
}

async fn next_tick(tick: &mut Option<Interval>) {
    match tick {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Close subscribers concurrently, each bounded by `deadline`.
async fn close_all<S: FrameSink>(subscribers: Vec<S>, deadline: Duration) {
    let closes = subscribers.into_iter().map(|mut subscriber| async move {
        match timeout(deadline, subscriber.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(subscriber = %subscriber.name(), error = %e, "close failed"),
            Err(_) => debug!(subscriber = %subscriber.name(), "close timed out"),
        }
    });
    join_all(closes).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ContractError, FrameKind};
    use std::sync::{Arc, Mutex};
    use tokio::time::sleep;

    /// Mock sink for testing
    struct MockSink {
        name: String,
        received: Arc<Mutex<Vec<Frame>>>,
        closed: Arc<Mutex<bool>>,
        should_fail: bool,
        delay_ms: u64,
    }

    impl MockSink {
        fn new(name: &str) -> (Self, Arc<Mutex<Vec<Frame>>>, Arc<Mutex<bool>>) {
            let received = Arc::new(Mutex::new(Vec::new()));
            let closed = Arc::new(Mutex::new(false));
            let sink = Self {
                name: name.to_string(),
                received: Arc::clone(&received),
                closed: Arc::clone(&closed),
                should_fail: false,
                delay_ms: 0,
            };
            (sink, received, closed)
        }
    }

    impl FrameSink for MockSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, frame: &Frame) -> Result<(), ContractError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.should_fail {
                return Err(ContractError::subscriber_write(&self.name, "mock failure"));
            }
            self.received.lock().unwrap().push(frame.clone());
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    fn frame(n: u8) -> Frame {
        Frame::from_wire(
            FrameKind::ModeAc,
            bytes::Bytes::from(vec![0x1a, 0x31, 0, 0, 0, 0, 0, n, 0x20, n, n]),
        )
    }

    fn config(write_timeout_ms: u64) -> DispatcherConfig {
        DispatcherConfig {
            write_timeout: Duration::from_millis(write_timeout_ms),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_broadcast_to_all_subscribers() {
        let (dispatcher, handle) = DispatcherBuilder::new(config(1000)).build::<MockSink>();
        let task = dispatcher.spawn();

        let mut received = Vec::new();
        for name in ["a", "b", "c"] {
            let (sink, rx, _) = MockSink::new(name);
            handle.add_subscriber(sink).await.unwrap();
            received.push(rx);
        }
        for n in 0..5 {
            handle.send_frame(frame(n)).await.unwrap();
        }
        drop(handle);

        let stats = task.await.unwrap();
        assert_eq!(stats.frames_broadcast, 5);
        assert_eq!(stats.subscribers_accepted, 3);
        assert_eq!(stats.subscribers_evicted, 0);
        assert_eq!(stats.subscribers, 0);
        assert_eq!(stats.broadcast_ms.count, 5);

        let expected: Vec<Frame> = (0..5).map(frame).collect();
        for rx in received {
            assert_eq!(*rx.lock().unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_failed_write_evicts_only_that_subscriber() {
        let (dispatcher, handle) = DispatcherBuilder::new(config(1000)).build::<MockSink>();
        let task = dispatcher.spawn();

        let (good, good_rx, good_closed) = MockSink::new("good");
        let (mut bad, bad_rx, bad_closed) = MockSink::new("bad");
        bad.should_fail = true;
        handle.add_subscriber(good).await.unwrap();
        handle.add_subscriber(bad).await.unwrap();

        let mut stats = handle.watch_stats();
        handle.send_frame(frame(1)).await.unwrap();
        let snapshot = stats
            .wait_for(|s| s.frames_broadcast == 1)
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.subscribers, 1);
        assert_eq!(snapshot.subscribers_evicted, 1);
        assert!(*bad_closed.lock().unwrap());

        handle.send_frame(frame(2)).await.unwrap();
        drop(handle);
        task.await.unwrap();

        assert_eq!(*good_rx.lock().unwrap(), vec![frame(1), frame(2)]);
        assert!(bad_rx.lock().unwrap().is_empty());
        assert!(*good_closed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_slow_subscriber_times_out_without_delaying_others() {
        let (dispatcher, handle) = DispatcherBuilder::new(config(50)).build::<MockSink>();
        let task = dispatcher.spawn();

        let (fast, fast_rx, _) = MockSink::new("fast");
        let (mut slow, slow_rx, slow_closed) = MockSink::new("slow");
        slow.delay_ms = 5_000;
        handle.add_subscriber(fast).await.unwrap();
        handle.add_subscriber(slow).await.unwrap();

        let started = std::time::Instant::now();
        let mut stats = handle.watch_stats();
        handle.send_frame(frame(7)).await.unwrap();
        let snapshot = stats
            .wait_for(|s| s.frames_broadcast == 1)
            .await
            .unwrap()
            .clone();
        assert!(started.elapsed() < Duration::from_secs(2));

        assert_eq!(snapshot.subscribers, 1);
        assert_eq!(snapshot.subscribers_evicted, 1);
        assert_eq!(*fast_rx.lock().unwrap(), vec![frame(7)]);
        assert!(slow_rx.lock().unwrap().is_empty());
        assert!(*slow_closed.lock().unwrap());

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_writes_run_concurrently() {
        let (dispatcher, handle) = DispatcherBuilder::new(config(1000)).build::<MockSink>();
        let task = dispatcher.spawn();

        for name in ["s1", "s2", "s3", "s4"] {
            let (mut sink, _, _) = MockSink::new(name);
            sink.delay_ms = 300;
            handle.add_subscriber(sink).await.unwrap();
        }

        let started = std::time::Instant::now();
        let mut stats = handle.watch_stats();
        handle.send_frame(frame(1)).await.unwrap();
        stats.wait_for(|s| s.frames_broadcast == 1).await.unwrap();

        // Four sequential writes would take 1.2s and trip the deadline
        assert!(started.elapsed() < Duration::from_millis(900));
        assert_eq!(handle.stats().subscribers, 4);

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_broadcast_with_no_subscribers() {
        let (dispatcher, handle) = DispatcherBuilder::new(config(1000)).build::<MockSink>();
        let task = dispatcher.spawn();

        handle.send_frame(frame(1)).await.unwrap();
        drop(handle);

        let stats = task.await.unwrap();
        assert_eq!(stats.frames_broadcast, 1);
        assert_eq!(stats.subscribers, 0);
    }

    #[tokio::test]
    async fn test_stops_when_frame_senders_dropped() {
        let (dispatcher, handle) = DispatcherBuilder::new(DispatcherConfig {
            stats_interval: Some(Duration::from_millis(10)),
            ..config(1000)
        })
        .build::<MockSink>();
        let frames = handle.frame_sender();
        let subscribers = handle.subscriber_sender();
        drop(handle);

        let task = dispatcher.spawn();
        let (sink, _, closed) = MockSink::new("late");
        subscribers.send(sink).await.unwrap();
        sleep(Duration::from_millis(30)).await;

        // Subscriber senders alone do not keep the loop alive
        drop(frames);
        let stats = timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        assert_eq!(stats.subscribers_accepted, 1);
        assert!(*closed.lock().unwrap());

        // Closed dispatcher rejects new subscribers
        let (sink, _, _) = MockSink::new("after");
        assert!(subscribers.send(sink).await.is_err());
    }

    #[test]
    fn test_config_from_proxy() {
        let proxy = ProxyConfig {
            write_timeout_ms: 500,
            stats_interval_secs: 10,
            dump_frames: true,
            ..Default::default()
        };
        let config = DispatcherConfig::from_proxy(&proxy);
        assert_eq!(config.write_timeout, Duration::from_millis(500));
        assert_eq!(config.stats_interval, Some(Duration::from_secs(10)));
        assert!(config.dump_frames);
        assert_eq!(config.frame_queue, 16);
    }
}
