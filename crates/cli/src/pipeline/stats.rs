//! Proxy run statistics.

use std::time::Duration;

use dispatcher::DispatcherStats;
use upstream::MetricsSnapshot;

/// Statistics from a proxy run
#[derive(Debug, Clone, Default)]
pub struct ProxyStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Final dispatcher snapshot
    pub dispatcher: DispatcherStats,

    /// Counters per upstream, in configuration order
    pub upstreams: Vec<(String, MetricsSnapshot)>,
}

impl ProxyStats {
    /// Frames broadcast per second
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.dispatcher.frames_broadcast as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Total frames received across all upstreams
    pub fn frames_received(&self) -> u64 {
        self.upstreams.iter().map(|(_, m)| m.frames_received).sum()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Proxy Statistics                         ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        let d = &self.dispatcher;
        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Frames received: {}", self.frames_received());
        println!("   ├─ Frames broadcast: {}", d.frames_broadcast);
        println!("   ├─ FPS: {:.2}", self.fps());
        println!("   └─ Broadcast pass (ms): {}", d.broadcast_ms);

        println!("\n📤 Subscribers");
        println!("   ├─ Accepted: {}", d.subscribers_accepted);
        println!("   └─ Evicted: {}", d.subscribers_evicted);

        if !self.upstreams.is_empty() {
            println!("\n📡 Upstreams ({})", self.upstreams.len());
            for (i, (name, m)) in self.upstreams.iter().enumerate() {
                let prefix = if i == self.upstreams.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: {} frames, {} skipped, {} framing errors, {} connects ({} failed), {} disconnects",
                    prefix,
                    name,
                    m.frames_received,
                    m.frames_skipped,
                    m.framing_errors,
                    m.connects,
                    m.connect_failures,
                    m.disconnects
                );
            }
        }

        println!();
    }
}
