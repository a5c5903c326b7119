//! 代理指标记录模块
//!
//! 所有序列以 `beast_proxy_` 为前缀。未安装 recorder 时这些调用为空操作。

use metrics::{counter, gauge, histogram};

/// 记录上游转发的一帧
pub fn record_frame_received(upstream: &str) {
    counter!(
        "beast_proxy_frames_received_total",
        "upstream" => upstream.to_string()
    )
    .increment(1);
}

/// 记录被跳过的未知类型帧
pub fn record_frame_skipped(upstream: &str) {
    counter!(
        "beast_proxy_frames_skipped_total",
        "upstream" => upstream.to_string()
    )
    .increment(1);
}

/// 记录帧格式错误
pub fn record_framing_error(upstream: &str, kind: &'static str) {
    counter!(
        "beast_proxy_framing_errors_total",
        "upstream" => upstream.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// 记录一次拨号结果
pub fn record_connect(upstream: &str, success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!(
        "beast_proxy_upstream_connects_total",
        "upstream" => upstream.to_string(),
        "result" => result
    )
    .increment(1);
}

/// 记录一次广播
///
/// `subscribers` 为广播结束后(驱逐之后)的订阅者数量快照。
pub fn record_broadcast(subscribers: usize, elapsed_ms: f64) {
    counter!("beast_proxy_frames_broadcast_total").increment(1);
    gauge!("beast_proxy_subscribers").set(subscribers as f64);
    histogram!("beast_proxy_broadcast_ms").record(elapsed_ms);
}

/// 记录新订阅者
pub fn record_subscriber_accepted() {
    counter!("beast_proxy_subscribers_accepted_total").increment(1);
}

/// 记录订阅者驱逐
pub fn record_subscriber_evicted(reason: &'static str) {
    counter!(
        "beast_proxy_subscribers_evicted_total",
        "reason" => reason
    )
    .increment(1);
}

/// 统计摘要
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
    }
}
