//! Proxy orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::Proxy;
pub use stats::ProxyStats;
