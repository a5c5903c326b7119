//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::ProxyBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    listen: Vec<String>,
    upstreams: Vec<UpstreamInfo>,
    broadcast: BroadcastInfo,
    backoff: BackoffInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<String>,
}

#[derive(Serialize)]
struct UpstreamInfo {
    name: String,
    addr: String,
}

#[derive(Serialize)]
struct BroadcastInfo {
    write_timeout_ms: u64,
    frame_queue: usize,
    subscriber_queue: usize,
    keepalive_secs: u64,
    dump_frames: bool,
}

#[derive(Serialize)]
struct BackoffInfo {
    unit_ms: u64,
    max_ms: u64,
    log_interval_secs: u64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let json = serde_json::to_string_pretty(&build_config_info(&blueprint))
            .context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn build_config_info(blueprint: &ProxyBlueprint) -> ConfigInfo {
    let proxy = &blueprint.proxy;
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        listen: proxy.listen.clone(),
        upstreams: blueprint
            .upstreams
            .iter()
            .map(|u| UpstreamInfo {
                name: u.display_name().to_string(),
                addr: u.addr.clone(),
            })
            .collect(),
        broadcast: BroadcastInfo {
            write_timeout_ms: proxy.write_timeout_ms,
            frame_queue: proxy.frame_queue,
            subscriber_queue: proxy.subscriber_queue,
            keepalive_secs: proxy.keepalive_secs,
            dump_frames: proxy.dump_frames,
        },
        backoff: BackoffInfo {
            unit_ms: blueprint.backoff.unit_ms,
            max_ms: blueprint.backoff.max_ms,
            log_interval_secs: blueprint.backoff.log_interval_secs,
        },
        metrics: blueprint.metrics.as_ref().map(|m| m.listen.clone()),
    }
}

fn print_config_info(blueprint: &ProxyBlueprint) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Beast Proxy Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let proxy = &blueprint.proxy;
    println!("📥 Listeners ({})", proxy.listen.len());
    for (i, addr) in proxy.listen.iter().enumerate() {
        let prefix = if i == proxy.listen.len() - 1 { "└─" } else { "├─" };
        println!("   {} {}", prefix, addr);
    }

    println!("\n📡 Upstreams ({})", blueprint.upstreams.len());
    for (i, upstream) in blueprint.upstreams.iter().enumerate() {
        let prefix = if i == blueprint.upstreams.len() - 1 { "└─" } else { "├─" };
        if upstream.name.is_some() {
            println!("   {} {} ({})", prefix, upstream.display_name(), upstream.addr);
        } else {
            println!("   {} {}", prefix, upstream.addr);
        }
    }

    println!("\n⚙️  Broadcast");
    println!("   ├─ Write timeout: {} ms", proxy.write_timeout_ms);
    println!("   ├─ Frame queue: {}", proxy.frame_queue);
    println!("   ├─ Keep-alive: {} s", proxy.keepalive_secs);
    println!("   └─ Dump frames: {}", proxy.dump_frames);

    let backoff = &blueprint.backoff;
    println!("\n🔁 Reconnect");
    println!("   ├─ Unit: {} ms", backoff.unit_ms);
    println!("   ├─ Max: {} ms", backoff.max_ms);
    println!("   └─ Failure log interval: {} s", backoff.log_interval_secs);

    match &blueprint.metrics {
        Some(metrics) => println!("\n📊 Metrics: http://{}/metrics", metrics.listen),
        None => println!("\n📊 Metrics: disabled"),
    }

    println!();
}
