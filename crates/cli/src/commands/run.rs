//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::{MetricsConfig, ProxyBlueprint, UpstreamSource};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::Proxy;

/// Execute the `run` command
pub async fn run_proxy(args: &RunArgs) -> Result<()> {
    let blueprint = load_blueprint(args)?;

    info!(
        listen = ?blueprint.proxy.listen,
        upstreams = ?blueprint.upstreams.iter().map(|u| u.addr.as_str()).collect::<Vec<_>>(),
        write_timeout_ms = blueprint.proxy.write_timeout_ms,
        dump_frames = blueprint.proxy.dump_frames,
        metrics = ?blueprint.metrics.as_ref().map(|m| m.listen.as_str()),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        println!("=== Effective Configuration ===\n");
        println!("{}", config_loader::ConfigLoader::to_toml(&blueprint)?);
        return Ok(());
    }

    let proxy = Proxy::start(&blueprint)
        .await
        .context("Proxy startup failed")?;

    setup_shutdown_signal().await;
    warn!("Received shutdown signal, stopping proxy...");

    let stats = proxy.shutdown().await?;
    info!(
        frames_received = stats.frames_received(),
        frames_broadcast = stats.dispatcher.frames_broadcast,
        subscribers_evicted = stats.dispatcher.subscribers_evicted,
        duration_secs = stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.fps()),
        "Proxy stopped"
    );
    stats.print_summary();

    Ok(())
}

/// Build the effective configuration: file (or defaults), then flags, then validation.
fn load_blueprint(args: &RunArgs) -> Result<ProxyBlueprint> {
    let mut blueprint = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration");
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()).into());
            }
            config_loader::ConfigLoader::parse_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => ProxyBlueprint::default(),
    };

    apply_overrides(&mut blueprint, args);

    config_loader::ConfigLoader::validate(&blueprint).map_err(CliError::from)?;
    Ok(blueprint)
}

/// Flags replace (not extend) the corresponding file settings
fn apply_overrides(blueprint: &mut ProxyBlueprint, args: &RunArgs) {
    if !args.listen_address.is_empty() {
        info!(listen = ?args.listen_address, "Overriding listen addresses from CLI");
        blueprint.proxy.listen = args.listen_address.clone();
    }
    if !args.remote.is_empty() {
        info!(remotes = ?args.remote, "Overriding upstreams from CLI");
        blueprint.upstreams = args.remote.iter().map(UpstreamSource::new).collect();
    }
    if args.dump_messages {
        blueprint.proxy.dump_frames = true;
    }
    if let Some(ref addr) = args.metrics_address {
        blueprint.metrics = Some(MetricsConfig {
            listen: addr.clone(),
        });
    }
    if let Some(secs) = args.stats_interval {
        blueprint.proxy.stats_interval_secs = secs;
    }
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &ProxyBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Listen:");
    for addr in &blueprint.proxy.listen {
        println!("  - {addr}");
    }

    println!("\nUpstreams ({}):", blueprint.upstreams.len());
    for upstream in &blueprint.upstreams {
        println!("  - {} ({})", upstream.display_name(), upstream.addr);
    }

    println!("\nBroadcast:");
    println!("  Write timeout: {} ms", blueprint.proxy.write_timeout_ms);
    println!("  Dump frames: {}", blueprint.proxy.dump_frames);

    println!("\nBackoff:");
    println!("  Unit: {} ms", blueprint.backoff.unit_ms);
    println!("  Max: {} ms", blueprint.backoff.max_ms);

    if let Some(ref metrics) = blueprint.metrics {
        println!("\nMetrics: {}", metrics.listen);
    }

    println!();
}
