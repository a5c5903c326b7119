//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// beast-proxy - Beast ADS-B aggregation proxy
#[derive(Parser, Debug)]
#[command(
    name = "beast-proxy",
    author,
    version,
    about = "Beast ADS-B aggregation proxy",
    long_about = "Connects to one or more Mode-S Beast receivers, decodes their frame \n\
                  streams and rebroadcasts every frame verbatim to all connected \n\
                  subscribers. Slow or dead subscribers are dropped without \n\
                  affecting the others."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "BEAST_PROXY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "BEAST_PROXY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the proxy
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON). Flags below override it.
    #[arg(short, long, env = "BEAST_PROXY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address for subscribers (repeatable)
    #[arg(long = "listen-address", env = "BEAST_PROXY_LISTEN", value_delimiter = ',')]
    pub listen_address: Vec<String>,

    /// Receiver to connect to, host:port (repeatable)
    #[arg(long, env = "BEAST_PROXY_REMOTES", value_delimiter = ',')]
    pub remote: Vec<String>,

    /// Hex-dump every relayed frame at debug level
    #[arg(long, alias = "dumpMessages")]
    pub dump_messages: bool,

    /// Prometheus exporter listen address (ip:port)
    #[arg(long, env = "BEAST_PROXY_METRICS_ADDRESS")]
    pub metrics_address: Option<String>,

    /// Log dispatcher stats every N seconds (0 = disabled)
    #[arg(long, env = "BEAST_PROXY_STATS_INTERVAL")]
    pub stats_interval: Option<u64>,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "beast-proxy.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "beast-proxy.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
