use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use rdsmon::config::Config;
use rdsmon::logs::CloudWatchLogSource;
use rdsmon::metadata::{RdsMetadata, ResourceIdCache};
use rdsmon::publish::CloudWatchPublisher;
use rdsmon::runner;

/// RDS Enhanced Monitoring metrics collector.
#[derive(Parser)]
#[command(name = "rdsmon", about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database instance identifier (overrides the config file).
    #[arg(short, long)]
    instance_id: Option<String>,

    /// Aggregation window, e.g. "1min" or "90s" (overrides the config
    /// file).
    #[arg(long, value_parser = humantime::parse_duration)]
    interval: Option<Duration>,

    /// Keep running, collecting once per interval.
    #[arg(long)]
    daemon: bool,

    /// Logging verbosity level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print version information and exit.
    Version,
}

/// Build-time version info.
mod version {
    /// Release version string (set at build time).
    pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

    /// Git commit hash (set at build time via env, or "unknown").
    pub fn git_commit() -> &'static str {
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    }

    /// Full version string with platform info.
    pub fn full() -> String {
        format!(
            "{} (commit: {}, {}/{})",
            RELEASE,
            git_commit(),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle version subcommand before anything else.
    if let Some(Command::Version) = &cli.command {
        println!("rdsmon {}", version::full());
        return Ok(());
    }

    // Initialize tracing.
    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;

    fmt().with_env_filter(filter).with_target(true).init();

    // Config file is optional; CLI flags fill in or override.
    let mut cfg = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(instance_id) = cli.instance_id {
        cfg.instance_id = instance_id;
    }

    if let Some(interval) = cli.interval {
        cfg.interval = interval;
    }

    cfg.validate()?;

    tracing::info!(
        version = version::RELEASE,
        commit = version::git_commit(),
        instance_id = %cfg.instance_id,
        "starting rdsmon",
    );

    // Build and run the tokio runtime.
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    rt.block_on(async { run(cfg, cli.daemon).await })
}

async fn run(cfg: Config, daemon: bool) -> Result<()> {
    let aws_cfg = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

    let metadata = RdsMetadata::new(aws_sdk_rds::Client::new(&aws_cfg));
    let logs = CloudWatchLogSource::new(
        aws_sdk_cloudwatchlogs::Client::new(&aws_cfg),
        cfg.log_group.clone(),
    );
    let publisher = CloudWatchPublisher::new(aws_sdk_cloudwatch::Client::new(&aws_cfg));

    if !daemon {
        let mut cache = ResourceIdCache::new();
        let summary = runner::run_once(&cfg, &metadata, &logs, &publisher, &mut cache).await?;

        tracing::info!(
            records = summary.records,
            rejected = summary.rejected,
            published = summary.published,
            "collection complete",
        );

        return Ok(());
    }

    // Daemon mode: collect on every tick until SIGINT/SIGTERM.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("received SIGINT, shutting down");
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
            }
        }

        signal_cancel.cancel();
    });

    runner::run_loop(&cfg, &metadata, &logs, &publisher, cancel).await?;

    tracing::info!("rdsmon stopped");

    Ok(())
}
