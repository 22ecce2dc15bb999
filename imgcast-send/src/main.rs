//! imgcast-send - Background daemon for scheduled image posts
//!
//! Sweeps the schedule at a fixed interval and publishes every post whose
//! posting time has passed.

use anyhow::Result;
use clap::Parser;
use libimgcast::{Config, ImgcastError, SchedulerEngine, SweepResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "imgcast-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled image posts")]
#[command(long_about = "\
imgcast-send - Background daemon for scheduled image posts

DESCRIPTION:
    imgcast-send is a long-running daemon that sweeps the imgcast schedule
    and publishes image posts once their posting time has passed.

    Each sweep visits bluesky, mastodon, twitter and instagram in that order.
    Published posts are removed from the schedule; posts that fail stay
    queued and are tried again on the next sweep.

USAGE:
    # Run in foreground (logs to stderr)
    imgcast-send

    # Run with custom poll interval
    imgcast-send --poll-interval 30

    # Run a single sweep and exit (e.g., from cron)
    imgcast-send --once

    # Enable verbose logging
    imgcast-send --verbose

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current sweep)

CONFIGURATION:
    Configuration file: ~/.config/imgcast/config.toml
    Database location: ~/.local/share/imgcast/schedule.db

    [scheduling]
    poll_interval = 60      # seconds between sweeps
    request_timeout = 30    # optional per-request deadline in seconds

LOGGING:
    IMGCAST_LOG_FORMAT  - text, json or pretty
    IMGCAST_LOG_LEVEL   - error, warn, info, debug or trace
    RUST_LOG            - full filter directive, overrides the level

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error (with --once: the sweep failed)
    2 - Configuration error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to sweep the schedule (default: 60)")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run one sweep and exit
    #[arg(long)]
    #[arg(help = "Run a single sweep and exit")]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libimgcast::logging::init_default(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("imgcast-send failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<ImgcastError>()
            .map(ImgcastError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let engine = SchedulerEngine::from_config(&config).await?;

    info!("imgcast-send daemon starting");

    if cli.once {
        sweep(&engine).await?;
        info!("imgcast-send: swept once, exiting");
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let poll_interval = cli
        .poll_interval
        .unwrap_or(config.scheduling.poll_interval)
        .max(1);
    info!("Poll interval: {}s", poll_interval);

    run_daemon_loop(&engine, poll_interval, shutdown).await;

    info!("imgcast-send daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| anyhow::anyhow!("Signal setup failed: {}", e))?;

    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            info!("Received shutdown signal, stopping after the current sweep...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> Result<()> {
    Ok(())
}

/// Main daemon loop
///
/// A failed sweep is logged and the loop carries on; failed posts are still
/// queued and the next sweep tries them again.
async fn run_daemon_loop(engine: &SchedulerEngine, poll_interval: u64, shutdown: Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        if let Err(e) = sweep(engine).await {
            error!("Error sweeping schedule: {}", e);
        }

        // Sleep until next poll (check shutdown every second)
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}

/// Run one sweep at the current time
async fn sweep(engine: &SchedulerEngine) -> libimgcast::Result<SweepResult> {
    let result = engine.run_due(chrono::Utc::now().timestamp()).await?;

    if result.successful_count > 0 || result.failed_count > 0 {
        info!(
            "Sweep finished: {} published, {} failed",
            result.successful_count, result.failed_count
        );
    }

    Ok(result)
}
