//! fanwatchd
//!
//! Marks files, directories or mounts with fanotify and either logs every
//! access (`watch`) or answers open permission requests (`guard`).

mod cli;
mod config;
mod monitor;
mod policy;

use clap::Parser;
use cli::{Cli, Command};
use color_eyre::eyre::Result;
use config::Config;
use monitor::{Mode, Monitor};
use policy::Policy;
use tokio::sync::broadcast;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref())?
        .with_log_level(cli.log_level.clone())
        .with_buffer_size(cli.buffer_size);

    init_logging(&config.daemon.log_level)?;

    match cli.command {
        Command::Watch {
            paths,
            mount,
            events,
        } => {
            let config = config.with_paths(&paths, mount, &events);
            cmd_run(config, Mode::Watch).await
        }
        Command::Guard {
            paths,
            mount,
            allow_uids,
            default_verdict,
            audit,
        } => {
            let config = config
                .with_paths(&paths, mount, &[])
                .with_guard(&allow_uids, default_verdict, audit);
            let policy = Policy::from_config(&config.guard)?;
            cmd_run(config, Mode::Guard(policy)).await
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();

    Ok(())
}

async fn cmd_run(config: Config, mode: Mode) -> Result<()> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?mode,
        paths = config.watch.len(),
        "Starting fanwatchd"
    );

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

    // Set up signal handlers
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "Failed to install signal handlers");
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT");
            }
        }

        let _ = shutdown_tx.send(());
    });

    let monitor = Monitor::open(&config, mode, shutdown_rx)?;
    monitor.run().await?;

    tracing::info!("fanwatchd stopped");
    Ok(())
}
