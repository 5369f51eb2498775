use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use slurmwatch::shutdown::install_shutdown_handler;
use slurmwatch::{report, Engine, Settings};

#[derive(Parser, Debug)]
#[command(name = "slurmwatch")]
#[command(about = "Keep a live snapshot of Slurm cluster, queue and configuration state")]
struct Args {
    /// Seconds between refreshes of each facet (overrides the settings file)
    #[arg(short, long)]
    delay: Option<u64>,

    /// Timeout in seconds for each status command
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Path to a TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Refresh every facet once, export the snapshot to a JSON file and exit
    #[arg(short, long)]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let settings = Settings::load(args.config.as_deref())?.with_overrides(args.delay, args.timeout);
    let engine = settings.engine_builder()?.build();
    let shutdown = install_shutdown_handler().context("failed to install signal handlers")?;

    match args.export {
        Some(path) => export_once(&engine, &path, &shutdown).await,
        None => watch(&engine, &shutdown).await,
    }
}

/// Log a summary line for every published snapshot until a shutdown signal.
async fn watch(engine: &Engine, shutdown: &CancellationToken) -> Result<()> {
    let mut updates = engine.subscribe();
    engine.start();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            next = updates.next() => match next {
                Some(snapshot) => {
                    tracing::info!("{}", report::summary_line(&snapshot));
                    for facet in snapshot.stale_facets() {
                        if let Some(error) = &snapshot.status(facet).last_error {
                            tracing::warn!(%facet, %error, "showing stale data");
                        }
                    }
                }
                None => break,
            },
        }
    }

    engine.stop().await;
    Ok(())
}

/// Wait until every facet has been attempted once, then write the snapshot.
async fn export_once(engine: &Engine, path: &Path, shutdown: &CancellationToken) -> Result<()> {
    let mut updates = engine.subscribe();
    engine.start();

    let mut snapshot = engine.current();
    while !snapshot.all_attempted() {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            next = updates.next() => match next {
                Some(next) => snapshot = next,
                None => break,
            },
        }
    }
    engine.stop().await;

    if !snapshot.all_attempted() {
        anyhow::bail!("interrupted before every facet was refreshed");
    }
    report::write_export(path, &snapshot)?;
    tracing::info!(path = %path.display(), sequence = snapshot.sequence, "exported snapshot");
    Ok(())
}
