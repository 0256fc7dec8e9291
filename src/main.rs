//! Rankgate service binary
//!
//! Wires the browser engine, tab pool, task queue and HTTP server together
//! and runs until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rankgate::browser::chromium::ChromiumEngine;
use rankgate::config::{Config, LogFormat, LogLevel};
use rankgate::http::{AppState, HttpServer};
use rankgate::pool::SessionPool;
use rankgate::queue::TaskQueue;
use rankgate::scrape::ProfileFetcher;
use rankgate::seasons::SeasonService;

#[derive(Parser)]
#[command(name = "rankgate")]
#[command(about = "Challenge-aware scraping gateway for competitive player profiles")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Listen address override
    #[arg(short, long)]
    listen: Option<String>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(config: &Config, verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => config.logging.level,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    let filter = EnvFilter::try_new(level.as_str())
        .with_context(|| format!("Invalid log level '{level}'"))?;

    match config.logging.format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };
    if let Some(listen) = cli.listen {
        config.http.listen_addr = listen;
    }
    config.validate()?;
    config.seasons.resolve_api_key();

    init_logging(&config, cli.verbose)?;

    info!("Starting rankgate");

    // The browser comes up before the listener: a request that arrives
    // while Chrome is still starting would only fail anyway.
    let engine = Arc::new(
        ChromiumEngine::launch(&config.browser)
            .await
            .context("Failed to launch browser")?,
    );

    let pool = SessionPool::new(engine, config.pool.clone());
    pool.watch_engine();

    let seasons = SeasonService::new(config.seasons.clone()).into_shared();
    let fetcher = ProfileFetcher::new(Arc::clone(&pool), config.fetch.clone(), seasons)
        .context("Failed to build fetcher")?;

    // One worker per tab keeps the queue from admitting more work than the
    // pool can serve.
    let queue = TaskQueue::start(Arc::new(fetcher), config.pool.capacity);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            let _ = shutdown_tx.send(());
        }
    });

    let server = HttpServer::new(
        config.http.clone(),
        AppState {
            queue,
            pool,
        },
    );
    server.run(shutdown_rx).await
}
