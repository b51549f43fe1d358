//! trendmine-ingest: GitHub Trending ingestion and enrichment service
//!
//! Serves the read/admin API and runs the pipeline on a schedule. The
//! `run-once` subcommand performs a single run and prints its statistics.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trendmine_common::config as common_config;
use trendmine_common::db::init_database;
use trendmine_ingest::config::IngestConfig;
use trendmine_ingest::db::{ProjectFilter, ProjectRepository};
use trendmine_ingest::services::Scheduler;
use trendmine_ingest::{build_driver, build_router, AppState};

/// Command-line arguments for trendmine-ingest
#[derive(Parser, Debug)]
#[command(name = "trendmine-ingest")]
#[command(about = "GitHub Trending ingestion and LLM enrichment service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "TRENDMINE_PORT")]
    port: Option<u16>,

    /// Root folder holding the database (else TRENDMINE_ROOT_FOLDER, config, OS default)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML config file (else TRENDMINE_CONFIG, then the per-user default)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serve the API without the periodic scheduler
    #[arg(long)]
    no_scheduler: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline once with the configured filters and print statistics as JSON
    RunOnce,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = common_config::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "trendmine_ingest={0},trendmine_common={0},tower_http=info",
                    toml_config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting trendmine-ingest {}", env!("CARGO_PKG_VERSION"));

    let root_folder = common_config::resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let database_path = common_config::database_path(&root_folder, &toml_config);
    let mut config = IngestConfig::resolve(toml_config, database_path)
        .context("Invalid configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }

    if !config.openai_configured() {
        warn!("OpenAI API key not configured; every insight will be stored as failed until one is set");
    }

    info!("Database: {}", config.database_path.display());
    let pool = init_database(&config.database_path)
        .await
        .context("Failed to open database")?;

    let repo = ProjectRepository::new(pool, config.pipeline.max_lock_wait_ms);
    let driver = Arc::new(build_driver(&config, repo.clone()).context("Failed to build pipeline")?);
    let config = Arc::new(config);

    if let Some(Command::RunOnce) = args.command {
        let stats = driver.run(&config.default_run_request()).await;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let state = AppState::new(repo.clone(), Arc::clone(&driver), Arc::clone(&config));
    let cancel = CancellationToken::new();

    let scheduler = if args.no_scheduler {
        info!("Scheduler disabled");
        None
    } else {
        let empty = repo.count_projects(&ProjectFilter::default()).await? == 0;
        if empty {
            info!("Database is empty, first scrape starts now");
        }
        let scheduler = Scheduler::new(
            Arc::clone(&driver),
            config.default_run_request(),
            config.pipeline.scrape_interval,
            Arc::clone(&state.last_error),
        );
        Some(scheduler.spawn(empty, cancel.clone()))
    };

    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel.cancel();
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
