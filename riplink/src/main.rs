//! riplink - rip reconciliation service
//!
//! Keeps the linked MP3/FLAC library in step with the CD rip directory:
//! scans rips, rebuilds tagged links for catalog records, verifies track
//! counts and raises notifications for records that still need ripping.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use riplink::config::RuntimeConfig;
use riplink::db::SqliteStateStore;
use riplink::processor::{Collaborators, Processor};
use riplink::scheduler::spawn_scheduler;
use riplink::services::{
    ConversionQueue, HttpCatalog, HttpNotifier, LocalRipStore, ProcessCommandRunner,
};
use riplink::AppState;
use riplink_common::config::{database_path, resolve_root_folder, ROOT_FOLDER_ENV};

/// Pending conversion jobs held before `enqueue` starts waiting
const CONVERSION_QUEUE_CAPACITY: usize = 64;

/// Command-line arguments for riplink
#[derive(Parser, Debug)]
#[command(name = "riplink")]
#[command(about = "Links and tags CD rips into the music library")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to the user or system config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root folder holding the state database
    #[arg(short, long, env = ROOT_FOLDER_ENV)]
    root_folder: Option<String>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "RIPLINK_PORT")]
    port: Option<u16>,

    /// Run a single reconciliation cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = RuntimeConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.toml.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting riplink {}", env!("CARGO_PKG_VERSION"));

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config.toml);
    let db_path = database_path(&root_folder);
    info!("Database: {}", db_path.display());

    let pool = riplink_common::db::init_database(&db_path)
        .await
        .context("Failed to open state database")?;

    let cancel = CancellationToken::new();
    let paths = config.toml.paths.clone();
    let (jobs, conversion_worker) = ConversionQueue::start(CONVERSION_QUEUE_CAPACITY, cancel.clone());

    let collaborators = Collaborators {
        catalog: Arc::new(HttpCatalog::new(&config.toml.catalog).context("Failed to build catalog client")?),
        rips: Arc::new(LocalRipStore::new(&paths.rip_dir)),
        commands: Arc::new(ProcessCommandRunner::new()),
        jobs: Arc::new(jobs),
        notifier: Arc::new(
            HttpNotifier::new(&config.toml.notifier).context("Failed to build notifier client")?,
        ),
        store: Arc::new(SqliteStateStore::new(pool)),
    };

    let processor = Arc::new(Processor::new(collaborators, config.rules.clone(), paths));
    processor
        .initialize()
        .await
        .context("Failed to load reconciliation state")?;

    if args.once {
        let report = processor.run_cycle().await.context("Reconciliation cycle failed")?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        cancel.cancel();
        let _ = conversion_worker.await;
        return Ok(());
    }

    let scheduler = spawn_scheduler(
        processor.clone(),
        Duration::from_secs(config.toml.service.cycle_interval_secs),
        cancel.clone(),
    );

    let app = riplink::build_router(AppState::new(processor));

    let port = args.port.unwrap_or(config.toml.service.port);
    let addr: SocketAddr = format!("{}:{}", config.toml.service.bind_address, port)
        .parse()
        .context("Invalid bind address")?;

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .context("Server error")?;

    cancel.cancel();
    let _ = scheduler.await;
    let _ = conversion_worker.await;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM and cancels background tasks
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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

    cancel.cancel();
}
