//! Starlog server - main entry point
//!
//! Wires the connection registry, messaging services, processing
//! pipeline and HTTP/WebSocket surface together and runs the daemon.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use starlog_server::ai::gemini::GeminiClient;
use starlog_server::api;
use starlog_server::config::ServerConfig;
use starlog_server::logbook::LogEntryService;
use starlog_server::messaging::{DeliveryService, MessageFanout, MessageService};
use starlog_server::pipeline::PipelineRunner;
use starlog_server::storage::FsAudioStore;
use starlog_server::ws::ConnectionRegistry;

/// Command-line arguments for starlog-server
#[derive(Parser, Debug)]
#[command(name = "starlog-server")]
#[command(about = "Logbook and notification daemon for starlog")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "STARLOG_PORT")]
    port: Option<u16>,

    /// Root folder holding the database, audio files and starlog.toml
    #[arg(short, long)]
    root_folder: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "starlog=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let root_folder = starlog_common::config::resolve_root_folder(
        args.root_folder.as_deref(),
        "STARLOG_ROOT_FOLDER",
    )
    .context("Failed to resolve root folder")?;
    info!("Root folder: {}", root_folder.display());

    let config = ServerConfig::load(&root_folder).context("Failed to load configuration")?;
    let port = args.port.unwrap_or(config.port);

    let db = starlog_common::db::init_database(&config.database_path(&root_folder))
        .await
        .context("Failed to initialize database")?;

    // Connection registry and messaging services
    let registry = Arc::new(ConnectionRegistry::new());
    let delivery = DeliveryService::new(Arc::clone(&registry));
    let notifier = Arc::new(MessageFanout::new(db.clone(), delivery));
    let messages = Arc::new(MessageService::new(db.clone()));

    // Processing pipeline with the remote AI capabilities
    let gemini = Arc::new(
        GeminiClient::new(&config.ai).context("Failed to build AI capability client")?,
    );
    let audio_store = Arc::new(FsAudioStore::new(config.audio_path(&root_folder)));
    let pipeline = Arc::new(PipelineRunner::new(
        db.clone(),
        audio_store,
        gemini.clone(),
        gemini,
        notifier.clone(),
        config.pipeline_max_concurrent_runs,
        Duration::from_secs(config.ai.request_timeout_secs),
    ));

    let log_entries = Arc::new(LogEntryService::new(db.clone(), notifier, pipeline));

    let ctx = api::AppContext {
        db,
        registry,
        messages,
        log_entries,
    };
    let app = api::create_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
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
}
