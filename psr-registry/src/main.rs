//! psr-registry - Pitch Score Registry service
//!
//! Serves the write-once score registry over HTTP. The authorized writer is
//! fixed by configuration at startup.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use psr_common::api::load_shared_secret;
use psr_common::config::{load_toml_config, ConfigOverrides, RegistryConfig};
use psr_common::db::init_database;
use psr_common::events::EventBus;
use psr_common::{Clock, SystemClock};
use psr_registry::{
    build_router, AccessController, AppState, MemoryJournal, ScoreJournal, ScoreStore,
    SqliteJournal,
};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "psr-registry")]
#[command(about = "Write-once pitch score registry")]
#[command(version)]
struct Args {
    /// Path to config.toml (default: platform config dir, then /etc/psr)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root folder holding the registry database
    #[arg(short, long, env = "PSR_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Identity of the single authorized writer
    #[arg(long, env = "PSR_OWNER")]
    owner: Option<String>,

    /// Address to bind
    #[arg(long, env = "PSR_BIND")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PSR_PORT")]
    port: Option<u16>,

    /// Per-subscriber buffer of the live event stream
    #[arg(long)]
    event_capacity: Option<usize>,

    /// Maximum accepted age of a signed request, in milliseconds
    #[arg(long)]
    auth_window_ms: Option<i64>,

    /// Keep records in memory only
    #[arg(long)]
    ephemeral: bool,

    /// API shared secret (0 disables request authentication)
    #[arg(long, env = "PSR_SHARED_SECRET")]
    shared_secret: Option<i64>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            root_folder: self.root_folder.clone(),
            owner: self.owner.clone(),
            bind_addr: self.bind.clone(),
            port: self.port,
            event_capacity: self.event_capacity,
            auth_window_ms: self.auth_window_ms,
            ephemeral: self.ephemeral.then_some(true),
            shared_secret: self.shared_secret,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "psr_registry=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Pitch Score Registry (psr-registry) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let file_config =
        load_toml_config(args.config.as_deref()).context("Failed to load configuration")?;
    let config = RegistryConfig::resolve(args.overrides(), file_config)
        .context("Invalid configuration")?;

    info!("Authorized writer: {}", config.owner);

    let (journal, stored_secret): (Arc<dyn ScoreJournal>, Option<i64>) = if config.ephemeral {
        warn!("Ephemeral mode: records will not survive a restart");
        (Arc::new(MemoryJournal::new()), None)
    } else {
        let db_path = config.database_path();
        info!("Database path: {}", db_path.display());

        let pool = init_database(&db_path)
            .await
            .context("Failed to initialize database")?;

        let secret = match config.shared_secret {
            Some(_) => None,
            None => Some(
                load_shared_secret(&pool)
                    .await
                    .context("Failed to load API shared secret")?,
            ),
        };

        (Arc::new(SqliteJournal::new(pool)), secret)
    };

    let shared_secret = config.shared_secret.or(stored_secret).unwrap_or(0);
    if shared_secret == 0 {
        warn!("API authentication disabled (shared_secret = 0)");
        warn!("Any client naming the owner identity can record scores; /api/registry will not list the owner");
    } else {
        info!("Loaded shared secret for API authentication");
    }

    let events = EventBus::new(config.event_capacity);
    let store = ScoreStore::open(
        AccessController::initialize(config.owner.clone()),
        journal,
        events,
    )
    .await
    .context("Failed to open score store")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = AppState::new(
        Arc::new(store),
        clock,
        shared_secret,
        config.auth_window_ms,
    );
    let app = build_router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("psr-registry listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

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
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
