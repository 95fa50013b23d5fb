//! idlink-server - contact identity resolution microservice
//!
//! Configuration comes from the command line or environment; only
//! `DATABASE_URL` is required.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use idlink_common::config::{
    StoreConfig, DEFAULT_ACQUIRE_TIMEOUT_MS, DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_MAX_CONNECTIONS,
    DEFAULT_MAX_LOCK_WAIT_MS,
};
use idlink_common::db::SqliteContactStore;
use idlink_server::{build_router, AppState};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for idlink-server
#[derive(Parser, Debug)]
#[command(name = "idlink-server")]
#[command(about = "Contact identity resolution service")]
#[command(version)]
struct Args {
    /// Contact store connection string, e.g. sqlite://contacts.db?mode=rwc
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1", env = "IDLINK_BIND")]
    bind: std::net::IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = 3000, env = "PORT")]
    port: u16,

    /// Maximum pooled store connections
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS, env = "IDLINK_MAX_CONNECTIONS")]
    max_connections: u32,

    /// Connection acquisition timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_ACQUIRE_TIMEOUT_MS, env = "IDLINK_ACQUIRE_TIMEOUT_MS")]
    acquire_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_BUSY_TIMEOUT_MS, env = "IDLINK_BUSY_TIMEOUT_MS")]
    busy_timeout_ms: u64,

    /// Total time a contended transaction is retried, in milliseconds
    #[arg(long, default_value_t = DEFAULT_MAX_LOCK_WAIT_MS, env = "IDLINK_MAX_LOCK_WAIT_MS")]
    max_lock_wait_ms: u64,
}

impl Args {
    fn store_config(&self) -> StoreConfig {
        let mut config = StoreConfig::new(self.database_url.clone());
        config.max_connections = self.max_connections;
        config.acquire_timeout = Duration::from_millis(self.acquire_timeout_ms);
        config.busy_timeout = Duration::from_millis(self.busy_timeout_ms);
        config.max_lock_wait = Duration::from_millis(self.max_lock_wait_ms);
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "idlink_server=info,idlink_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Log build identification before touching the store
    info!(
        "Starting idlink-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let config = args.store_config();

    let store = SqliteContactStore::connect(&config)
        .await
        .context("Failed to open contact store")?;
    info!("✓ Connected to contact store");

    let state = AppState::new(store, config.max_lock_wait);
    let app = build_router(state);

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("idlink-server listening on http://{}", addr);

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
