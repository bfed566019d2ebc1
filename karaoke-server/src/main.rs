//! Karaoke server (karaoke-server) - Main entry point
//!
//! Serves the request queue, playback coordination, settings and video
//! conversion over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use karaoke_common::config::{
    load_toml_config_or_default, prepare_root_folder, resolve_root_folder,
};
use karaoke_common::db::init_database;
use karaoke_server::{build_router, AppState};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PORT: u16 = 5080;
const DEFAULT_BIND: &str = "0.0.0.0";
const DEFAULT_LOG_FILTER: &str = "karaoke_server=debug,karaoke_common=info,tower_http=debug";

/// Command-line arguments for karaoke-server
#[derive(Parser, Debug)]
#[command(name = "karaoke-server")]
#[command(about = "Song queue and playback coordination for karaoke venues")]
#[command(version)]
struct Args {
    /// Port to listen on [default: 5080]
    #[arg(short, long, env = "KARAOKE_PORT")]
    port: Option<u16>,

    /// Address to bind [default: 0.0.0.0]
    #[arg(short, long, env = "KARAOKE_BIND")]
    bind: Option<String>,

    /// Root folder for the database and default media folders
    #[arg(short, long, env = "KARAOKE_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Database file (defaults to <root>/karaoke.db)
    #[arg(short, long, env = "KARAOKE_DATABASE")]
    database: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "KARAOKE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (toml_config, config_source) = load_toml_config_or_default(args.config.as_deref());

    // RUST_LOG wins over the TOML level
    let default_filter = toml_config
        .logging
        .level
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting karaoke-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    config_source.log();

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let default_db_path = prepare_root_folder(&root_folder)
        .with_context(|| format!("Failed to prepare root folder {}", root_folder.display()))?;
    let db_path = args.database.unwrap_or(default_db_path);
    info!("Root folder: {}", root_folder.display());
    info!("Database: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let state = AppState::new(pool, &root_folder);
    state
        .settings
        .seed_defaults()
        .await
        .context("Failed to seed default settings")?;

    let app = build_router(state);

    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let bind = args
        .bind
        .or(toml_config.bind)
        .unwrap_or_else(|| DEFAULT_BIND.to_string());
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

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
