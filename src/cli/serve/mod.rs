//! Serve command - runs the HTTP server until a termination signal

pub mod shutdown;

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::config::AppConfig;
use crate::domain::GracefulClose;
use crate::infrastructure::cache::RedisConnector;
use crate::infrastructure::database::Database;
use crate::infrastructure::logging;
use crate::infrastructure::user::{MySqlUserRepository, UserService};

pub use shutdown::{drain_and_close, shutdown_signal, ShutdownOutcome};

/// Start every dependency in order, serve, then tear down in order
pub async fn run() -> anyhow::Result<ExitCode> {
    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);
    logging::install_panic_hook();
    info!(config = ?config, "Configuration loaded");

    let database = Arc::new(Database::new(&config.database));
    database
        .authenticate()
        .await
        .context("Database startup failed")?;
    info!("Database connection established");

    let cache = Arc::new(RedisConnector::new(&config.redis)?);
    cache.init().await.context("Cache startup failed")?;

    let repository = Arc::new(MySqlUserRepository::new(database.pool().clone()));
    let users = Arc::new(UserService::new(repository));
    let state = AppState::new(config.env, users, database.clone(), cache.clone());
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server running on port {} ({})", config.port, config.env);

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    let resources: [Arc<dyn GracefulClose>; 2] = [database, cache];

    Ok(drain_and_close(server, &resources).await.exit_code())
}
