//! Migrate command - applies the embedded migrations

use anyhow::Context;
use tracing::info;

use crate::config::AppConfig;
use crate::infrastructure::database::Database;
use crate::infrastructure::logging;

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    let database = Database::new(&config.database);
    database
        .authenticate()
        .await
        .context("Database is not reachable")?;

    database.migrate().await.context("Migration failed")?;
    info!("Migrations applied");

    database.close().await;
    Ok(())
}
