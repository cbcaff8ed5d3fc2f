//! Health and ping endpoints

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

use super::state::AppState;
use crate::domain::HealthProbe;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub message: &'static str,
    pub environment: &'static str,
    pub uptime: String,
    pub database: ConnectionStatus,
    pub redis: ConnectionStatus,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub success: bool,
    pub message: &'static str,
}

async fn status_of(probe: &dyn HealthProbe) -> ConnectionStatus {
    match probe.probe().await {
        Ok(()) => ConnectionStatus::Connected,
        Err(e) => {
            tracing::warn!(error = %e, "Health probe failed");
            ConnectionStatus::Disconnected
        }
    }
}

/// Live status of both stores
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (database, redis) = tokio::join!(
        status_of(state.database.as_ref()),
        status_of(state.cache.as_ref())
    );

    Json(HealthResponse {
        success: true,
        message: "App is healthy",
        environment: state.environment.as_str(),
        uptime: format!("{}s", state.started_at.elapsed().as_secs()),
        database,
        redis,
        timestamp: Utc::now().to_rfc3339(),
    })
}

pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        success: true,
        message: "Pong",
    })
}
