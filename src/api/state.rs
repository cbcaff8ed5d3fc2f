//! Application state for shared services

use std::sync::Arc;
use std::time::Instant;

use crate::config::Environment;
use crate::domain::HealthProbe;
use crate::infrastructure::user::UserService;

/// Shared handles passed to every handler
#[derive(Clone)]
pub struct AppState {
    pub environment: Environment,
    pub users: Arc<UserService>,
    pub database: Arc<dyn HealthProbe>,
    pub cache: Arc<dyn HealthProbe>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        environment: Environment,
        users: Arc<UserService>,
        database: Arc<dyn HealthProbe>,
        cache: Arc<dyn HealthProbe>,
    ) -> Self {
        Self {
            environment,
            users,
            database,
            cache,
            started_at: Instant::now(),
        }
    }
}
