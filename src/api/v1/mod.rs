//! Version 1 API endpoints

pub mod users;

use axum::{routing::get, Router};

use super::health;
use super::middleware::route_not_found;
use super::state::AppState;

/// Create v1 API router
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ping", get(health::ping))
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .method_not_allowed_fallback(route_not_found)
}
