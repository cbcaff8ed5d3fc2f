//! Centralized error translation
//!
//! Handlers and extractors fail with [`ApiError`], which rides along in the
//! response extensions. This layer logs it once and renders the final
//! envelope, exposing the cause chain only outside production.

use std::any::Any;

use axum::{
    body::Body,
    extract::{OriginalUri, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};

use crate::api::state::AppState;
use crate::api::types::ApiError;

pub async fn error_translation_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let mut response = next.run(request).await;

    let Some(api_error) = response.extensions_mut().remove::<ApiError>() else {
        return response;
    };

    if api_error.status.is_server_error() {
        error!(chain = ?api_error.chain, "[{}] {} - {}", method, uri, api_error.message);
    } else {
        warn!("[{}] {} - {}", method, uri, api_error.message);
    }

    api_error.render(!state.environment.is_production())
}

/// Fallback for unmatched routes, and for known paths hit with an
/// unsupported method
pub async fn route_not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::not_found(format!("Route {} not found", uri))
}

/// Turns a handler panic into a 500 envelope
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());

    error!(panic = %detail, "Request handler panicked");

    ApiError::internal("Internal Server Error").render(false)
}
