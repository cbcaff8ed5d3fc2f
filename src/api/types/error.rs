//! API error type and the error envelope

use std::error::Error as StdError;

use axum::{
    extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::DomainError;

const GENERIC_SERVER_MESSAGE: &str = "Internal Server Error";

/// Body of every failed response
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<String>>,
}

/// Error returned by handlers and extractors
///
/// Rendering attaches the error to the response extensions so the
/// translation middleware can log it and decide whether to expose `chain`.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub errors: Option<Vec<String>>,
    /// Descriptions of the error and its causes, outermost first
    pub chain: Vec<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status,
            chain: vec![message.clone()],
            message,
            errors: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Attach individual messages, e.g. one per failed validation rule
    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn envelope(&self, include_stack: bool) -> ErrorEnvelope {
        ErrorEnvelope {
            success: false,
            message: self.message.clone(),
            errors: self.errors.clone(),
            stack: include_stack.then(|| self.chain.clone()),
        }
    }

    /// Render the envelope, optionally exposing the cause chain
    pub fn render(&self, include_stack: bool) -> Response {
        (self.status, Json(self.envelope(include_stack))).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.render(false);
        response.extensions_mut().insert(self);
        response
    }
}

fn cause_chain(err: &(dyn StdError + 'static)) -> Vec<String> {
    let mut chain = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let status = err.status_code();
        let message = match &err {
            DomainError::Validation { message }
            | DomainError::Conflict { message, .. }
            | DomainError::NotFound { message }
            | DomainError::Internal { message, .. } => message.clone(),
            // Store text stays server-side
            DomainError::Storage { .. }
            | DomainError::Cache { .. }
            | DomainError::Configuration { .. } => GENERIC_SERVER_MESSAGE.to_string(),
        };

        Self {
            status,
            message,
            errors: None,
            chain: cause_chain(&err),
        }
    }
}

macro_rules! impl_from_rejection {
    ($($rejection:ty),* $(,)?) => {
        $(
            impl From<$rejection> for ApiError {
                fn from(rejection: $rejection) -> Self {
                    let mut error = Self::new(rejection.status(), rejection.body_text());
                    error.chain = cause_chain(&rejection);
                    error
                }
            }
        )*
    };
}

impl_from_rejection!(JsonRejection, FormRejection, QueryRejection, PathRejection);

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status.as_u16(), self.message)
    }
}

impl StdError for ApiError {}
