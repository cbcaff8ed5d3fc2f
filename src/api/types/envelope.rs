//! Success envelope

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

/// Pagination block of a list response
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl PageMeta {
    /// Derives `total_pages`; a zero limit counts as one
    pub fn new(total: u64, page: u32, limit: u32) -> Self {
        let per_page = u64::from(limit.max(1));
        Self {
            total,
            page,
            limit,
            total_pages: total.div_ceil(per_page),
        }
    }

    pub fn with_total_pages(mut self, total_pages: u64) -> Self {
        self.total_pages = total_pages;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuccessEnvelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

/// Successful response in the standard envelope
#[derive(Debug)]
pub enum ApiResponse<T: Serialize = Value> {
    Body {
        status: StatusCode,
        envelope: SuccessEnvelope<T>,
    },
    NoContent,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::OK, message, data)
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::CREATED, message, data)
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self::Body {
            status,
            envelope: SuccessEnvelope {
                success: true,
                message: message.into(),
                data,
                meta: None,
            },
        }
    }

    pub fn paginated(message: impl Into<String>, data: T, meta: PageMeta) -> Self {
        let mut response = Self::ok(message, data);
        if let Self::Body { envelope, .. } = &mut response {
            envelope.meta = Some(meta);
        }
        response
    }
}

impl ApiResponse<Value> {
    /// Success with no payload; `data` renders as `{}`
    pub fn message(message: impl Into<String>) -> Self {
        Self::ok(message, Value::Object(Default::default()))
    }

    pub fn no_content() -> Self {
        Self::NoContent
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            Self::Body { status, envelope } => (status, Json(envelope)).into_response(),
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}
