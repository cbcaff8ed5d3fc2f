//! API request/response types

mod envelope;
mod error;

pub use envelope::{ApiResponse, PageMeta, SuccessEnvelope};
pub use error::{ApiError, ErrorEnvelope};
