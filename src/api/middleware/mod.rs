//! API middleware components

pub mod error_handler;
pub mod logging;
pub mod security;

pub use error_handler::{error_translation_middleware, handle_panic, route_not_found};
pub use logging::logging_middleware;
pub use security::{security_headers_middleware, MAX_BODY_SIZE};
