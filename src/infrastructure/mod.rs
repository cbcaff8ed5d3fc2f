//! Infrastructure layer - store connectors and service implementations

pub mod cache;
pub mod database;
pub mod logging;
pub mod user;
