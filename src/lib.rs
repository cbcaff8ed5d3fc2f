//! Users API
//!
//! A REST service for user accounts backed by MySQL, with a Redis
//! connector, declarative request validation, uniform response envelopes
//! and ordered graceful shutdown.

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use crate::config::AppConfig;
