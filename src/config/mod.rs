//! Environment-driven configuration

mod app_config;

pub use app_config::{
    AppConfig, ConfigError, DatabaseConfig, Environment, LogFormat, LogLevel, LoggingConfig,
    RedisConfig,
};
