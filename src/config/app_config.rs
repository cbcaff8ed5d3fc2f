use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// Deployment environment (`NODE_ENV`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "development" => Some(Self::Development),
            "production" => Some(Self::Production),
            "test" => Some(Self::Test),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log verbosity (`LOG_LEVEL`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Http,
    Debug,
}

impl LogLevel {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "error" => Some(Self::Error),
            "warn" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "http" => Some(Self::Http),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }

    /// Directive for the tracing env filter; `http` sits between info and
    /// debug and has no tracing counterpart, so it opens up debug
    pub fn filter_directive(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Http | Self::Debug => "debug",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl RedisConfig {
    /// Connection URL understood by the redis client
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{}@{}:{}/", password, self.host, self.port),
            None => format!("redis://{}:{}/", self.host, self.port),
        }
    }
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

/// Application configuration, built once at startup
#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub port: u16,
    pub jwt_secret: String,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub logging: LoggingConfig,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("port", &self.port)
            .field("jwt_secret", &"[REDACTED]")
            .field("database", &self.database)
            .field("redis", &self.redis)
            .field("logging", &self.logging)
            .finish()
    }
}

/// Every problem found in the environment, not just the first
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config validation error: {}", .0.join(". "))]
    Invalid(Vec<String>),

    #[error("Failed to read environment: {0}")]
    Source(#[from] config::ConfigError),
}

/// Recognized variables, as read from the environment. The `config`
/// environment source lowercases keys.
#[derive(Debug, Default, Deserialize)]
struct RawEnv {
    node_env: Option<String>,
    port: Option<String>,
    db_host: Option<String>,
    db_port: Option<String>,
    db_name: Option<String>,
    db_user: Option<String>,
    db_password: Option<String>,
    redis_host: Option<String>,
    redis_port: Option<String>,
    redis_password: Option<String>,
    log_level: Option<String>,
    log_format: Option<String>,
    jwt_secret: Option<String>,
}

impl AppConfig {
    /// Load from the process environment, after an optional `.env` file
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_source(config::Environment::default())
    }

    /// Load from an explicit set of variables
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_source(config::Environment::default().source(Some(vars)))
    }

    fn from_source(source: config::Environment) -> Result<Self, ConfigError> {
        let raw: RawEnv = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;

        Self::validate(raw)
    }

    fn validate(raw: RawEnv) -> Result<Self, ConfigError> {
        let mut errors = Vec::new();

        let env = match present(raw.node_env) {
            None => Environment::default(),
            Some(value) => Environment::parse(&value).unwrap_or_else(|| {
                errors.push(r#""NODE_ENV" must be one of [development, production, test]"#.to_string());
                Environment::default()
            }),
        };

        let port = parse_port("PORT", raw.port, 3000, &mut errors);
        let db_port = parse_port("DB_PORT", raw.db_port, 3306, &mut errors);
        let redis_port = parse_port("REDIS_PORT", raw.redis_port, 6379, &mut errors);

        let db_host = required("DB_HOST", raw.db_host, &mut errors);
        let db_name = required("DB_NAME", raw.db_name, &mut errors);
        let db_user = required("DB_USER", raw.db_user, &mut errors);
        let jwt_secret = required("JWT_SECRET", raw.jwt_secret, &mut errors);

        let level = match present(raw.log_level) {
            None => LogLevel::default(),
            Some(value) => LogLevel::parse(&value).unwrap_or_else(|| {
                errors.push(
                    r#""LOG_LEVEL" must be one of [error, warn, info, http, debug]"#.to_string(),
                );
                LogLevel::default()
            }),
        };

        let format = match present(raw.log_format) {
            None => LogFormat::default(),
            Some(value) => LogFormat::parse(&value).unwrap_or_else(|| {
                errors.push(r#""LOG_FORMAT" must be one of [pretty, json]"#.to_string());
                LogFormat::default()
            }),
        };

        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors));
        }

        Ok(Self {
            env,
            port,
            jwt_secret,
            database: DatabaseConfig {
                host: db_host,
                port: db_port,
                name: db_name,
                user: db_user,
                password: raw.db_password.unwrap_or_default(),
            },
            redis: RedisConfig {
                host: present(raw.redis_host).unwrap_or_else(|| "127.0.0.1".to_string()),
                port: redis_port,
                password: present(raw.redis_password),
            },
            logging: LoggingConfig { level, format },
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required(name: &str, value: Option<String>, errors: &mut Vec<String>) -> String {
    match present(value) {
        Some(v) => v,
        None => {
            errors.push(format!(r#""{}" is required"#, name));
            String::new()
        }
    }
}

fn parse_port(name: &str, value: Option<String>, default: u16, errors: &mut Vec<String>) -> u16 {
    match present(value) {
        None => default,
        Some(v) => v.parse().unwrap_or_else(|_| {
            errors.push(format!(r#""{}" must be a number"#, name));
            default
        }),
    }
}
