//! Redis connector
//!
//! One multiplexed `ConnectionManager` is shared by every caller. Opening it
//! is serialized and retried with [`ReconnectPolicy`]. A command that fails
//! because the connection dropped triggers the same policy to rebuild it.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client, RedisError, RedisResult};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use super::reconnect::{connect_with_policy, CacheEvent, ReconnectPolicy};
use crate::config::RedisConfig;
use crate::domain::cache::Cache;
use crate::domain::{DomainError, GracefulClose, HealthProbe};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_CAPACITY: usize = 32;

/// The live handle, tagged so a drop is only recovered once
#[derive(Default)]
struct Slot {
    connection: Option<ConnectionManager>,
    generation: u64,
}

pub struct RedisConnector {
    client: Client,
    policy: ReconnectPolicy,
    connect_timeout: Duration,
    slot: Mutex<Slot>,
    events: broadcast::Sender<CacheEvent>,
}

impl fmt::Debug for RedisConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConnector")
            .field("policy", &self.policy)
            .field("connect_timeout", &self.connect_timeout)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

/// Failures that mean the socket is gone rather than the command was bad
pub(crate) fn is_connection_error(err: &RedisError) -> bool {
    err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_timeout()
}

impl RedisConnector {
    /// Builds the client. No connection is made until [`Self::init`].
    pub fn new(config: &RedisConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url())
            .map_err(|e| DomainError::cache(format!("Failed to create Redis client: {}", e)))?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            client,
            policy: ReconnectPolicy::default(),
            connect_timeout: CONNECT_TIMEOUT,
            slot: Mutex::new(Slot::default()),
            events,
        })
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Receiver for lifecycle notifications
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Opens the shared connection, or returns it if already open
    pub async fn init(&self) -> Result<ConnectionManager, DomainError> {
        let mut slot = self.slot.lock().await;

        if let Some(connection) = slot.connection.as_ref() {
            return Ok(connection.clone());
        }

        let connection = connect_with_policy(&self.policy, |e| self.emit(e), None, || self.open())
            .await
            .map_err(|failure| {
                DomainError::cache(format!(
                    "Failed to connect to Redis after {} retries: {}",
                    self.policy.max_retries, failure
                ))
            })?;

        slot.connection = Some(connection.clone());
        slot.generation += 1;
        Ok(connection)
    }

    /// Sends QUIT on the shared handle and drops it
    pub async fn close(&self) -> Result<(), DomainError> {
        let Some(mut connection) = self.slot.lock().await.connection.take() else {
            return Ok(());
        };

        let quit: RedisResult<()> = redis::cmd("QUIT").query_async(&mut connection).await;
        self.emit(CacheEvent::End);

        match quit {
            Ok(()) => {
                debug!("Redis QUIT acknowledged");
                Ok(())
            }
            Err(e) => Err(DomainError::cache(format!("Redis QUIT failed: {}", e))),
        }
    }

    /// One attempt; the manager's own retries are off so the policy decides
    async fn open(&self) -> Result<ConnectionManager, String> {
        let config = ConnectionManagerConfig::new().set_number_of_retries(0);

        match tokio::time::timeout(
            self.connect_timeout,
            ConnectionManager::new_with_config(self.client.clone(), config),
        )
        .await
        {
            Ok(Ok(connection)) => Ok(connection),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("connect timed out after {:?}", self.connect_timeout)),
        }
    }

    async fn connection(&self) -> Result<(ConnectionManager, u64), DomainError> {
        let slot = self.slot.lock().await;

        slot.connection
            .clone()
            .map(|connection| (connection, slot.generation))
            .ok_or_else(|| DomainError::cache("Redis client not initialized"))
    }

    /// Rebuild the handle after a drop seen on `generation`. Callers that
    /// lose the race find a newer generation and leave it alone.
    async fn recover(&self, generation: u64, cause: &RedisError) {
        let mut slot = self.slot.lock().await;

        if slot.generation != generation || slot.connection.is_none() {
            return;
        }
        slot.connection = None;

        let result = connect_with_policy(
            &self.policy,
            |e| self.emit(e),
            Some(cause.to_string()),
            || self.open(),
        )
        .await;

        match result {
            Ok(connection) => {
                slot.connection = Some(connection);
                slot.generation += 1;
            }
            Err(failure) => {
                error!(error = %failure, "Redis reconnect gave up");
                self.emit(CacheEvent::End);
            }
        }
    }

    /// Map a command failure, recovering the connection when it dropped
    async fn command_failed(&self, generation: u64, err: RedisError, what: String) -> DomainError {
        if is_connection_error(&err) {
            self.recover(generation, &err).await;
        }

        DomainError::cache(format!("{}: {}", what, err))
    }

    fn emit(&self, event: CacheEvent) {
        match &event {
            CacheEvent::Connect => debug!("Redis connecting"),
            CacheEvent::Ready => info!("Redis connected"),
            CacheEvent::Error(message) => error!(error = %message, "Redis error"),
            CacheEvent::Reconnecting { attempt, delay } => {
                warn!(attempt = attempt, delay_ms = delay.as_millis() as u64, "Redis reconnecting")
            }
            CacheEvent::End => info!("Redis connection closed"),
        }

        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl Cache for RedisConnector {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        let (mut conn, generation) = self.connection().await?;

        let result: RedisResult<Option<String>> = conn.get(key).await;
        match result {
            Ok(value) => Ok(value),
            Err(e) => Err(self
                .command_failed(generation, e, format!("Failed to get key '{}'", key))
                .await),
        }
    }

    async fn set_raw(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), DomainError> {
        let (mut conn, generation) = self.connection().await?;

        let result: RedisResult<()> = match ttl {
            Some(ttl) => conn.set_ex(key, value, ttl.as_secs().max(1)).await,
            None => conn.set(key, value).await,
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self
                .command_failed(generation, e, format!("Failed to set key '{}'", key))
                .await),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let (mut conn, generation) = self.connection().await?;

        let result: RedisResult<i64> = conn.del(key).await;
        match result {
            Ok(deleted) => Ok(deleted > 0),
            Err(e) => Err(self
                .command_failed(generation, e, format!("Failed to delete key '{}'", key))
                .await),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        let (mut conn, generation) = self.connection().await?;

        let result: RedisResult<bool> = conn.exists(key).await;
        match result {
            Ok(found) => Ok(found),
            Err(e) => Err(self
                .command_failed(generation, e, format!("Failed to check key '{}'", key))
                .await),
        }
    }

    async fn ping(&self) -> Result<(), DomainError> {
        let (mut conn, generation) = self.connection().await?;

        let result: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(self
                .command_failed(generation, e, "Redis ping failed".to_string())
                .await),
        }
    }
}

#[async_trait]
impl HealthProbe for RedisConnector {
    async fn probe(&self) -> Result<(), DomainError> {
        self.ping().await
    }
}

#[async_trait]
impl GracefulClose for RedisConnector {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn close(&self) -> Result<(), DomainError> {
        RedisConnector::close(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> RedisConfig {
        RedisConfig {
            host: "127.0.0.1".to_string(),
            // Reserved port, nothing listens here
            port: 1,
            password: None,
        }
    }

    fn fast_policy(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            step: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            max_retries,
        }
    }

    #[tokio::test]
    async fn test_commands_before_init_fail() {
        let connector = RedisConnector::new(&unreachable_config()).unwrap();

        let err = connector.get_raw("key").await.unwrap_err();
        assert!(err.to_string().contains("Redis client not initialized"));
    }

    #[tokio::test]
    async fn test_init_gives_up_after_retry_cap() {
        let connector = RedisConnector::new(&unreachable_config())
            .unwrap()
            .with_policy(fast_policy(2))
            .with_connect_timeout(Duration::from_millis(500));
        let mut events = connector.subscribe();

        let Err(err) = connector.init().await else {
            panic!("init must fail against an unreachable server");
        };
        assert!(err.to_string().contains("after 2 retries"));

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }

        let connects = received.iter().filter(|e| **e == CacheEvent::Connect).count();
        let reconnects = received
            .iter()
            .filter(|e| matches!(e, CacheEvent::Reconnecting { .. }))
            .count();
        assert_eq!(connects, 3);
        assert_eq!(reconnects, 2);
        assert!(!received.contains(&CacheEvent::Ready));
    }

    #[test]
    fn test_connection_errors_are_told_apart() {
        let reset = RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ));
        assert!(is_connection_error(&reset));

        let wrong_type = RedisError::from((redis::ErrorKind::TypeError, "not a string"));
        assert!(!is_connection_error(&wrong_type));
    }

    #[tokio::test]
    async fn test_close_without_connection_is_noop() {
        let connector = RedisConnector::new(&unreachable_config()).unwrap();
        let mut events = connector.subscribe();

        connector.close().await.unwrap();

        assert!(events.try_recv().is_err());
    }
}
