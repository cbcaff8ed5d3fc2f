//! In-process cache backed by moka, used where Redis is not available

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::domain::cache::Cache;
use crate::domain::{DomainError, GracefulClose, HealthProbe};

const MAX_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone)]
struct CacheEntry {
    data: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

#[derive(Debug)]
pub struct InMemoryCache {
    cache: MokaCache<String, CacheEntry>,
    online: AtomicBool,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            cache: MokaCache::builder().max_capacity(MAX_CAPACITY).build(),
            online: AtomicBool::new(true),
        }
    }

    /// Makes `ping` fail, to simulate a lost connection
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    async fn live_entry(&self, key: &str) -> Option<CacheEntry> {
        let entry = self.cache.get(key).await?;

        if entry.is_expired() {
            self.cache.remove(key).await;
            return None;
        }

        Some(entry)
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        Ok(self.live_entry(key).await.map(|entry| entry.data))
    }

    async fn set_raw(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), DomainError> {
        let entry = CacheEntry {
            data: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };

        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.cache.remove(key).await.is_some())
    }

    async fn ping(&self) -> Result<(), DomainError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DomainError::cache("Cache is offline"))
        }
    }
}

#[async_trait]
impl HealthProbe for InMemoryCache {
    async fn probe(&self) -> Result<(), DomainError> {
        self.ping().await
    }
}

#[async_trait]
impl GracefulClose for InMemoryCache {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn close(&self) -> Result<(), DomainError> {
        self.cache.invalidate_all();
        Ok(())
    }
}
