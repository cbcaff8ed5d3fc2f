//! Cache infrastructure - Redis connector and in-process fallback

mod in_memory;
mod reconnect;
mod redis;

pub use in_memory::InMemoryCache;
pub use reconnect::{CacheEvent, ReconnectPolicy};
pub use self::redis::RedisConnector;
