//! Cache domain - key-value abstraction over the session store

mod repository;

pub use repository::{Cache, CacheExt};
