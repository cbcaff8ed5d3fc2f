//! Traits shared by the store connectors

use async_trait::async_trait;

use crate::domain::DomainError;

/// Liveness check against an external store
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> Result<(), DomainError>;
}

/// A resource released during shutdown
#[async_trait]
pub trait GracefulClose: Send + Sync {
    /// Name used in shutdown logs
    fn name(&self) -> &'static str;

    async fn close(&self) -> Result<(), DomainError>;
}
