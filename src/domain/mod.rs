//! Domain layer - Core business logic and entities

pub mod cache;
pub mod error;
pub mod lifecycle;
pub mod user;

pub use cache::{Cache, CacheExt};
pub use error::DomainError;
pub use lifecycle::{GracefulClose, HealthProbe};
pub use user::{
    DeletionStrategy, NewUser, User, UserChanges, UserId, UserListQuery, UserPage,
    UserRepository, UserTransaction,
};
