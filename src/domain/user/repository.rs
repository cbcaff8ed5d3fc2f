//! User repository traits

use async_trait::async_trait;
use std::fmt::Debug;

use super::entity::{DeletionStrategy, NewUser, User, UserChanges, UserId};
use super::query::{UserListQuery, UserPage};
use crate::domain::DomainError;

/// Repository trait for user storage
///
/// Reads outside a transaction go through the repository directly; every
/// mutation goes through a [`UserTransaction`] obtained from [`begin`].
///
/// [`begin`]: UserRepository::begin
#[async_trait]
pub trait UserRepository: Send + Sync + Debug {
    /// Strategy applied by deletes and visibility filters
    fn deletion_strategy(&self) -> DeletionStrategy;

    /// Open a transaction
    async fn begin(&self) -> Result<Box<dyn UserTransaction>, DomainError>;

    /// Get a user by id, including rows removed by a soft delete
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, DomainError>;

    /// List visible users for one page, with the total number of matches
    async fn list(&self, query: &UserListQuery) -> Result<UserPage, DomainError>;
}

/// Unit of work over the users table.
///
/// Dropping a transaction without committing discards its changes.
#[async_trait]
pub trait UserTransaction: Send {
    /// Find a row holding `email`, optionally ignoring one id
    async fn find_by_email(
        &mut self,
        email: &str,
        excluding: Option<UserId>,
    ) -> Result<Option<User>, DomainError>;

    /// Fetch a row and lock it until the transaction ends
    async fn find_for_update(&mut self, id: UserId) -> Result<Option<User>, DomainError>;

    /// Insert a row; a unique index violation surfaces as a conflict
    async fn insert(&mut self, user: &NewUser) -> Result<User, DomainError>;

    /// Write changed columns and touch `updated_at`
    async fn update(&mut self, id: UserId, changes: &UserChanges) -> Result<(), DomainError>;

    /// Remove a row according to `strategy`
    async fn remove(&mut self, id: UserId, strategy: DeletionStrategy) -> Result<(), DomainError>;

    async fn commit(self: Box<Self>) -> Result<(), DomainError>;

    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}
