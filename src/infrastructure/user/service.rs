//! User service: transactional CRUD over a [`UserRepository`]

use std::sync::Arc;

use tracing::{debug, error};

use crate::domain::user::{
    validate_email_length, validate_username, NewUser, User, UserChanges, UserId,
    UserListQuery, UserPage, UserRepository, UserTransaction,
};
use crate::domain::DomainError;

/// User service
#[derive(Debug, Clone)]
pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

fn parse_id(id: i64) -> Result<UserId, DomainError> {
    UserId::new(id).map_err(|e| DomainError::validation(e.to_string()))
}

/// Client-facing errors pass through; anything else is logged in full and
/// replaced by `message`
fn surface(message: &'static str, err: DomainError) -> DomainError {
    if err.is_client_error() {
        return err;
    }

    error!(error = %err, "{}", message);
    DomainError::wrap_internal(message, err)
}

async fn abandon(tx: Box<dyn UserTransaction>) {
    if let Err(e) = tx.rollback().await {
        error!(error = %e, "Failed to roll back transaction");
    }
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    /// Create a user inside a transaction
    pub async fn create(&self, payload: NewUser) -> Result<User, DomainError> {
        if payload.is_empty() {
            return Err(DomainError::validation("Invalid user payload"));
        }
        validate_username(&payload.username)
            .and_then(|_| validate_email_length(&payload.email))
            .map_err(|e| DomainError::validation(e.to_string()))?;

        let mut tx = self
            .repository
            .begin()
            .await
            .map_err(|e| surface("Failed to create user", e))?;

        let result: Result<User, DomainError> = async {
            if payload.has_email() && tx.find_by_email(&payload.email, None).await?.is_some() {
                return Err(DomainError::conflict("Email already in use"));
            }
            tx.insert(&payload).await
        }
        .await;

        match result {
            Ok(user) => {
                tx.commit()
                    .await
                    .map_err(|e| surface("Failed to create user", e))?;
                debug!(user_id = %user.id(), "User created");
                Ok(user)
            }
            Err(e) => {
                abandon(tx).await;
                Err(surface("Failed to create user", e))
            }
        }
    }

    /// One page of visible users
    pub async fn list(&self, query: &UserListQuery) -> Result<UserPage, DomainError> {
        self.repository
            .list(query)
            .await
            .map_err(|e| surface("Failed to fetch users", e))
    }

    /// Get a visible user by id
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, DomainError> {
        let id = parse_id(id)?;
        let strategy = self.repository.deletion_strategy();

        let user = self
            .repository
            .find_by_id(id)
            .await
            .map_err(|e| surface("Failed to fetch user", e))?;

        Ok(user.filter(|u| !u.is_removed(strategy)))
    }

    /// Apply a partial update; `None` when the user does not exist
    pub async fn update(&self, id: i64, changes: UserChanges) -> Result<Option<User>, DomainError> {
        let id = parse_id(id)?;
        if changes.is_empty() {
            return Err(DomainError::validation("Invalid user payload"));
        }
        if let Some(username) = &changes.username {
            validate_username(username).map_err(|e| DomainError::validation(e.to_string()))?;
        }
        if let Some(email) = &changes.email {
            validate_email_length(email).map_err(|e| DomainError::validation(e.to_string()))?;
        }

        let strategy = self.repository.deletion_strategy();
        let mut tx = self
            .repository
            .begin()
            .await
            .map_err(|e| surface("Failed to update user", e))?;

        let result: Result<bool, DomainError> = async {
            let current = match tx.find_for_update(id).await? {
                Some(user) if !user.is_removed(strategy) => user,
                _ => return Ok(false),
            };

            if let Some(email) = &changes.email {
                if email != current.email() && tx.find_by_email(email, Some(id)).await?.is_some() {
                    return Err(DomainError::conflict("Email already in use"));
                }
            }

            tx.update(id, &changes).await?;
            Ok(true)
        }
        .await;

        match result {
            Ok(true) => {
                tx.commit()
                    .await
                    .map_err(|e| surface("Failed to update user", e))?;
            }
            Ok(false) => {
                abandon(tx).await;
                return Ok(None);
            }
            Err(e) => {
                abandon(tx).await;
                return Err(surface("Failed to update user", e));
            }
        }

        debug!(user_id = %id, "User updated");
        self.repository
            .find_by_id(id)
            .await
            .map_err(|e| surface("Failed to update user", e))
    }

    /// Remove a user under the repository's deletion strategy; `false` when
    /// there was nothing to remove
    pub async fn delete(&self, id: i64) -> Result<bool, DomainError> {
        let id = parse_id(id)?;
        let strategy = self.repository.deletion_strategy();

        let mut tx = self
            .repository
            .begin()
            .await
            .map_err(|e| surface("Failed to delete user", e))?;

        let result: Result<bool, DomainError> = async {
            match tx.find_for_update(id).await? {
                Some(user) if !user.is_removed(strategy) => {
                    tx.remove(id, strategy).await?;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
        .await;

        match result {
            Ok(true) => {
                tx.commit()
                    .await
                    .map_err(|e| surface("Failed to delete user", e))?;
                debug!(user_id = %id, strategy = ?strategy, "User deleted");
                Ok(true)
            }
            Ok(false) => {
                abandon(tx).await;
                Ok(false)
            }
            Err(e) => {
                abandon(tx).await;
                Err(surface("Failed to delete user", e))
            }
        }
    }
}
