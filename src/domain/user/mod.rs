//! User domain
//!
//! This module provides domain types and traits for the user resource,
//! including the entity, listing options, validation, and repository traits.

mod entity;
mod query;
mod repository;
mod validation;

pub use entity::{DeletionStrategy, NewUser, RemovalMarkers, User, UserChanges, UserId};
pub use query::{SortField, SortOrder, UserListQuery, UserPage, DEFAULT_LIMIT, DEFAULT_PAGE};
pub use repository::{UserRepository, UserTransaction};
pub use validation::{
    validate_email_length, validate_user_id, validate_username, UserValidationError,
    MAX_EMAIL_LENGTH, MAX_USERNAME_LENGTH, MIN_USERNAME_LENGTH,
};
