//! User entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{validate_user_id, UserValidationError};

/// User identifier - store-generated positive integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct UserId(i64);

impl UserId {
    /// Create a new UserId after validation
    pub fn new(id: i64) -> Result<Self, UserValidationError> {
        validate_user_id(id)?;
        Ok(Self(id))
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for UserId {
    type Error = UserValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for i64 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an entity is removed from the visible data set.
///
/// Declared once per entity type; repositories apply it to deletes and to
/// every read that must hide removed rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletionStrategy {
    /// Flip the boolean `is_deleted` column
    #[default]
    SoftDeleteFlag,
    /// Stamp `deleted_at` with the deletion time
    Tombstone,
    /// Clear the integer `is_active` column
    ActiveFlag,
    /// Remove the row; irreversible
    Hard,
}

/// Soft-delete markers carried by a stored row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalMarkers {
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Default for RemovalMarkers {
    fn default() -> Self {
        Self {
            is_deleted: false,
            deleted_at: None,
            is_active: true,
        }
    }
}

impl RemovalMarkers {
    /// Whether the row counts as removed under `strategy`
    pub fn is_removed(&self, strategy: DeletionStrategy) -> bool {
        match strategy {
            DeletionStrategy::SoftDeleteFlag => self.is_deleted,
            DeletionStrategy::Tombstone => self.deleted_at.is_some(),
            DeletionStrategy::ActiveFlag => !self.is_active,
            DeletionStrategy::Hard => false,
        }
    }

    /// Apply a soft removal. `Hard` leaves the markers untouched since the
    /// row itself goes away.
    pub fn mark_removed(&mut self, strategy: DeletionStrategy, at: DateTime<Utc>) {
        match strategy {
            DeletionStrategy::SoftDeleteFlag => self.is_deleted = true,
            DeletionStrategy::Tombstone => self.deleted_at = Some(at),
            DeletionStrategy::ActiveFlag => self.is_active = false,
            DeletionStrategy::Hard => {}
        }
    }
}

/// User entity. Serializes to its plain representation; removal markers
/// stay server-side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    id: UserId,
    username: String,
    email: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    removal: RemovalMarkers,
}

impl User {
    /// Deletion strategy declared for the `users` table
    pub const DELETION_STRATEGY: DeletionStrategy = DeletionStrategy::SoftDeleteFlag;

    /// Rebuild a user from stored state
    pub fn from_parts(
        id: UserId,
        username: impl Into<String>,
        email: impl Into<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        removal: RemovalMarkers,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            email: email.into(),
            created_at,
            updated_at,
            removal,
        }
    }

    // Getters

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn removal(&self) -> &RemovalMarkers {
        &self.removal
    }

    pub fn is_removed(&self, strategy: DeletionStrategy) -> bool {
        self.removal.is_removed(strategy)
    }

    // Mutators

    /// Apply a partial update and touch `updated_at`
    pub fn apply(&mut self, changes: &UserChanges) {
        if let Some(username) = &changes.username {
            self.username = username.clone();
        }
        if let Some(email) = &changes.email {
            self.email = email.clone();
        }
        self.touch();
    }

    pub fn mark_removed(&mut self, strategy: DeletionStrategy) {
        let now = Utc::now();
        self.removal.mark_removed(strategy, now);
        self.updated_at = now;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Fields accepted when creating a user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
}

impl NewUser {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.trim().is_empty() && self.email.trim().is_empty()
    }

    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }
}

/// Partial update of a user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_user(id: i64, email: &str) -> User {
        let now = Utc::now();
        User::from_parts(
            UserId::new(id).unwrap(),
            "tester",
            email,
            now,
            now,
            RemovalMarkers::default(),
        )
    }

    #[test]
    fn test_user_id_valid() {
        let id = UserId::new(42).unwrap();
        assert_eq!(id.value(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_user_id_invalid() {
        assert!(UserId::new(0).is_err());
        assert!(UserId::new(-3).is_err());
    }

    #[test]
    fn test_declared_strategy() {
        assert_eq!(User::DELETION_STRATEGY, DeletionStrategy::SoftDeleteFlag);
    }

    #[test]
    fn test_removal_markers_per_strategy() {
        let now = Utc::now();

        for strategy in [
            DeletionStrategy::SoftDeleteFlag,
            DeletionStrategy::Tombstone,
            DeletionStrategy::ActiveFlag,
        ] {
            let mut markers = RemovalMarkers::default();
            assert!(!markers.is_removed(strategy));
            markers.mark_removed(strategy, now);
            assert!(markers.is_removed(strategy), "{:?}", strategy);
        }

        let mut markers = RemovalMarkers::default();
        markers.mark_removed(DeletionStrategy::Hard, now);
        assert_eq!(markers, RemovalMarkers::default());
    }

    #[test]
    fn test_markers_are_independent() {
        let mut markers = RemovalMarkers::default();
        markers.mark_removed(DeletionStrategy::SoftDeleteFlag, Utc::now());

        assert!(!markers.is_removed(DeletionStrategy::Tombstone));
        assert!(!markers.is_removed(DeletionStrategy::ActiveFlag));
    }

    #[test]
    fn test_apply_changes() {
        let mut user = create_test_user(1, "a@example.com");
        let before = user.updated_at();

        std::thread::sleep(std::time::Duration::from_millis(5));

        user.apply(&UserChanges {
            username: None,
            email: Some("b@example.com".to_string()),
        });

        assert_eq!(user.email(), "b@example.com");
        assert_eq!(user.username(), "tester");
        assert!(user.updated_at() > before);
    }

    #[test]
    fn test_serialization_hides_removal_markers() {
        let mut user = create_test_user(7, "a@example.com");
        user.mark_removed(DeletionStrategy::SoftDeleteFlag);

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["email"], "a@example.com");
        assert!(json.get("removal").is_none());
        assert!(json.get("is_deleted").is_none());
    }

    #[test]
    fn test_empty_payloads() {
        assert!(NewUser::new(" ", "").is_empty());
        assert!(!NewUser::new("bob", "").is_empty());
        assert!(!NewUser::new("bob", "").has_email());
        assert!(UserChanges::default().is_empty());
    }
}
