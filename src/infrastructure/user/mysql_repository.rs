//! MySQL user repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::{MySql, QueryBuilder, Row, Transaction};

use crate::domain::user::{
    DeletionStrategy, NewUser, RemovalMarkers, User, UserChanges, UserId, UserListQuery,
    UserPage, UserRepository, UserTransaction,
};
use crate::domain::DomainError;

const USER_COLUMNS: &str =
    "id, username, email, is_deleted, deleted_at, is_active, created_at, updated_at";

/// MySQL implementation of UserRepository
#[derive(Debug, Clone)]
pub struct MySqlUserRepository {
    pool: MySqlPool,
    strategy: DeletionStrategy,
}

impl MySqlUserRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            strategy: User::DELETION_STRATEGY,
        }
    }
}

/// Predicate selecting rows not removed under `strategy`
fn visible_clause(strategy: DeletionStrategy) -> &'static str {
    match strategy {
        DeletionStrategy::SoftDeleteFlag => "is_deleted = FALSE",
        DeletionStrategy::Tombstone => "deleted_at IS NULL",
        DeletionStrategy::ActiveFlag => "is_active = 1",
        DeletionStrategy::Hard => "TRUE",
    }
}

/// Escape LIKE wildcards; MySQL's default escape character is the backslash
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_filters(builder: &mut QueryBuilder<'_, MySql>, strategy: DeletionStrategy, search: Option<&str>) {
    builder.push(" WHERE ");
    builder.push(visible_clause(strategy));

    if let Some(term) = search {
        let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
        builder
            .push(" AND (LOWER(username) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(email) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// Column named in a MySQL duplicate-key message, e.g.
/// `Duplicate entry 'a@b.c' for key 'users.email'`
fn duplicate_field(message: &str) -> Option<String> {
    let (_, rest) = message.rsplit_once("for key '")?;
    let key = rest.split('\'').next()?;
    let field = key.rsplit('.').next()?;

    if field.is_empty() {
        None
    } else {
        Some(field.to_string())
    }
}

fn write_error(action: &str, e: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return DomainError::duplicate(duplicate_field(db.message()));
        }
    }

    DomainError::storage(format!("Failed to {}: {}", action, e))
}

fn row_to_user(row: &MySqlRow) -> Result<User, DomainError> {
    let decode = |e: sqlx::Error| DomainError::storage(format!("Failed to decode user row: {}", e));

    let id: i64 = row.try_get("id").map_err(decode)?;
    let username: String = row.try_get("username").map_err(decode)?;
    let email: String = row.try_get("email").map_err(decode)?;
    let is_deleted: bool = row.try_get("is_deleted").map_err(decode)?;
    let deleted_at: Option<DateTime<Utc>> = row.try_get("deleted_at").map_err(decode)?;
    let is_active: i8 = row.try_get("is_active").map_err(decode)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(decode)?;

    let user_id = UserId::new(id)
        .map_err(|e| DomainError::storage(format!("Invalid user ID in database: {}", e)))?;

    Ok(User::from_parts(
        user_id,
        username,
        email,
        created_at,
        updated_at,
        RemovalMarkers {
            is_deleted,
            deleted_at,
            is_active: is_active != 0,
        },
    ))
}

#[async_trait]
impl UserRepository for MySqlUserRepository {
    fn deletion_strategy(&self) -> DeletionStrategy {
        self.strategy
    }

    async fn begin(&self) -> Result<Box<dyn UserTransaction>, DomainError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        Ok(Box::new(MySqlUserTransaction { tx }))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, DomainError> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get user: {}", e)))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn list(&self, query: &UserListQuery) -> Result<UserPage, DomainError> {
        let search = query.search.as_deref();

        let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(DISTINCT id) FROM users");
        push_filters(&mut count, self.strategy, search);

        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to count users: {}", e)))?;

        let mut select = QueryBuilder::<MySql>::new(format!("SELECT {} FROM users", USER_COLUMNS));
        push_filters(&mut select, self.strategy, search);
        select
            .push(format!(
                " ORDER BY {col} {dir}, id {dir} LIMIT ",
                col = query.sort_by.column(),
                dir = query.order.keyword()
            ))
            .push_bind(u64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(query.offset());

        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list users: {}", e)))?;

        let users = rows.iter().map(row_to_user).collect::<Result<Vec<_>, _>>()?;

        Ok(UserPage {
            users,
            total: total.max(0) as u64,
            page: query.page,
            limit: query.limit,
        })
    }
}

struct MySqlUserTransaction {
    tx: Transaction<'static, MySql>,
}

#[async_trait]
impl UserTransaction for MySqlUserTransaction {
    async fn find_by_email(
        &mut self,
        email: &str,
        excluding: Option<UserId>,
    ) -> Result<Option<User>, DomainError> {
        let excluded = excluding.map(|id| id.value());

        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE email = ? AND (? IS NULL OR id <> ?) LIMIT 1",
            USER_COLUMNS
        ))
        .bind(email)
        .bind(excluded)
        .bind(excluded)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to look up email: {}", e)))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_for_update(&mut self, id: UserId) -> Result<Option<User>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE id = ? FOR UPDATE",
            USER_COLUMNS
        ))
        .bind(id.value())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to lock user: {}", e)))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn insert(&mut self, user: &NewUser) -> Result<User, DomainError> {
        let result = sqlx::query("INSERT INTO users (username, email) VALUES (?, ?)")
            .bind(&user.username)
            .bind(&user.email)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| write_error("create user", e))?;

        let id = i64::try_from(result.last_insert_id())
            .ok()
            .and_then(|id| UserId::new(id).ok())
            .ok_or_else(|| DomainError::storage("Store returned an invalid insert id"))?;

        self.find_for_update(id)
            .await?
            .ok_or_else(|| DomainError::storage(format!("Inserted user '{}' not readable", id)))
    }

    async fn update(&mut self, id: UserId, changes: &UserChanges) -> Result<(), DomainError> {
        let mut builder = QueryBuilder::<MySql>::new("UPDATE users SET ");
        {
            let mut set = builder.separated(", ");
            if let Some(username) = &changes.username {
                set.push("username = ").push_bind_unseparated(username.clone());
            }
            if let Some(email) = &changes.email {
                set.push("email = ").push_bind_unseparated(email.clone());
            }
            set.push("updated_at = CURRENT_TIMESTAMP");
        }
        builder.push(" WHERE id = ").push_bind(id.value());

        builder
            .build()
            .execute(&mut *self.tx)
            .await
            .map_err(|e| write_error("update user", e))?;

        Ok(())
    }

    async fn remove(&mut self, id: UserId, strategy: DeletionStrategy) -> Result<(), DomainError> {
        let statement = match strategy {
            DeletionStrategy::SoftDeleteFlag => {
                "UPDATE users SET is_deleted = TRUE, updated_at = CURRENT_TIMESTAMP WHERE id = ?"
            }
            DeletionStrategy::Tombstone => {
                "UPDATE users SET deleted_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP WHERE id = ?"
            }
            DeletionStrategy::ActiveFlag => {
                "UPDATE users SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE id = ?"
            }
            DeletionStrategy::Hard => "DELETE FROM users WHERE id = ?",
        };

        sqlx::query(statement)
            .bind(id.value())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete user: {}", e)))?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit transaction: {}", e)))
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to roll back transaction: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_field_from_qualified_key() {
        let message = "Duplicate entry 'a@b.c' for key 'users.email'";
        assert_eq!(duplicate_field(message).as_deref(), Some("email"));
    }

    #[test]
    fn test_duplicate_field_from_bare_key() {
        let message = "Duplicate entry 'a@b.c' for key 'email'";
        assert_eq!(duplicate_field(message).as_deref(), Some("email"));
    }

    #[test]
    fn test_duplicate_field_unknown() {
        assert_eq!(duplicate_field("Deadlock found"), None);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_visible_clause_per_strategy() {
        assert_eq!(visible_clause(DeletionStrategy::SoftDeleteFlag), "is_deleted = FALSE");
        assert_eq!(visible_clause(DeletionStrategy::Tombstone), "deleted_at IS NULL");
        assert_eq!(visible_clause(DeletionStrategy::ActiveFlag), "is_active = 1");
        assert_eq!(visible_clause(DeletionStrategy::Hard), "TRUE");
    }

    #[test]
    fn test_list_query_shape() {
        let mut builder = QueryBuilder::<MySql>::new("SELECT COUNT(DISTINCT id) FROM users");
        push_filters(&mut builder, DeletionStrategy::SoftDeleteFlag, Some("Al"));

        assert_eq!(
            builder.sql(),
            "SELECT COUNT(DISTINCT id) FROM users WHERE is_deleted = FALSE \
             AND (LOWER(username) LIKE ? OR LOWER(email) LIKE ?)"
        );
    }
}
