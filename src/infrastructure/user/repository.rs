//! In-memory user repository implementation
//!
//! Transactions take the table lock for their whole lifetime and work on a
//! copy, so a dropped or rolled-back transaction leaves no trace.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::user::{
    DeletionStrategy, NewUser, RemovalMarkers, SortField, SortOrder, User, UserChanges, UserId,
    UserListQuery, UserPage, UserRepository, UserTransaction,
};
use crate::domain::DomainError;

#[derive(Debug, Clone, Default)]
struct Table {
    rows: BTreeMap<i64, User>,
    last_id: i64,
}

impl Table {
    fn email_holder(&self, email: &str, excluding: Option<UserId>) -> Option<&User> {
        self.rows.values().find(|user| {
            user.email().eq_ignore_ascii_case(email) && Some(user.id()) != excluding
        })
    }
}

/// In-memory implementation of UserRepository
#[derive(Debug, Clone)]
pub struct InMemoryUserRepository {
    table: Arc<Mutex<Table>>,
    strategy: DeletionStrategy,
    fail_writes: Arc<AtomicBool>,
    stale_email_lookups: Arc<AtomicBool>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::with_deletion_strategy(User::DELETION_STRATEGY)
    }

    pub fn with_deletion_strategy(strategy: DeletionStrategy) -> Self {
        Self {
            table: Arc::new(Mutex::new(Table::default())),
            strategy,
            fail_writes: Arc::new(AtomicBool::new(false)),
            stale_email_lookups: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every transactional write fail with a storage error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make `find_by_email` miss, as if another writer took the address
    /// after the lookup. Writes still enforce the unique email index.
    pub fn set_stale_email_lookups(&self, stale: bool) {
        self.stale_email_lookups.store(stale, Ordering::SeqCst);
    }

    /// Number of stored rows, removed ones included
    pub async fn row_count(&self) -> usize {
        self.table.lock().await.rows.len()
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn compare(a: &User, b: &User, field: SortField) -> CmpOrdering {
    let primary = match field {
        SortField::Id => a.id().value().cmp(&b.id().value()),
        SortField::Username => a.username().cmp(b.username()),
        SortField::Email => a.email().cmp(b.email()),
        SortField::CreatedAt => a.created_at().cmp(&b.created_at()),
        SortField::UpdatedAt => a.updated_at().cmp(&b.updated_at()),
    };

    primary.then_with(|| a.id().value().cmp(&b.id().value()))
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    fn deletion_strategy(&self) -> DeletionStrategy {
        self.strategy
    }

    async fn begin(&self) -> Result<Box<dyn UserTransaction>, DomainError> {
        let guard = self.table.clone().lock_owned().await;
        let working = guard.clone();

        Ok(Box::new(InMemoryUserTransaction {
            guard,
            working,
            fail_writes: self.fail_writes.load(Ordering::SeqCst),
            stale_email_lookups: self.stale_email_lookups.load(Ordering::SeqCst),
        }))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, DomainError> {
        let table = self.table.lock().await;
        Ok(table.rows.get(&id.value()).cloned())
    }

    async fn list(&self, query: &UserListQuery) -> Result<UserPage, DomainError> {
        let table = self.table.lock().await;

        let mut matching: Vec<User> = table
            .rows
            .values()
            .filter(|user| !user.is_removed(self.strategy) && query.matches(user))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            let ordering = compare(a, b, query.sort_by);
            match query.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = matching.len() as u64;
        let users = matching
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.limit as usize)
            .collect();

        Ok(UserPage {
            users,
            total,
            page: query.page,
            limit: query.limit,
        })
    }
}

struct InMemoryUserTransaction {
    guard: OwnedMutexGuard<Table>,
    working: Table,
    fail_writes: bool,
    stale_email_lookups: bool,
}

impl InMemoryUserTransaction {
    fn check_writable(&self) -> Result<(), DomainError> {
        if self.fail_writes {
            return Err(DomainError::storage("Write rejected by store"));
        }
        Ok(())
    }

    fn row_mut(&mut self, id: UserId) -> Result<&mut User, DomainError> {
        self.working
            .rows
            .get_mut(&id.value())
            .ok_or_else(|| DomainError::not_found(format!("User '{}' not found", id)))
    }
}

#[async_trait]
impl UserTransaction for InMemoryUserTransaction {
    async fn find_by_email(
        &mut self,
        email: &str,
        excluding: Option<UserId>,
    ) -> Result<Option<User>, DomainError> {
        if self.stale_email_lookups {
            return Ok(None);
        }
        Ok(self.working.email_holder(email, excluding).cloned())
    }

    async fn find_for_update(&mut self, id: UserId) -> Result<Option<User>, DomainError> {
        Ok(self.working.rows.get(&id.value()).cloned())
    }

    async fn insert(&mut self, user: &NewUser) -> Result<User, DomainError> {
        self.check_writable()?;

        if self.working.email_holder(&user.email, None).is_some() {
            return Err(DomainError::duplicate(Some("email".to_string())));
        }

        self.working.last_id += 1;
        let id = UserId::new(self.working.last_id)
            .map_err(|e| DomainError::storage(format!("Invalid generated id: {}", e)))?;
        let now = Utc::now();

        let created = User::from_parts(
            id,
            user.username.clone(),
            user.email.clone(),
            now,
            now,
            RemovalMarkers::default(),
        );

        self.working.rows.insert(id.value(), created.clone());
        Ok(created)
    }

    async fn update(&mut self, id: UserId, changes: &UserChanges) -> Result<(), DomainError> {
        self.check_writable()?;

        if let Some(email) = &changes.email {
            if self.working.email_holder(email, Some(id)).is_some() {
                return Err(DomainError::duplicate(Some("email".to_string())));
            }
        }

        self.row_mut(id)?.apply(changes);
        Ok(())
    }

    async fn remove(&mut self, id: UserId, strategy: DeletionStrategy) -> Result<(), DomainError> {
        self.check_writable()?;

        match strategy {
            DeletionStrategy::Hard => {
                self.working
                    .rows
                    .remove(&id.value())
                    .ok_or_else(|| DomainError::not_found(format!("User '{}' not found", id)))?;
            }
            soft => self.row_mut(id)?.mark_removed(soft),
        }

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let InMemoryUserTransaction {
            mut guard, working, ..
        } = *self;

        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed(repo: &InMemoryUserRepository, users: &[(&str, &str)]) -> Vec<User> {
        let mut tx = repo.begin().await.unwrap();
        let mut created = Vec::new();
        for (username, email) in users {
            created.push(tx.insert(&NewUser::new(*username, *email)).await.unwrap());
        }
        tx.commit().await.unwrap();
        created
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let repo = InMemoryUserRepository::new();

        let users = seed(&repo, &[("alice", "a@x.io"), ("bob", "b@x.io")]).await;

        assert_eq!(users[0].id().value(), 1);
        assert_eq!(users[1].id().value(), 2);
        assert_eq!(repo.row_count().await, 2);
    }

    #[tokio::test]
    async fn test_rollback_discards_changes() {
        let repo = InMemoryUserRepository::new();

        let mut tx = repo.begin().await.unwrap();
        tx.insert(&NewUser::new("alice", "a@x.io")).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(repo.row_count().await, 0);
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_changes() {
        let repo = InMemoryUserRepository::new();

        {
            let mut tx = repo.begin().await.unwrap();
            tx.insert(&NewUser::new("alice", "a@x.io")).await.unwrap();
        }

        assert_eq!(repo.row_count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let repo = InMemoryUserRepository::new();
        seed(&repo, &[("alice", "a@x.io")]).await;

        let mut tx = repo.begin().await.unwrap();
        let err = tx.insert(&NewUser::new("other", "A@X.io")).await.unwrap_err();

        assert_eq!(err.to_string(), "email already exists");
    }

    #[tokio::test]
    async fn test_list_hides_removed_rows() {
        let repo = InMemoryUserRepository::new();
        let users = seed(&repo, &[("alice", "a@x.io"), ("bob", "b@x.io")]).await;

        let mut tx = repo.begin().await.unwrap();
        tx.remove(users[0].id(), DeletionStrategy::SoftDeleteFlag)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let page = repo.list(&UserListQuery::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.users[0].username(), "bob");

        // Direct lookups still see the row
        let removed = repo.find_by_id(users[0].id()).await.unwrap().unwrap();
        assert!(removed.is_removed(DeletionStrategy::SoftDeleteFlag));
    }

    #[tokio::test]
    async fn test_list_sorts_and_paginates() {
        let repo = InMemoryUserRepository::new();
        seed(
            &repo,
            &[("carol", "c@x.io"), ("alice", "a@x.io"), ("bob", "b@x.io")],
        )
        .await;

        let query = UserListQuery::from_options(Some(1), Some(2), None, Some("username"), Some("asc"));
        let page = repo.list(&query).await.unwrap();

        assert_eq!(page.total, 3);
        let names: Vec<&str> = page.users.iter().map(|u| u.username()).collect();
        assert_eq!(names, vec!["alice", "bob"]);

        let query = UserListQuery::from_options(Some(2), Some(2), None, Some("username"), Some("asc"));
        let page = repo.list(&query).await.unwrap();
        let names: Vec<&str> = page.users.iter().map(|u| u.username()).collect();
        assert_eq!(names, vec!["carol"]);
    }

    #[tokio::test]
    async fn test_hard_remove_deletes_row() {
        let repo = InMemoryUserRepository::with_deletion_strategy(DeletionStrategy::Hard);
        let users = seed(&repo, &[("alice", "a@x.io")]).await;

        let mut tx = repo.begin().await.unwrap();
        tx.remove(users[0].id(), DeletionStrategy::Hard).await.unwrap();
        tx.commit().await.unwrap();

        assert!(repo.find_by_id(users[0].id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let repo = InMemoryUserRepository::new();
        repo.set_fail_writes(true);

        let mut tx = repo.begin().await.unwrap();
        let err = tx.insert(&NewUser::new("alice", "a@x.io")).await.unwrap_err();

        assert!(matches!(err, DomainError::Storage { .. }));
    }
}
