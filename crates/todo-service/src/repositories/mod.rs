//! Credential store contracts and adapters.
//!
//! Each operation is its own capability trait so a service declares only the
//! operations it needs. Two adapters implement all of them:
//!
//! - [`PgStore`] - Postgres via sqlx, used in production
//! - [`InMemoryStore`] - map-backed, used by tests and the test harness
//!
//! Stores enforce ownership on item reads and writes: an item that exists but
//! belongs to another owner yields `StoreError::AccessDenied`, never its data.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::{connect_pool, PgStore};

use crate::errors::StoreError;
use crate::models::{AuthenticatedUser, ToDoItem, TodoItemUpdate, User};
use crate::observability::metrics::record_store_operation;
use async_trait::async_trait;
use common::secret::SecretString;
use std::future::Future;
use std::time::{Duration, Instant};

#[async_trait]
pub trait AccountGetter: Send + Sync {
    async fn get_account_by_id(&self, user_id: u64) -> Result<User, StoreError>;

    async fn get_account_by_username(&self, username: &str) -> Result<User, StoreError>;
}

#[async_trait]
pub trait AccountCreator: Send + Sync {
    /// Fails with `StoreError::Conflict` if the username is taken.
    async fn create_account(
        &self,
        username: &str,
        password_hash: &SecretString,
    ) -> Result<AuthenticatedUser, StoreError>;
}

#[async_trait]
pub trait TodoItemCreator: Send + Sync {
    /// Returns the new item id.
    async fn create_item(&self, title: &str, owner_id: u64) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait TodoItemGetter: Send + Sync {
    async fn get_item(&self, item_id: u64, owner_id: u64) -> Result<ToDoItem, StoreError>;

    /// Items owned by `owner_id`, ordered by id.
    async fn list_items(&self, owner_id: u64) -> Result<Vec<ToDoItem>, StoreError>;
}

#[async_trait]
pub trait TodoItemUpdater: Send + Sync {
    /// Writes only the fields set in `update`.
    async fn update_item(&self, update: &TodoItemUpdate, owner_id: u64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TodoItemDeleter: Send + Sync {
    async fn delete_item(&self, item_id: u64, owner_id: u64) -> Result<(), StoreError>;
}

/// Run a store call under `deadline`, recording its outcome.
///
/// When the deadline elapses the call's future is dropped, which cancels any
/// in-flight query, and `StoreError::Timeout` is returned.
pub async fn with_deadline<T, F>(
    operation: &'static str,
    deadline: Duration,
    call: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    let start = Instant::now();

    let result = match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(deadline)),
    };

    let status = match &result {
        Ok(_) => "success",
        Err(StoreError::NotFound | StoreError::AccessDenied) => "rejected",
        Err(StoreError::Timeout(_)) => "timeout",
        Err(_) => "error",
    };
    record_store_operation(operation, status, start.elapsed());

    result
}
