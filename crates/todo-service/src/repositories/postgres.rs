//! Postgres credential store.
//!
//! Tables `users` and `todo_items` (see `migrations/`). Ids are `BIGSERIAL`;
//! a requested id that does not fit `i64` cannot exist and reads as not found.

use super::{
    AccountCreator, AccountGetter, TodoItemCreator, TodoItemDeleter, TodoItemGetter,
    TodoItemUpdater,
};
use crate::errors::StoreError;
use crate::models::{AuthenticatedUser, ToDoItem, TodoItemUpdate, User};
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::instrument;

/// Open a pool whose connections carry a server-side `statement_timeout`.
pub async fn connect_pool(
    database_url: &str,
    max_connections: u32,
    statement_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    let url = add_query_timeout(database_url, statement_timeout.as_secs().max(1));

    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(statement_timeout)
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&url)
        .await
}

/// Adds statement_timeout to the database URL.
fn add_query_timeout(url: &str, timeout_secs: u64) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}options=-c%20statement_timeout%3D{}s",
        url, separator, timeout_secs
    )
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
}

#[derive(Debug, sqlx::FromRow)]
struct TodoItemRow {
    id: i64,
    owner_id: i64,
    title: String,
    is_complete: bool,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: from_db_id(row.id)?,
            username: row.username,
            password_hash: SecretString::from(row.password_hash),
        })
    }
}

impl TryFrom<TodoItemRow> for ToDoItem {
    type Error = StoreError;

    fn try_from(row: TodoItemRow) -> Result<Self, Self::Error> {
        Ok(ToDoItem {
            id: from_db_id(row.id)?,
            owner_id: from_db_id(row.owner_id)?,
            title: row.title,
            is_complete: row.is_complete,
        })
    }
}

fn to_db_id(id: u64) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::NotFound)
}

fn from_db_id(id: i64) -> Result<u64, StoreError> {
    u64::try_from(id).map_err(|_| StoreError::Database(format!("Negative id in database: {}", id)))
}

fn database_error(context: &str, e: &sqlx::Error) -> StoreError {
    StoreError::Database(format!("{}: {}", context, e))
}

/// sqlx-backed store over a shared pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explain why a keyed write matched no row: no such item, or another owner's.
    async fn classify_miss(&self, item_id: i64) -> StoreError {
        let owner: Result<Option<(i64,)>, sqlx::Error> =
            sqlx::query_as("SELECT owner_id FROM todo_items WHERE id = $1")
                .bind(item_id)
                .fetch_optional(&self.pool)
                .await;

        match owner {
            Ok(None) => StoreError::NotFound,
            Ok(Some(_)) => StoreError::AccessDenied,
            Err(e) => database_error("Failed to look up item owner", &e),
        }
    }
}

#[async_trait]
impl AccountGetter for PgStore {
    #[instrument(skip_all, fields(user_id = user_id))]
    async fn get_account_by_id(&self, user_id: u64) -> Result<User, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, password_hash
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(to_db_id(user_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("Failed to fetch user by id", &e))?;

        row.ok_or(StoreError::NotFound)?.try_into()
    }

    #[instrument(skip_all)]
    async fn get_account_by_username(&self, username: &str) -> Result<User, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, password_hash
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("Failed to fetch user by username", &e))?;

        row.ok_or(StoreError::NotFound)?.try_into()
    }
}

#[async_trait]
impl AccountCreator for PgStore {
    #[instrument(skip_all)]
    async fn create_account(
        &self,
        username: &str,
        password_hash: &SecretString,
    ) -> Result<AuthenticatedUser, StoreError> {
        let result: Result<(i64, String), sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO users (username, password_hash)
            VALUES ($1, $2)
            RETURNING id, username
            "#,
        )
        .bind(username)
        .bind(password_hash.expose_secret())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok((id, username)) => Ok(AuthenticatedUser {
                user_id: from_db_id(id)?,
                username,
            }),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                StoreError::Conflict(format!("username '{}' already exists", username)),
            ),
            Err(e) => Err(database_error("Failed to create user", &e)),
        }
    }
}

#[async_trait]
impl TodoItemCreator for PgStore {
    #[instrument(skip_all, fields(owner_id = owner_id))]
    async fn create_item(&self, title: &str, owner_id: u64) -> Result<u64, StoreError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO todo_items (owner_id, title)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(to_db_id(owner_id)?)
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| database_error("Failed to create item", &e))?;

        from_db_id(id)
    }
}

#[async_trait]
impl TodoItemGetter for PgStore {
    #[instrument(skip_all, fields(item_id = item_id, owner_id = owner_id))]
    async fn get_item(&self, item_id: u64, owner_id: u64) -> Result<ToDoItem, StoreError> {
        let row: Option<TodoItemRow> = sqlx::query_as(
            r#"
            SELECT id, owner_id, title, is_complete
            FROM todo_items
            WHERE id = $1
            "#,
        )
        .bind(to_db_id(item_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("Failed to fetch item", &e))?;

        let item = ToDoItem::try_from(row.ok_or(StoreError::NotFound)?)?;
        if item.owner_id != owner_id {
            return Err(StoreError::AccessDenied);
        }
        Ok(item)
    }

    #[instrument(skip_all, fields(owner_id = owner_id))]
    async fn list_items(&self, owner_id: u64) -> Result<Vec<ToDoItem>, StoreError> {
        let rows: Vec<TodoItemRow> = sqlx::query_as(
            r#"
            SELECT id, owner_id, title, is_complete
            FROM todo_items
            WHERE owner_id = $1
            ORDER BY id
            "#,
        )
        .bind(to_db_id(owner_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| database_error("Failed to list items", &e))?;

        rows.into_iter().map(ToDoItem::try_from).collect()
    }
}

#[async_trait]
impl TodoItemUpdater for PgStore {
    #[instrument(skip_all, fields(item_id = update.id, owner_id = owner_id))]
    async fn update_item(&self, update: &TodoItemUpdate, owner_id: u64) -> Result<(), StoreError> {
        let item_id = to_db_id(update.id)?;

        // NULL parameters keep the current column value
        let result = sqlx::query(
            r#"
            UPDATE todo_items
            SET title = COALESCE($3, title),
                is_complete = COALESCE($4, is_complete)
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(item_id)
        .bind(to_db_id(owner_id)?)
        .bind(update.title.as_deref())
        .bind(update.is_complete)
        .execute(&self.pool)
        .await
        .map_err(|e| database_error("Failed to update item", &e))?;

        if result.rows_affected() == 0 {
            return Err(self.classify_miss(item_id).await);
        }
        Ok(())
    }
}

#[async_trait]
impl TodoItemDeleter for PgStore {
    #[instrument(skip_all, fields(item_id = item_id, owner_id = owner_id))]
    async fn delete_item(&self, item_id: u64, owner_id: u64) -> Result<(), StoreError> {
        let item_id = to_db_id(item_id)?;

        let result = sqlx::query("DELETE FROM todo_items WHERE id = $1 AND owner_id = $2")
            .bind(item_id)
            .bind(to_db_id(owner_id)?)
            .execute(&self.pool)
            .await
            .map_err(|e| database_error("Failed to delete item", &e))?;

        if result.rows_affected() == 0 {
            return Err(self.classify_miss(item_id).await);
        }
        Ok(())
    }
}
