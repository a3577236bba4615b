//! In-memory credential store.
//!
//! Satisfies the same contracts as [`super::PgStore`], guarded by a single
//! `RwLock`. Ids are assigned monotonically from 1 and never reused.

use super::{
    AccountCreator, AccountGetter, TodoItemCreator, TodoItemDeleter, TodoItemGetter,
    TodoItemUpdater,
};
use crate::errors::StoreError;
use crate::models::{AuthenticatedUser, ToDoItem, TodoItemUpdate, User};
use async_trait::async_trait;
use common::secret::SecretString;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    users: HashMap<u64, User>,
    items: BTreeMap<u64, ToDoItem>,
    last_user_id: u64,
    last_item_id: u64,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    latency: Option<Duration>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that sleeps for `latency` before every call. Used to exercise
    /// store deadlines.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            state: RwLock::default(),
            latency: Some(latency),
        }
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Look up an item and check it belongs to `owner_id`.
    fn owned_item(state: &State, item_id: u64, owner_id: u64) -> Result<&ToDoItem, StoreError> {
        let item = state.items.get(&item_id).ok_or(StoreError::NotFound)?;
        if item.owner_id != owner_id {
            return Err(StoreError::AccessDenied);
        }
        Ok(item)
    }
}

#[async_trait]
impl AccountGetter for InMemoryStore {
    async fn get_account_by_id(&self, user_id: u64) -> Result<User, StoreError> {
        self.simulate_latency().await;
        self.state
            .read()
            .await
            .users
            .get(&user_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_account_by_username(&self, username: &str) -> Result<User, StoreError> {
        self.simulate_latency().await;
        self.state
            .read()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl AccountCreator for InMemoryStore {
    async fn create_account(
        &self,
        username: &str,
        password_hash: &SecretString,
    ) -> Result<AuthenticatedUser, StoreError> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;

        if state.users.values().any(|u| u.username == username) {
            return Err(StoreError::Conflict(format!(
                "username '{}' already exists",
                username
            )));
        }

        state.last_user_id += 1;
        let id = state.last_user_id;
        state.users.insert(
            id,
            User {
                id,
                username: username.to_string(),
                password_hash: password_hash.clone(),
            },
        );

        Ok(AuthenticatedUser {
            user_id: id,
            username: username.to_string(),
        })
    }
}

#[async_trait]
impl TodoItemCreator for InMemoryStore {
    async fn create_item(&self, title: &str, owner_id: u64) -> Result<u64, StoreError> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;

        state.last_item_id += 1;
        let id = state.last_item_id;
        state.items.insert(
            id,
            ToDoItem {
                id,
                owner_id,
                title: title.to_string(),
                is_complete: false,
            },
        );

        Ok(id)
    }
}

#[async_trait]
impl TodoItemGetter for InMemoryStore {
    async fn get_item(&self, item_id: u64, owner_id: u64) -> Result<ToDoItem, StoreError> {
        self.simulate_latency().await;
        let state = self.state.read().await;
        Self::owned_item(&state, item_id, owner_id).cloned()
    }

    async fn list_items(&self, owner_id: u64) -> Result<Vec<ToDoItem>, StoreError> {
        self.simulate_latency().await;
        Ok(self
            .state
            .read()
            .await
            .items
            .values()
            .filter(|item| item.owner_id == owner_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TodoItemUpdater for InMemoryStore {
    async fn update_item(&self, update: &TodoItemUpdate, owner_id: u64) -> Result<(), StoreError> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;

        Self::owned_item(&state, update.id, owner_id)?;
        let item = state.items.get_mut(&update.id).ok_or(StoreError::NotFound)?;

        if let Some(title) = &update.title {
            item.title.clone_from(title);
        }
        if let Some(is_complete) = update.is_complete {
            item.is_complete = is_complete;
        }

        Ok(())
    }
}

#[async_trait]
impl TodoItemDeleter for InMemoryStore {
    async fn delete_item(&self, item_id: u64, owner_id: u64) -> Result<(), StoreError> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;

        Self::owned_item(&state, item_id, owner_id)?;
        state.items.remove(&item_id);

        Ok(())
    }
}
