//! Todo service: owner-scoped task operations over the item store.

use crate::errors::{StoreError, TodoError};
use crate::models::{ToDoItem, TodoItemUpdate};
use crate::repositories::{
    with_deadline, TodoItemCreator, TodoItemDeleter, TodoItemGetter, TodoItemUpdater,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument};

pub struct TodoService {
    creator: Arc<dyn TodoItemCreator>,
    getter: Arc<dyn TodoItemGetter>,
    updater: Arc<dyn TodoItemUpdater>,
    deleter: Arc<dyn TodoItemDeleter>,
    store_timeout: Duration,
}

impl TodoService {
    pub fn new(
        creator: Arc<dyn TodoItemCreator>,
        getter: Arc<dyn TodoItemGetter>,
        updater: Arc<dyn TodoItemUpdater>,
        deleter: Arc<dyn TodoItemDeleter>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            creator,
            getter,
            updater,
            deleter,
            store_timeout,
        }
    }

    /// Use one store for every capability.
    pub fn from_store<S>(store: Arc<S>, store_timeout: Duration) -> Self
    where
        S: TodoItemCreator + TodoItemGetter + TodoItemUpdater + TodoItemDeleter + 'static,
    {
        Self::new(
            Arc::clone(&store) as Arc<dyn TodoItemCreator>,
            Arc::clone(&store) as Arc<dyn TodoItemGetter>,
            Arc::clone(&store) as Arc<dyn TodoItemUpdater>,
            store,
            store_timeout,
        )
    }

    #[instrument(skip_all, fields(owner_id = owner_id))]
    pub async fn create(&self, title: &str, owner_id: u64) -> Result<u64, TodoError> {
        let id = with_deadline(
            "create_item",
            self.store_timeout,
            self.creator.create_item(title, owner_id),
        )
        .await
        .map_err(|e| map_store_error("create_item", e))?;

        debug!(target: "todo.services.todo", item_id = id, "Task created");
        Ok(id)
    }

    #[instrument(skip_all, fields(item_id = item_id, owner_id = owner_id))]
    pub async fn get_by_id(&self, item_id: u64, owner_id: u64) -> Result<ToDoItem, TodoError> {
        let item = with_deadline(
            "get_item",
            self.store_timeout,
            self.getter.get_item(item_id, owner_id),
        )
        .await
        .map_err(|e| map_store_error("get_item", e))?;

        // Stores check ownership too; never hand out another owner's item
        if item.owner_id != owner_id {
            return Err(TodoError::AccessDenied);
        }
        Ok(item)
    }

    #[instrument(skip_all, fields(owner_id = owner_id))]
    pub async fn get_list(&self, owner_id: u64) -> Result<Vec<ToDoItem>, TodoError> {
        with_deadline(
            "list_items",
            self.store_timeout,
            self.getter.list_items(owner_id),
        )
        .await
        .map_err(|e| map_store_error("list_items", e))
    }

    /// Apply the fields set in `update`. An update with no fields succeeds
    /// once ownership is confirmed.
    #[instrument(skip_all, fields(item_id = update.id, owner_id = owner_id))]
    pub async fn update(&self, update: &TodoItemUpdate, owner_id: u64) -> Result<(), TodoError> {
        self.get_by_id(update.id, owner_id).await?;

        if update.is_empty() {
            debug!(target: "todo.services.todo", "Empty update, nothing to write");
            return Ok(());
        }

        with_deadline(
            "update_item",
            self.store_timeout,
            self.updater.update_item(update, owner_id),
        )
        .await
        .map_err(|e| map_store_error("update_item", e))
    }

    #[instrument(skip_all, fields(item_id = item_id, owner_id = owner_id))]
    pub async fn delete_by_id(&self, item_id: u64, owner_id: u64) -> Result<(), TodoError> {
        self.get_by_id(item_id, owner_id).await?;

        with_deadline(
            "delete_item",
            self.store_timeout,
            self.deleter.delete_item(item_id, owner_id),
        )
        .await
        .map_err(|e| map_store_error("delete_item", e))?;

        debug!(target: "todo.services.todo", "Task deleted");
        Ok(())
    }
}

fn map_store_error(operation: &'static str, err: StoreError) -> TodoError {
    match err {
        StoreError::NotFound => TodoError::ItemNotFound,
        StoreError::AccessDenied => TodoError::AccessDenied,
        other => {
            error!(target: "todo.services.todo", operation, error = %other, "Item store call failed");
            TodoError::Internal(other.to_string())
        }
    }
}
