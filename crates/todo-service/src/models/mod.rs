use common::secret::SecretString;
use std::fmt;

/// Account record as held by the credential store.
#[derive(Clone)]
pub struct User {
    pub id: u64,
    pub username: String,
    /// bcrypt hash, never logged.
    pub password_hash: SecretString,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// Identity resolved from a valid session token.
///
/// Inserted into request extensions by the auth gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: u64,
    pub username: String,
}

/// Which identifier a login attempt names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountLookup {
    ByUsername(String),
    ById(u64),
}

/// Login input as received from the caller, before validation.
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub username: Option<String>,
    pub user_id: Option<u64>,
    pub password: SecretString,
}

/// A to-do record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToDoItem {
    pub id: u64,
    pub owner_id: u64,
    pub title: String,
    pub is_complete: bool,
}

/// Partial update of a to-do record. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoItemUpdate {
    pub id: u64,
    pub title: Option<String>,
    pub is_complete: Option<bool>,
}

impl TodoItemUpdate {
    /// True when the update would not write any column.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.is_complete.is_none()
    }
}
