//! Error taxonomy, one enum per layer.
//!
//! Lower-layer errors (`StoreError`, `LedgerError`, `SecretError`) never cross
//! the RPC boundary. Services map them into `AuthError` / `TodoError`, and only
//! those two convert into `tonic::Status`.

use std::time::Duration;
use thiserror::Error;
use tonic::Status;

/// Message returned for every internal failure. Causes are logged, not sent.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal error";

/// Credential store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    #[error("Record belongs to another owner")]
    AccessDenied,

    #[error("Record already exists: {0}")]
    Conflict(String),

    #[error("Store call exceeded deadline of {0:?}")]
    Timeout(Duration),

    #[error("Database error: {0}")]
    Database(String),
}

/// Token ledger failures. The in-memory ledger never produces these.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Token ledger unavailable: {0}")]
    Unavailable(String),
}

/// Secret issuer failures.
///
/// `VerifyFailed` is deliberately reason-free: malformed, forged, expired and
/// revoked tokens are indistinguishable to callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecretError {
    #[error("Failed to create session token: {0}")]
    CreateFailed(String),

    #[error("The session token is invalid or expired")]
    VerifyFailed,

    #[error("The session token was issued to another user")]
    NotOwner,
}

/// Auth service outcomes.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid arguments: {0}")]
    InvalidArgument(String),

    #[error("Account not found")]
    NotFound,

    #[error("Wrong secret")]
    WrongSecret,

    /// Logout of a token issued to someone else.
    #[error("Access denied")]
    AccessDenied,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Bounded label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            AuthError::InvalidArgument(_) => "invalid_argument",
            AuthError::NotFound => "not_found",
            AuthError::WrongSecret => "wrong_secret",
            AuthError::AccessDenied => "access_denied",
            AuthError::Internal(_) => "internal",
        }
    }
}

/// Todo service outcomes.
#[derive(Debug, Error)]
pub enum TodoError {
    #[error("Item not found")]
    ItemNotFound,

    #[error("Access denied")]
    AccessDenied,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for Status {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidArgument(reason) => Status::invalid_argument(reason),
            AuthError::NotFound => Status::not_found("Account not found"),
            AuthError::WrongSecret => Status::unauthenticated("Invalid credentials"),
            AuthError::AccessDenied => Status::permission_denied("Access denied"),
            AuthError::Internal(_) => Status::internal(INTERNAL_ERROR_MESSAGE),
        }
    }
}

impl From<TodoError> for Status {
    fn from(err: TodoError) -> Self {
        match err {
            TodoError::ItemNotFound => Status::not_found("Task not found"),
            TodoError::AccessDenied => Status::permission_denied("Access denied"),
            TodoError::Internal(_) => Status::internal(INTERNAL_ERROR_MESSAGE),
        }
    }
}
