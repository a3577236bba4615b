//! Password hashing and verification (bcrypt).
//!
//! bcrypt is CPU-bound (~200ms at cost 12), so both operations run on the
//! blocking thread pool and never stall the async executor.

use crate::config::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use crate::observability::metrics::record_bcrypt_duration;
use common::secret::{ExposeSecret, SecretString};
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Invalid bcrypt cost: {0} (must be {min}-{max})", min = MIN_BCRYPT_COST, max = MAX_BCRYPT_COST)]
    InvalidCost(u32),

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Stored password hash is unreadable: {0}")]
    MalformedHash(String),

    #[error("Password task failed: {0}")]
    Task(String),
}

/// Hash `password` with bcrypt at `cost`.
///
/// # Errors
///
/// Returns `PasswordError::InvalidCost` if cost is outside 10-14, or
/// `PasswordError::Hash` if bcrypt fails.
#[instrument(skip_all)]
pub async fn hash_password(
    password: &SecretString,
    cost: u32,
) -> Result<SecretString, PasswordError> {
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        return Err(PasswordError::InvalidCost(cost));
    }

    let password = password.clone();
    let start = Instant::now();
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password.expose_secret(), cost))
        .await
        .map_err(|e| PasswordError::Task(e.to_string()))?
        .map_err(|e| PasswordError::Hash(e.to_string()))?;
    record_bcrypt_duration("hash", start.elapsed());

    Ok(SecretString::from(hash))
}

/// Constant-time comparison of `password` against a bcrypt `hash`.
///
/// Returns `Ok(false)` on mismatch.
///
/// # Errors
///
/// Returns `PasswordError::MalformedHash` if `hash` is not a bcrypt hash.
#[instrument(skip_all)]
pub async fn verify_password(
    password: &SecretString,
    hash: &SecretString,
) -> Result<bool, PasswordError> {
    let password = password.clone();
    let hash = hash.clone();
    let start = Instant::now();
    let matched = tokio::task::spawn_blocking(move || {
        bcrypt::verify(password.expose_secret(), hash.expose_secret())
    })
    .await
    .map_err(|e| PasswordError::Task(e.to_string()))?
    .map_err(|e| PasswordError::MalformedHash(e.to_string()))?;
    record_bcrypt_duration("verify", start.elapsed());

    Ok(matched)
}
