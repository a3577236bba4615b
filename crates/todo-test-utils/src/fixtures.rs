//! Test fixtures: configuration and seeded accounts.

use common::secret::SecretString;
use std::collections::HashMap;
use std::sync::Arc;
use todo_service::config::Config;
use todo_service::models::AuthenticatedUser;
use todo_service::repositories::{AccountCreator, InMemoryStore};

/// Base64 of 32 bytes of `A`. Long enough for HS256.
pub const TEST_SIGNING_SECRET_B64: &str = "QUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUE=";

/// bcrypt cost for seeded accounts. Below the service minimum to keep tests fast.
pub const TEST_BCRYPT_COST: u32 = 4;

/// Environment for a test server bound to an ephemeral local port.
pub fn test_config_vars() -> HashMap<String, String> {
    HashMap::from([
        (
            "DATABASE_URL".to_string(),
            "postgresql://test/test".to_string(),
        ),
        ("GRPC_BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        (
            "TODO_SIGNING_SECRET".to_string(),
            TEST_SIGNING_SECRET_B64.to_string(),
        ),
        ("TOKEN_MAX_AGE_SECONDS".to_string(), "3600".to_string()),
        ("STORE_TIMEOUT_SECONDS".to_string(), "2".to_string()),
        ("REQUEST_TIMEOUT_SECONDS".to_string(), "10".to_string()),
        ("BCRYPT_COST".to_string(), "10".to_string()),
        ("ENV_MODE".to_string(), "local".to_string()),
        ("DRAIN_SECONDS".to_string(), "0".to_string()),
    ])
}

/// Parse [`test_config_vars`] with `overrides` applied on top.
pub fn test_config(overrides: &[(&str, &str)]) -> anyhow::Result<Config> {
    let mut vars = test_config_vars();
    for (key, value) in overrides {
        vars.insert((*key).to_string(), (*value).to_string());
    }

    Config::from_vars(&vars).map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))
}

/// Create an account whose password hashes to `password`.
pub async fn seed_user(
    store: &Arc<InMemoryStore>,
    username: &str,
    password: &str,
) -> AuthenticatedUser {
    let hash = bcrypt::hash(password, TEST_BCRYPT_COST).expect("Failed to hash password");

    store
        .create_account(username, &SecretString::from(hash))
        .await
        .expect("Failed to seed user")
}
