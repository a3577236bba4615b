//! Auth service: login, token check and logout.
//!
//! Holds no long-lived state. Store, password and issuer failures are logged
//! here and mapped onto the four `AuthError` outcomes.

use crate::crypto::{verify_password, PasswordError};
use crate::errors::{AuthError, SecretError, StoreError};
use crate::models::{AccountLookup, AuthenticatedUser, LoginCredentials, User};
use crate::observability::metrics::{
    record_login, record_token_revocation, record_token_validation,
};
use crate::repositories::{with_deadline, AccountGetter};
use crate::secrets::{SecretCreator, SecretDeleter, SecretIssuer, SecretValidator};
use common::secret::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};

pub struct AuthService {
    accounts: Arc<dyn AccountGetter>,
    creator: Arc<dyn SecretCreator>,
    validator: Arc<dyn SecretValidator>,
    deleter: Arc<dyn SecretDeleter>,
    store_timeout: Duration,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountGetter>,
        creator: Arc<dyn SecretCreator>,
        validator: Arc<dyn SecretValidator>,
        deleter: Arc<dyn SecretDeleter>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            accounts,
            creator,
            validator,
            deleter,
            store_timeout,
        }
    }

    /// Wire every secret capability to one issuer.
    pub fn with_issuer(
        accounts: Arc<dyn AccountGetter>,
        issuer: Arc<SecretIssuer>,
        store_timeout: Duration,
    ) -> Self {
        Self::new(
            accounts,
            Arc::clone(&issuer) as Arc<dyn SecretCreator>,
            Arc::clone(&issuer) as Arc<dyn SecretValidator>,
            issuer,
            store_timeout,
        )
    }

    /// Verify a password and mint a session token for the account.
    #[instrument(skip_all)]
    pub async fn create_user_secret(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<SecretString, AuthError> {
        let start = Instant::now();
        let result = self.login(credentials).await;

        let status = match &result {
            Ok(_) => "success",
            Err(e) => e.label(),
        };
        record_login(status, start.elapsed());

        result
    }

    async fn login(&self, credentials: &LoginCredentials) -> Result<SecretString, AuthError> {
        let lookup = validate_credentials(credentials)?;
        let user = self.find_account(&lookup).await?;

        let matched = verify_password(&credentials.password, &user.password_hash)
            .await
            .map_err(|e: PasswordError| {
                error!(target: "todo.services.auth", user_id = user.id, error = %e, "Password verification failed");
                AuthError::Internal(e.to_string())
            })?;

        if !matched {
            debug!(target: "todo.services.auth", user_id = user.id, "Login rejected: wrong password");
            return Err(AuthError::WrongSecret);
        }

        let identity = AuthenticatedUser {
            user_id: user.id,
            username: user.username,
        };

        let token = self.creator.create_secret(&identity).await.map_err(|e| {
            error!(target: "todo.services.auth", user_id = identity.user_id, error = %e, "Session token creation failed");
            AuthError::Internal(e.to_string())
        })?;

        info!(target: "todo.services.auth", user_id = identity.user_id, "User logged in");
        Ok(token)
    }

    async fn find_account(&self, lookup: &AccountLookup) -> Result<User, AuthError> {
        let result = match lookup {
            AccountLookup::ByUsername(username) => {
                with_deadline(
                    "get_account_by_username",
                    self.store_timeout,
                    self.accounts.get_account_by_username(username),
                )
                .await
            }
            AccountLookup::ById(user_id) => {
                with_deadline(
                    "get_account_by_id",
                    self.store_timeout,
                    self.accounts.get_account_by_id(*user_id),
                )
                .await
            }
        };

        result.map_err(|e| match e {
            StoreError::NotFound => {
                debug!(target: "todo.services.auth", "Login rejected: account not found");
                AuthError::NotFound
            }
            other => {
                error!(target: "todo.services.auth", error = %other, "Account lookup failed");
                AuthError::Internal(other.to_string())
            }
        })
    }

    /// Resolve a session token to its identity.
    ///
    /// Malformed, expired, forged and revoked tokens are all `WrongSecret`.
    #[instrument(skip_all)]
    pub async fn check_secret(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        match self.validator.validate_secret(token).await {
            Ok(claims) => {
                record_token_validation("success");
                Ok(claims.user())
            }
            Err(_) => {
                record_token_validation("error");
                Err(AuthError::WrongSecret)
            }
        }
    }

    /// Revoke a session token and return the identity it was issued to.
    #[instrument(skip_all)]
    pub async fn delete_secret(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        self.revoke(token, None).await
    }

    /// Revoke a session token only if it was issued to `caller`.
    ///
    /// The token is decoded once. A token held by another user is
    /// `AccessDenied` and stays valid.
    #[instrument(skip_all, fields(user_id = caller.user_id))]
    pub async fn delete_own_secret(
        &self,
        caller: &AuthenticatedUser,
        token: &str,
    ) -> Result<AuthenticatedUser, AuthError> {
        self.revoke(token, Some(caller.user_id)).await
    }

    async fn revoke(
        &self,
        token: &str,
        owner: Option<u64>,
    ) -> Result<AuthenticatedUser, AuthError> {
        match self.deleter.delete_secret(token, owner).await {
            Ok(claims) => {
                record_token_revocation("success");
                info!(target: "todo.services.auth", user_id = claims.userid, "Session token revoked");
                Ok(claims.user())
            }
            Err(SecretError::NotOwner) => {
                record_token_revocation("error");
                debug!(target: "todo.services.auth", "Logout rejected: token belongs to another user");
                Err(AuthError::AccessDenied)
            }
            Err(e) => {
                record_token_revocation("error");
                debug!(target: "todo.services.auth", error = %e, "Logout rejected");
                Err(AuthError::WrongSecret)
            }
        }
    }
}

/// Exactly one identifier and a non-empty password.
fn validate_credentials(credentials: &LoginCredentials) -> Result<AccountLookup, AuthError> {
    if credentials.password.expose_secret().is_empty() {
        return Err(AuthError::InvalidArgument(
            "password is required".to_string(),
        ));
    }

    match (&credentials.username, credentials.user_id) {
        (Some(_), Some(_)) => Err(AuthError::InvalidArgument(
            "specify either username or user id, not both".to_string(),
        )),
        (None, None) => Err(AuthError::InvalidArgument(
            "username or user id is required".to_string(),
        )),
        (Some(username), None) if username.is_empty() => Err(AuthError::InvalidArgument(
            "username must not be empty".to_string(),
        )),
        (Some(username), None) => Ok(AccountLookup::ByUsername(username.clone())),
        (None, Some(user_id)) => Ok(AccountLookup::ById(user_id)),
    }
}
