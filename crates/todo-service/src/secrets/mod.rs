//! Secret issuer: mints, verifies and revokes signed session tokens.
//!
//! Tokens are HS256 JWTs carrying the account identity and a ledger-assigned
//! token id. Expiry and not-before are enforced by `jsonwebtoken` validation
//! with zero leeway. Revocation state is never held here; every validation
//! asks the [`TokenRevoker`].
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE decoding
//! - Only HS256 is accepted
//! - All verification failures collapse into [`SecretError::VerifyFailed`]
//! - The signing key is never printed; `username` is redacted in claims Debug

use crate::errors::SecretError;
use crate::ledger::{TokenIdAllocator, TokenRevoker};
use crate::models::AuthenticatedUser;
use async_trait::async_trait;
use common::jwt::check_token_size;
use common::secret::{ExposeSecret, SecretBox, SecretString};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Fixed `sub` claim for session tokens.
pub const SESSION_SUBJECT: &str = "user";

// =============================================================================
// Claims
// =============================================================================

/// Decoded session token payload.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub userid: u64,
    pub username: String,
    pub tokenid: u64,
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
}

impl fmt::Debug for SessionClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClaims")
            .field("userid", &self.userid)
            .field("username", &"[REDACTED]")
            .field("tokenid", &self.tokenid)
            .field("sub", &self.sub)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .finish()
    }
}

impl SessionClaims {
    /// Identity the token was issued for.
    pub fn user(&self) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: self.userid,
            username: self.username.clone(),
        }
    }
}

// =============================================================================
// Capabilities
// =============================================================================

#[async_trait]
pub trait SecretCreator: Send + Sync {
    async fn create_secret(&self, user: &AuthenticatedUser) -> Result<SecretString, SecretError>;
}

#[async_trait]
pub trait SecretValidator: Send + Sync {
    async fn validate_secret(&self, token: &str) -> Result<SessionClaims, SecretError>;
}

#[async_trait]
pub trait SecretDeleter: Send + Sync {
    /// Revoke `token` and return the claims it carried.
    ///
    /// With `owner` set, a token issued to any other user id is refused with
    /// `NotOwner` and left valid.
    async fn delete_secret(
        &self,
        token: &str,
        owner: Option<u64>,
    ) -> Result<SessionClaims, SecretError>;
}

// =============================================================================
// Issuer
// =============================================================================

pub struct SecretIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    max_age: Duration,
    allocator: Arc<dyn TokenIdAllocator>,
    revoker: Arc<dyn TokenRevoker>,
}

impl fmt::Debug for SecretIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretIssuer")
            .field("signing_key", &"[REDACTED]")
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl SecretIssuer {
    pub fn new(
        signing_secret: &SecretBox<Vec<u8>>,
        max_age: Duration,
        allocator: Arc<dyn TokenIdAllocator>,
        revoker: Arc<dyn TokenRevoker>,
    ) -> Self {
        let key = signing_secret.expose_secret();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "sub"]);
        validation.sub = Some(SESSION_SUBJECT.to_string());

        Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            validation,
            max_age,
            allocator,
            revoker,
        }
    }

    /// Mint a token as if the current time were `now` (Unix seconds).
    #[instrument(skip_all, fields(user_id = user.user_id))]
    pub async fn create_secret_at(
        &self,
        user: &AuthenticatedUser,
        now: i64,
    ) -> Result<SecretString, SecretError> {
        let max_age = i64::try_from(self.max_age.as_secs())
            .map_err(|_| SecretError::CreateFailed("max age out of range".to_string()))?;
        let exp = now
            .checked_add(max_age)
            .ok_or_else(|| SecretError::CreateFailed("expiry overflow".to_string()))?;

        let tokenid = self
            .allocator
            .allocate_id()
            .await
            .map_err(|e| SecretError::CreateFailed(format!("token id allocation failed: {e}")))?;

        let claims = SessionClaims {
            userid: user.user_id,
            username: user.username.clone(),
            tokenid,
            sub: SESSION_SUBJECT.to_string(),
            exp,
            iat: now,
            nbf: now,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SecretError::CreateFailed(format!("JWT signing failed: {e}")))?;

        debug!(target: "todo.secrets", token_id = tokenid, exp = exp, "Session token issued");

        Ok(SecretString::from(token))
    }

    /// Signature, time bounds and subject only. Revocation is not consulted.
    fn decode_claims(&self, token: &str) -> Result<SessionClaims, SecretError> {
        check_token_size(token).map_err(|_| SecretError::VerifyFailed)?;

        let data =
            decode::<SessionClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                debug!(target: "todo.secrets", error = %e, "Token verification failed");
                SecretError::VerifyFailed
            })?;

        Ok(data.claims)
    }

    async fn ensure_not_revoked(&self, claims: &SessionClaims) -> Result<(), SecretError> {
        let revoked = self.revoker.is_revoked(claims.tokenid).await.map_err(|e| {
            debug!(target: "todo.secrets", error = %e, "Revocation lookup failed");
            SecretError::VerifyFailed
        })?;

        if revoked {
            debug!(target: "todo.secrets", token_id = claims.tokenid, "Token rejected: revoked");
            return Err(SecretError::VerifyFailed);
        }
        Ok(())
    }
}

#[async_trait]
impl SecretCreator for SecretIssuer {
    async fn create_secret(&self, user: &AuthenticatedUser) -> Result<SecretString, SecretError> {
        self.create_secret_at(user, chrono::Utc::now().timestamp())
            .await
    }
}

#[async_trait]
impl SecretValidator for SecretIssuer {
    #[instrument(skip_all)]
    async fn validate_secret(&self, token: &str) -> Result<SessionClaims, SecretError> {
        let claims = self.decode_claims(token)?;
        self.ensure_not_revoked(&claims).await?;
        Ok(claims)
    }
}

#[async_trait]
impl SecretDeleter for SecretIssuer {
    /// Already-revoked tokens are rejected rather than silently accepted.
    /// The ledger decides the race: only the call that flips the id wins.
    #[instrument(skip_all)]
    async fn delete_secret(
        &self,
        token: &str,
        owner: Option<u64>,
    ) -> Result<SessionClaims, SecretError> {
        let claims = self.decode_claims(token)?;
        self.ensure_not_revoked(&claims).await?;

        if let Some(owner) = owner {
            if claims.userid != owner {
                debug!(
                    target: "todo.secrets",
                    token_id = claims.tokenid,
                    "Revocation refused: token belongs to another user"
                );
                return Err(SecretError::NotOwner);
            }
        }

        let newly_revoked = self.revoker.revoke(claims.tokenid).await.map_err(|e| {
            debug!(target: "todo.secrets", error = %e, "Revocation write failed");
            SecretError::VerifyFailed
        })?;

        if !newly_revoked {
            debug!(target: "todo.secrets", token_id = claims.tokenid, "Token rejected: revoked concurrently");
            return Err(SecretError::VerifyFailed);
        }

        debug!(target: "todo.secrets", token_id = claims.tokenid, "Session token revoked");
        Ok(claims)
    }
}
