//! Bearer credential utilities shared by the gRPC gate and the token issuer.
//!
//! - Size limit applied BEFORE any parsing
//! - `Bearer ` prefix extraction from an `authorization` value
//! - Generic error messages so callers cannot tell rejection reasons apart
//!
//! # Usage
//!
//! ```rust
//! use common::jwt::{extract_bearer_token, BearerTokenError};
//!
//! assert_eq!(extract_bearer_token("Bearer abc.def.ghi"), Ok("abc.def.ghi"));
//! assert_eq!(extract_bearer_token("Basic dXNlcg=="), Err(BearerTokenError::InvalidFormat));
//! ```

use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Session tokens issued by this service are ~250 bytes. Anything larger than
/// this limit is rejected before base64 decoding or signature checks run.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Scheme prefix expected on the `authorization` metadata value.
pub const BEARER_PREFIX: &str = "Bearer ";

// =============================================================================
// Error Types
// =============================================================================

/// Reasons a bearer credential is rejected before verification.
///
/// All variants share one Display message. Use the variant (or
/// [`BearerTokenError::reason`]) for logs and metrics only.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerTokenError {
    /// Value does not start with `Bearer `.
    #[error("Invalid or missing bearer token")]
    InvalidFormat,

    /// Nothing after the prefix.
    #[error("Invalid or missing bearer token")]
    EmptyToken,

    /// Token exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("Invalid or missing bearer token")]
    TokenTooLarge,
}

impl BearerTokenError {
    /// Bounded label for metrics and structured logs.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::InvalidFormat => "invalid_format",
            Self::EmptyToken => "empty_token",
            Self::TokenTooLarge => "token_too_large",
        }
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Check a raw token against [`MAX_JWT_SIZE_BYTES`].
///
/// # Errors
///
/// Returns `BearerTokenError::TokenTooLarge` if the token is over the limit.
pub fn check_token_size(token: &str) -> Result<(), BearerTokenError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(BearerTokenError::TokenTooLarge);
    }
    Ok(())
}

/// Extract the token from an `authorization` value of the form `Bearer <token>`.
///
/// The token itself is not validated here, only its framing and size.
///
/// # Errors
///
/// - `InvalidFormat` if the `Bearer ` prefix is missing
/// - `EmptyToken` if nothing follows the prefix
/// - `TokenTooLarge` if the token exceeds [`MAX_JWT_SIZE_BYTES`]
pub fn extract_bearer_token(value: &str) -> Result<&str, BearerTokenError> {
    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(BearerTokenError::InvalidFormat)?;

    if token.is_empty() {
        return Err(BearerTokenError::EmptyToken);
    }

    check_token_size(token)?;

    Ok(token)
}
