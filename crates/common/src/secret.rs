//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Use them for every
//! value that grants access: account passwords, issued session tokens, and the
//! token signing secret.
//!
//! `SecretBox<T>` and `SecretString` implement `Debug` with redaction, so a
//! struct that derives `Debug` while holding one of them stays safe to log via
//! `{:?}` or tracing fields. Secrets are zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct LoginAttempt {
//!     username: String,
//!     password: SecretString,
//! }
//!
//! let attempt = LoginAttempt {
//!     username: "alice".to_string(),
//!     password: SecretString::from("secret"),
//! };
//!
//! // Password is redacted in Debug output
//! assert!(!format!("{attempt:?}").contains("\"secret\""));
//!
//! // Reading the value is always explicit
//! let password: &str = attempt.password.expose_secret();
//! assert_eq!(password, "secret");
//! ```
//!
//! # Usage Guidelines
//!
//! - `SecretString`: passwords, bearer tokens handed back to callers
//! - `SecretBox<Vec<u8>>`: binary key material such as the HMAC signing secret

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretBox, SecretString};
