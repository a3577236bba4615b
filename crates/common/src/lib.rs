//! Common utilities and types shared across the to-do backend crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for bearer credential parsing (prefix, size limits)
pub mod jwt;
