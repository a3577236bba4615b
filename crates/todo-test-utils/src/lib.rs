//! # To-do Test Utilities
//!
//! Shared test utilities for the to-do service.
//!
//! This crate provides:
//! - Fixtures (test configuration, seeded accounts)
//! - Server test harness (`TestTodoServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use todo_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestTodoServer::spawn().await?;
//!     let alice = server.seed_user("alice", "secret").await;
//!     let mut client = server.client().await?;
//!
//!     let token = login(&mut client, "alice", "secret").await?;
//!     assert!(!token.is_empty());
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod server_harness;

// Re-export commonly used items
pub use fixtures::*;
pub use server_harness::*;
