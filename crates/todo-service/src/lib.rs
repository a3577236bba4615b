//! To-do Service Library
//!
//! A gRPC service that issues, checks and revokes session tokens and serves
//! per-owner to-do lists behind them.
//!
//! # Architecture
//!
//! ```text
//! grpc/auth_gate.rs -> grpc/todo_server.rs -> services/*.rs -> repositories/*.rs
//!                                                  \-> secrets -> ledger
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `crypto` - bcrypt password hashing
//! - `errors` - Error types with gRPC status mapping
//! - `grpc` - Request gate and RPC handlers
//! - `ledger` - Token id allocation and revocation
//! - `models` - Domain types
//! - `observability` - Logging and metrics
//! - `repositories` - Credential store contracts and adapters
//! - `secrets` - Session token issuing and validation
//! - `server` - Stack wiring shared by the binary and test harness
//! - `services` - Auth and to-do business logic

pub mod config;
pub mod crypto;
pub mod errors;
pub mod grpc;
pub mod ledger;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod secrets;
pub mod server;
pub mod services;
