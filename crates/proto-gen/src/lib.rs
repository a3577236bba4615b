//! Generated Protocol Buffer code for the to-do service.
//!
//! This crate contains the compiled gRPC definitions (messages, server trait
//! and client) for the `todo_service.ToDoService` RPC surface.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)] // Generated code has various doc formatting
#![allow(clippy::default_trait_access)]

// Re-export prost traits for convenience
pub use prost::Message;

// Generated protobuf modules
pub mod todo_service {
    //! Authentication and task management messages
    include!("generated/todo_service.rs");
}

/// Method path for `Login`, the only RPC callable without a session token.
pub const LOGIN_METHOD_PATH: &str = "/todo_service.ToDoService/Login";
