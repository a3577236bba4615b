//! gRPC surface: the request gate and the `ToDoService` handlers.

pub mod auth_gate;
pub mod todo_server;

pub use auth_gate::{CredentialCheck, GrpcAuthLayer};
pub use todo_server::TodoGrpcServer;
