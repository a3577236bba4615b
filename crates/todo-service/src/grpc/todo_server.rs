//! gRPC handlers for `todo_service.ToDoService`.
//!
//! Every RPC except `Login` arrives with an [`AuthenticatedUser`] extension set
//! by the request gate. Task RPCs are rejected with `PERMISSION_DENIED` when
//! the request names a different user than the one holding the token.

use crate::models::{AuthenticatedUser, LoginCredentials, TodoItemUpdate};
use crate::services::{AuthService, TodoService};
use common::secret::{ExposeSecret, SecretString};
use proto_gen::todo_service::{
    to_do_service_server::ToDoService, ChangedTaskByIdResponse, CheckSecretRequest,
    CheckSecretResponse, CreateTaskRequest, CreateTaskResponse, GetTaskByIdResponse,
    ListTasksRequest, ListTasksResponse, LoginRequest, LoginResponse, LogoutRequest,
    LogoutResponse, TaskByIdRequest, TaskSummary, UpdateTaskByIdRequest,
};
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{debug, instrument};

/// Matches `todo_items.title VARCHAR(255)`.
pub const MAX_TITLE_LENGTH: usize = 255;

pub struct TodoGrpcServer {
    auth: Arc<AuthService>,
    todos: Arc<TodoService>,
}

impl TodoGrpcServer {
    pub fn new(auth: Arc<AuthService>, todos: Arc<TodoService>) -> Self {
        Self { auth, todos }
    }
}

/// Identity the gate attached to this request.
#[expect(
    clippy::result_large_err,
    reason = "Status is the standard gRPC error type"
)]
fn caller<T>(request: &Request<T>) -> Result<AuthenticatedUser, Status> {
    request
        .extensions()
        .get::<AuthenticatedUser>()
        .cloned()
        .ok_or_else(|| Status::unauthenticated("Authentication required"))
}

/// The caller may only act on their own tasks.
#[expect(
    clippy::result_large_err,
    reason = "Status is the standard gRPC error type"
)]
fn ensure_self(caller: &AuthenticatedUser, user_id: u64) -> Result<(), Status> {
    if caller.user_id != user_id {
        debug!(
            target: "todo.grpc",
            caller_id = caller.user_id,
            requested_id = user_id,
            "Request names another user"
        );
        return Err(Status::permission_denied("Access denied"));
    }
    Ok(())
}

#[expect(
    clippy::result_large_err,
    reason = "Status is the standard gRPC error type"
)]
fn validate_title(title: &str) -> Result<(), Status> {
    if title.is_empty() {
        return Err(Status::invalid_argument("title is required"));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(Status::invalid_argument("title is too long"));
    }
    Ok(())
}

#[tonic::async_trait]
impl ToDoService for TodoGrpcServer {
    #[instrument(skip_all)]
    async fn login(
        &self,
        request: Request<LoginRequest>,
    ) -> Result<Response<LoginResponse>, Status> {
        let req = request.into_inner();
        let credentials = LoginCredentials {
            username: req.username,
            user_id: req.user_id,
            password: SecretString::from(req.password),
        };

        let token = self.auth.create_user_secret(&credentials).await?;

        Ok(Response::new(LoginResponse {
            token: token.expose_secret().to_string(),
        }))
    }

    #[instrument(skip_all)]
    async fn logout(
        &self,
        request: Request<LogoutRequest>,
    ) -> Result<Response<LogoutResponse>, Status> {
        let caller = caller(&request)?;
        let req = request.into_inner();

        self.auth.delete_own_secret(&caller, &req.token).await?;

        Ok(Response::new(LogoutResponse { success: true }))
    }

    #[instrument(skip_all)]
    async fn check_secret(
        &self,
        request: Request<CheckSecretRequest>,
    ) -> Result<Response<CheckSecretResponse>, Status> {
        let req = request.into_inner();

        let user = self.auth.check_secret(&req.secret).await?;

        Ok(Response::new(CheckSecretResponse {
            user_id: user.user_id,
            username: user.username,
        }))
    }

    #[instrument(skip_all, fields(user_id = request.get_ref().user_id))]
    async fn create_task(
        &self,
        request: Request<CreateTaskRequest>,
    ) -> Result<Response<CreateTaskResponse>, Status> {
        let caller = caller(&request)?;
        let req = request.into_inner();
        ensure_self(&caller, req.user_id)?;
        validate_title(&req.title)?;

        let task_id = self.todos.create(&req.title, req.user_id).await?;

        Ok(Response::new(CreateTaskResponse { task_id }))
    }

    #[instrument(skip_all, fields(user_id = request.get_ref().user_id))]
    async fn list_tasks(
        &self,
        request: Request<ListTasksRequest>,
    ) -> Result<Response<ListTasksResponse>, Status> {
        let caller = caller(&request)?;
        let req = request.into_inner();
        ensure_self(&caller, req.user_id)?;

        let tasks = self
            .todos
            .get_list(req.user_id)
            .await?
            .into_iter()
            .map(|item| TaskSummary {
                task_id: item.id,
                title: item.title,
                is_done: item.is_complete,
            })
            .collect();

        Ok(Response::new(ListTasksResponse { tasks }))
    }

    #[instrument(skip_all, fields(user_id = request.get_ref().user_id, task_id = request.get_ref().task_id))]
    async fn get_task_by_id(
        &self,
        request: Request<TaskByIdRequest>,
    ) -> Result<Response<GetTaskByIdResponse>, Status> {
        let caller = caller(&request)?;
        let req = request.into_inner();
        ensure_self(&caller, req.user_id)?;

        let item = self.todos.get_by_id(req.task_id, req.user_id).await?;

        Ok(Response::new(GetTaskByIdResponse {
            task_id: item.id,
            title: item.title,
            is_done: item.is_complete,
        }))
    }

    #[instrument(skip_all, fields(user_id = request.get_ref().user_id, task_id = request.get_ref().task_id))]
    async fn update_task_by_id(
        &self,
        request: Request<UpdateTaskByIdRequest>,
    ) -> Result<Response<ChangedTaskByIdResponse>, Status> {
        let caller = caller(&request)?;
        let req = request.into_inner();
        ensure_self(&caller, req.user_id)?;
        if let Some(title) = &req.title {
            validate_title(title)?;
        }

        let update = TodoItemUpdate {
            id: req.task_id,
            title: req.title,
            is_complete: req.is_done,
        };
        self.todos.update(&update, req.user_id).await?;

        Ok(Response::new(ChangedTaskByIdResponse {
            task_id: req.task_id,
            is_success: true,
        }))
    }

    #[instrument(skip_all, fields(user_id = request.get_ref().user_id, task_id = request.get_ref().task_id))]
    async fn delete_task_by_id(
        &self,
        request: Request<TaskByIdRequest>,
    ) -> Result<Response<ChangedTaskByIdResponse>, Status> {
        let caller = caller(&request)?;
        let req = request.into_inner();
        ensure_self(&caller, req.user_id)?;

        self.todos.delete_by_id(req.task_id, req.user_id).await?;

        Ok(Response::new(ChangedTaskByIdResponse {
            task_id: req.task_id,
            is_success: true,
        }))
    }
}
