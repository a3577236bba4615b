//! End-to-end tests over a real gRPC connection.
//!
//! Each test spawns the full stack (gate, handlers, services, issuer, ledger)
//! on an ephemeral port with an in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proto_gen::todo_service::{
    CheckSecretRequest, CreateTaskRequest, ListTasksRequest, LoginRequest, LogoutRequest,
    TaskByIdRequest, UpdateTaskByIdRequest,
};
use std::sync::Arc;
use std::time::Duration;
use todo_service::repositories::InMemoryStore;
use todo_test_utils::{authorized, login, TestTodoServer};
use tonic::Code;

async fn server_with_alice_and_bob() -> TestTodoServer {
    let server = TestTodoServer::spawn().await.unwrap();
    server.seed_user("alice", "secret").await;
    server.seed_user("bob", "hunter2").await;
    server
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_and_check_secret() {
    let server = server_with_alice_and_bob().await;
    let mut client = server.client().await.unwrap();

    let token = login(&mut client, "alice", "secret").await.unwrap();
    assert!(!token.is_empty());

    let identity = client
        .check_secret(authorized(
            CheckSecretRequest {
                secret: token.clone(),
            },
            &token,
        ))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(identity.user_id, 1);
    assert_eq!(identity.username, "alice");
}

#[tokio::test]
async fn test_login_by_user_id() {
    let server = server_with_alice_and_bob().await;
    let mut client = server.client().await.unwrap();

    let token = client
        .login(LoginRequest {
            username: None,
            user_id: Some(2),
            password: "hunter2".to_string(),
        })
        .await
        .unwrap()
        .into_inner()
        .token;

    let identity = client
        .check_secret(authorized(
            CheckSecretRequest {
                secret: token.clone(),
            },
            &token,
        ))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(identity.username, "bob");
}

#[tokio::test]
async fn test_login_failures_map_to_status_codes() {
    let server = server_with_alice_and_bob().await;
    let mut client = server.client().await.unwrap();

    let wrong_password = login(&mut client, "alice", "wrong").await.unwrap_err();
    assert_eq!(wrong_password.code(), Code::Unauthenticated);

    let unknown = login(&mut client, "carol", "secret").await.unwrap_err();
    assert_eq!(unknown.code(), Code::NotFound);

    let both = client
        .login(LoginRequest {
            username: Some("alice".to_string()),
            user_id: Some(1),
            password: "secret".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(both.code(), Code::InvalidArgument);

    let neither = client
        .login(LoginRequest {
            username: None,
            user_id: None,
            password: "secret".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(neither.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn test_slow_store_is_opaque_internal_error() {
    let store = Arc::new(InMemoryStore::with_latency(Duration::from_secs(3)));
    let server = TestTodoServer::spawn_with(store, &[("STORE_TIMEOUT_SECONDS", "1")])
        .await
        .unwrap();
    let mut client = server.client().await.unwrap();

    let status = login(&mut client, "alice", "secret").await.unwrap_err();

    assert_eq!(status.code(), Code::Internal);
    assert_eq!(status.message(), "Internal error");
}

// ============================================================================
// Request gate
// ============================================================================

#[tokio::test]
async fn test_protected_rpcs_require_token() {
    let server = server_with_alice_and_bob().await;
    let mut client = server.client().await.unwrap();

    let list = client
        .list_tasks(ListTasksRequest { user_id: 1 })
        .await
        .unwrap_err();
    assert_eq!(list.code(), Code::Unauthenticated);

    let check = client
        .check_secret(CheckSecretRequest {
            secret: "anything".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(check.code(), Code::Unauthenticated);

    let forged = client
        .list_tasks(authorized(ListTasksRequest { user_id: 1 }, "not.a.token"))
        .await
        .unwrap_err();
    assert_eq!(forged.code(), Code::Unauthenticated);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let server = TestTodoServer::spawn_with(
        Arc::new(InMemoryStore::new()),
        &[("TOKEN_MAX_AGE_SECONDS", "1")],
    )
    .await
    .unwrap();
    server.seed_user("alice", "secret").await;
    let mut client = server.client().await.unwrap();

    let token = login(&mut client, "alice", "secret").await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let status = client
        .list_tasks(authorized(ListTasksRequest { user_id: 1 }, &token))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);
}

// ============================================================================
// Tasks
// ============================================================================

#[tokio::test]
async fn test_task_lifecycle() {
    let server = server_with_alice_and_bob().await;
    let mut client = server.client().await.unwrap();
    let token = login(&mut client, "alice", "secret").await.unwrap();

    let task_id = client
        .create_task(authorized(
            CreateTaskRequest {
                title: "buy milk".to_string(),
                user_id: 1,
            },
            &token,
        ))
        .await
        .unwrap()
        .into_inner()
        .task_id;

    let task = client
        .get_task_by_id(authorized(TaskByIdRequest { task_id, user_id: 1 }, &token))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(task.title, "buy milk");
    assert!(!task.is_done);

    let updated = client
        .update_task_by_id(authorized(
            UpdateTaskByIdRequest {
                task_id,
                user_id: 1,
                title: None,
                is_done: Some(true),
            },
            &token,
        ))
        .await
        .unwrap()
        .into_inner();
    assert!(updated.is_success);
    assert_eq!(updated.task_id, task_id);

    let tasks = client
        .list_tasks(authorized(ListTasksRequest { user_id: 1 }, &token))
        .await
        .unwrap()
        .into_inner()
        .tasks;
    assert_eq!(tasks.len(), 1);
    assert!(tasks.iter().all(|t| t.title == "buy milk" && t.is_done));

    let deleted = client
        .delete_task_by_id(authorized(TaskByIdRequest { task_id, user_id: 1 }, &token))
        .await
        .unwrap()
        .into_inner();
    assert!(deleted.is_success);

    let gone = client
        .get_task_by_id(authorized(TaskByIdRequest { task_id, user_id: 1 }, &token))
        .await
        .unwrap_err();
    assert_eq!(gone.code(), Code::NotFound);
}

#[tokio::test]
async fn test_tasks_are_isolated_between_users() {
    let server = server_with_alice_and_bob().await;
    let mut client = server.client().await.unwrap();
    let alice = login(&mut client, "alice", "secret").await.unwrap();
    let bob = login(&mut client, "bob", "hunter2").await.unwrap();

    let task_id = client
        .create_task(authorized(
            CreateTaskRequest {
                title: "buy milk".to_string(),
                user_id: 1,
            },
            &alice,
        ))
        .await
        .unwrap()
        .into_inner()
        .task_id;

    // Bob naming Alice as the owner
    let impersonation = client
        .get_task_by_id(authorized(TaskByIdRequest { task_id, user_id: 1 }, &bob))
        .await
        .unwrap_err();
    assert_eq!(impersonation.code(), Code::PermissionDenied);

    // Bob asking for Alice's task as himself
    let foreign = client
        .get_task_by_id(authorized(TaskByIdRequest { task_id, user_id: 2 }, &bob))
        .await
        .unwrap_err();
    assert_eq!(foreign.code(), Code::PermissionDenied);

    let delete = client
        .delete_task_by_id(authorized(TaskByIdRequest { task_id, user_id: 2 }, &bob))
        .await
        .unwrap_err();
    assert_eq!(delete.code(), Code::PermissionDenied);

    let bob_tasks = client
        .list_tasks(authorized(ListTasksRequest { user_id: 2 }, &bob))
        .await
        .unwrap()
        .into_inner()
        .tasks;
    assert!(bob_tasks.is_empty());

    let still_there = client
        .get_task_by_id(authorized(TaskByIdRequest { task_id, user_id: 1 }, &alice))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(still_there.title, "buy milk");
}

#[tokio::test]
async fn test_create_task_rejects_empty_title() {
    let server = server_with_alice_and_bob().await;
    let mut client = server.client().await.unwrap();
    let token = login(&mut client, "alice", "secret").await.unwrap();

    let status = client
        .create_task(authorized(
            CreateTaskRequest {
                title: String::new(),
                user_id: 1,
            },
            &token,
        ))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

// ============================================================================
// Logout
// ============================================================================

#[tokio::test]
async fn test_logout_revokes_token() {
    let server = server_with_alice_and_bob().await;
    let mut client = server.client().await.unwrap();
    let token = login(&mut client, "alice", "secret").await.unwrap();

    let response = client
        .logout(authorized(
            LogoutRequest {
                token: token.clone(),
            },
            &token,
        ))
        .await
        .unwrap()
        .into_inner();
    assert!(response.success);

    let after = client
        .list_tasks(authorized(ListTasksRequest { user_id: 1 }, &token))
        .await
        .unwrap_err();
    assert_eq!(after.code(), Code::Unauthenticated);

    let again = client
        .logout(authorized(
            LogoutRequest {
                token: token.clone(),
            },
            &token,
        ))
        .await
        .unwrap_err();
    assert_eq!(again.code(), Code::Unauthenticated);

    assert_eq!(server.stack().ledger.revoked_count().await, 1);
}

#[tokio::test]
async fn test_cannot_log_out_another_users_token() {
    let server = server_with_alice_and_bob().await;
    let mut client = server.client().await.unwrap();
    let alice = login(&mut client, "alice", "secret").await.unwrap();
    let bob = login(&mut client, "bob", "hunter2").await.unwrap();

    let status = client
        .logout(authorized(
            LogoutRequest {
                token: alice.clone(),
            },
            &bob,
        ))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::PermissionDenied);

    // Alice's session survives
    client
        .list_tasks(authorized(ListTasksRequest { user_id: 1 }, &alice))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_concurrent_logouts_of_one_token_succeed_once() {
    let server = server_with_alice_and_bob().await;
    let mut client = server.client().await.unwrap();
    let token = login(&mut client, "alice", "secret").await.unwrap();

    let logouts: Vec<_> = (0..4)
        .map(|_| {
            let mut client = client.clone();
            let token = token.clone();
            tokio::spawn(async move {
                client
                    .logout(authorized(
                        LogoutRequest {
                            token: token.clone(),
                        },
                        &token,
                    ))
                    .await
            })
        })
        .collect();

    let mut succeeded = 0;
    for logout in logouts {
        match logout.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(status) => assert_eq!(status.code(), Code::Unauthenticated),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(server.stack().ledger.revoked_count().await, 1);
}

#[tokio::test]
async fn test_concurrent_sessions_are_independent() {
    let server = server_with_alice_and_bob().await;
    let client = server.client().await.unwrap();

    let (alice, bob) = tokio::join!(
        {
            let mut client = client.clone();
            async move { login(&mut client, "alice", "secret").await }
        },
        {
            let mut client = client.clone();
            async move { login(&mut client, "bob", "hunter2").await }
        }
    );
    let alice = alice.unwrap();
    let bob = bob.unwrap();
    assert_ne!(alice, bob);

    let mut client = client;
    client
        .logout(authorized(
            LogoutRequest {
                token: bob.clone(),
            },
            &bob,
        ))
        .await
        .unwrap();

    client
        .list_tasks(authorized(ListTasksRequest { user_id: 1 }, &alice))
        .await
        .unwrap();
    let bob_after = client
        .list_tasks(authorized(ListTasksRequest { user_id: 2 }, &bob))
        .await
        .unwrap_err();
    assert_eq!(bob_after.code(), Code::Unauthenticated);
}
