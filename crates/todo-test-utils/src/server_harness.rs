//! Test server harness for E2E testing
//!
//! Provides `TestTodoServer` for spawning the real gRPC stack (gate, handlers,
//! services, issuer, ledger) over an in-memory store.

use crate::fixtures::{seed_user, test_config};
use proto_gen::todo_service::to_do_service_client::ToDoServiceClient;
use proto_gen::todo_service::LoginRequest;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use todo_service::config::Config;
use todo_service::models::AuthenticatedUser;
use todo_service::repositories::InMemoryStore;
use todo_service::server::ServiceStack;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, Server};

/// Test harness for spawning the to-do gRPC server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_login_e2e() -> anyhow::Result<()> {
///     let server = TestTodoServer::spawn().await?;
///     server.seed_user("alice", "secret").await;
///
///     let mut client = server.client().await?;
///     let token = login(&mut client, "alice", "secret").await?;
///     assert!(!token.is_empty());
///     Ok(())
/// }
/// ```
pub struct TestTodoServer {
    addr: SocketAddr,
    store: Arc<InMemoryStore>,
    stack: ServiceStack,
    config: Config,
    cancel_token: CancellationToken,
    _handle: JoinHandle<()>,
}

impl TestTodoServer {
    /// Spawn a server with an empty store and the default test config.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(Arc::new(InMemoryStore::new()), &[]).await
    }

    /// Spawn a server over `store`, with config `overrides` applied.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Run the request gate in front of every RPC
    /// - Stop when the harness is dropped
    pub async fn spawn_with(
        store: Arc<InMemoryStore>,
        overrides: &[(&str, &str)],
    ) -> Result<Self, anyhow::Error> {
        let config = test_config(overrides)?;

        let stack = ServiceStack::new(
            Arc::clone(&store),
            &config.signing_secret,
            config.token_max_age,
            config.store_timeout,
        );

        let listener = tokio::net::TcpListener::bind(&config.grpc_bind_address)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let cancel_token = CancellationToken::new();
        let shutdown = cancel_token.clone();

        // Convert tokio listener to tonic-compatible incoming stream
        let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);

        let server = Server::builder()
            .timeout(config.request_timeout)
            .layer(stack.auth_layer())
            .add_service(stack.grpc_service())
            .serve_with_incoming_shutdown(incoming, async move {
                shutdown.cancelled().await;
            });

        let handle = tokio::spawn(async move {
            if let Err(e) = server.await {
                eprintln!("Test server error: {}", e);
            }
        });

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(20)).await;

        Ok(Self {
            addr,
            store,
            stack,
            config,
            cancel_token,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    /// Services backing the server, for assertions that bypass the wire.
    pub fn stack(&self) -> &ServiceStack {
        &self.stack
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Seed an account directly into the backing store.
    pub async fn seed_user(&self, username: &str, password: &str) -> AuthenticatedUser {
        seed_user(&self.store, username, password).await
    }

    /// Connect a new gRPC client.
    pub async fn client(&self) -> Result<ToDoServiceClient<Channel>, anyhow::Error> {
        ToDoServiceClient::connect(self.url())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect client: {}", e))
    }
}

impl Drop for TestTodoServer {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Wrap `message` with `authorization: Bearer <token>`.
pub fn authorized<T>(message: T, token: &str) -> tonic::Request<T> {
    let mut request = tonic::Request::new(message);
    let value: MetadataValue<_> = format!("Bearer {}", token)
        .parse()
        .expect("Token is not valid metadata");
    request.metadata_mut().insert("authorization", value);
    request
}

/// Log in by username and return the session token.
pub async fn login(
    client: &mut ToDoServiceClient<Channel>,
    username: &str,
    password: &str,
) -> Result<String, tonic::Status> {
    let response = client
        .login(LoginRequest {
            username: Some(username.to_string()),
            user_id: None,
            password: password.to_string(),
        })
        .await?;

    Ok(response.into_inner().token)
}
