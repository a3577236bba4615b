//! Request gate for the gRPC surface.
//!
//! Every call except `Login` must carry exactly one `authorization` metadata
//! value of the form `Bearer <token>`. The token is checked against the auth
//! service (signature, expiry and revocation) before the handler runs, and
//! the resolved [`AuthenticatedUser`] is stored in the request extensions.
//!
//! # Security
//!
//! - Rejections are `UNAUTHENTICATED` with one generic message
//! - Oversized tokens are dropped before any decoding
//! - Rejection reasons are logged at debug level and counted, never returned

use crate::errors::AuthError;
use crate::models::AuthenticatedUser;
use crate::observability::metrics::record_gate_rejection;
use crate::services::AuthService;
use async_trait::async_trait;
use common::jwt::extract_bearer_token;
use proto_gen::LOGIN_METHOD_PATH;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::body::BoxBody;
use tonic::codegen::http;
use tonic::Status;
use tower::{Layer, Service};

/// Resolves a session token to the identity it was issued for.
#[async_trait]
pub trait CredentialCheck: Send + Sync {
    async fn check_credential(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}

#[async_trait]
impl CredentialCheck for AuthService {
    async fn check_credential(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        self.check_secret(token).await
    }
}

/// Whether `path` may be called without a session token.
pub fn is_public_method(path: &str) -> bool {
    path == LOGIN_METHOD_PATH
}

/// Tower layer installing the gate in front of the gRPC router.
#[derive(Clone)]
pub struct GrpcAuthLayer {
    checker: Arc<dyn CredentialCheck>,
}

impl GrpcAuthLayer {
    pub fn new(checker: Arc<dyn CredentialCheck>) -> Self {
        Self { checker }
    }
}

impl<S> Layer<S> for GrpcAuthLayer {
    type Service = GrpcAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GrpcAuthService {
            inner,
            checker: Arc::clone(&self.checker),
        }
    }
}

#[derive(Clone)]
pub struct GrpcAuthService<S> {
    inner: S,
    checker: Arc<dyn CredentialCheck>,
}

impl<S, ReqBody> Service<http::Request<ReqBody>> for GrpcAuthService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<BoxBody>>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        // Take the service that was driven to readiness, leave a fresh clone
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let checker = Arc::clone(&self.checker);

        Box::pin(async move {
            if is_public_method(req.uri().path()) {
                return inner.call(req).await;
            }

            let token = match bearer_token(req.headers()) {
                Ok(token) => token,
                Err(reason) => {
                    tracing::debug!(target: "todo.grpc.auth", reason, "Rejected request");
                    record_gate_rejection(reason);
                    return Ok(unauthenticated_response());
                }
            };

            let user = match checker.check_credential(&token).await {
                Ok(user) => user,
                Err(e) => {
                    tracing::debug!(target: "todo.grpc.auth", error = %e, "Session token rejected");
                    record_gate_rejection("invalid_token");
                    return Ok(unauthenticated_response());
                }
            };

            tracing::debug!(target: "todo.grpc.auth", user_id = user.user_id, "Request authenticated");

            let (mut parts, body) = req.into_parts();
            parts.extensions.insert(user);
            inner.call(http::Request::from_parts(parts, body)).await
        })
    }
}

/// Pull the token out of the single `authorization` value.
///
/// Returns a bounded rejection reason on failure.
fn bearer_token(headers: &http::HeaderMap) -> Result<String, &'static str> {
    let mut values = headers.get_all(http::header::AUTHORIZATION).iter();

    let value = values.next().ok_or("missing_credential")?;
    if values.next().is_some() {
        return Err("multiple_credentials");
    }

    let value = value.to_str().map_err(|_| "invalid_encoding")?;
    extract_bearer_token(value)
        .map(str::to_string)
        .map_err(|e| e.reason())
}

fn unauthenticated_response() -> http::Response<BoxBody> {
    Status::unauthenticated("Authentication required").into_http()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use http::{HeaderValue, Request, Response};
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const INNER_SERVICE_REACHED: &str = "x-inner-service-reached";
    const AUTHENTICATED_AS: &str = "x-authenticated-as";
    const VALID_TOKEN: &str = "valid-token";
    const TASKS_PATH: &str = "/todo_service.ToDoService/ListTasks";

    /// Inner service that marks the response and echoes the gate's identity.
    #[derive(Clone)]
    struct MockInnerService;

    impl<ReqBody> Service<Request<ReqBody>> for MockInnerService
    where
        ReqBody: Send + 'static,
    {
        type Response = Response<BoxBody>;
        type Error = Infallible;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
            let username = req
                .extensions()
                .get::<AuthenticatedUser>()
                .map(|u| u.username.clone());

            Box::pin(async move {
                let mut builder = Response::builder()
                    .status(200)
                    .header(INNER_SERVICE_REACHED, "true");
                if let Some(username) = username {
                    builder = builder.header(AUTHENTICATED_AS, username);
                }
                Ok(builder.body(BoxBody::default()).expect("Failed to build response"))
            })
        }
    }

    /// Accepts only [`VALID_TOKEN`] and counts lookups.
    #[derive(Default)]
    struct MockChecker {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CredentialCheck for MockChecker {
        async fn check_credential(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if token == VALID_TOKEN {
                Ok(AuthenticatedUser {
                    user_id: 1,
                    username: "alice".to_string(),
                })
            } else {
                Err(AuthError::WrongSecret)
            }
        }
    }

    fn gate() -> (GrpcAuthService<MockInnerService>, Arc<MockChecker>) {
        let checker = Arc::new(MockChecker::default());
        let layer = GrpcAuthLayer::new(Arc::clone(&checker) as Arc<dyn CredentialCheck>);
        (layer.layer(MockInnerService), checker)
    }

    fn request(path: &str, auth_values: &[&str]) -> Request<()> {
        let mut builder = Request::builder().uri(path);
        for value in auth_values {
            builder = builder.header("authorization", *value);
        }
        builder.body(()).expect("Failed to build request")
    }

    fn inner_service_reached(response: &Response<BoxBody>) -> bool {
        response.headers().get(INNER_SERVICE_REACHED).is_some()
    }

    fn grpc_status(response: &Response<BoxBody>) -> Option<&str> {
        response
            .headers()
            .get("grpc-status")
            .and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn test_login_passes_without_credential() {
        let (mut service, checker) = gate();

        let response = service.call(request(LOGIN_METHOD_PATH, &[])).await.unwrap();

        assert!(inner_service_reached(&response));
        assert_eq!(checker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_credential_rejected() {
        let (mut service, checker) = gate();

        let response = service.call(request(TASKS_PATH, &[])).await.unwrap();

        assert!(!inner_service_reached(&response));
        // UNAUTHENTICATED
        assert_eq!(grpc_status(&response), Some("16"));
        assert_eq!(checker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_multiple_credentials_rejected() {
        let (mut service, checker) = gate();

        let auth = format!("Bearer {VALID_TOKEN}");
        let response = service
            .call(request(TASKS_PATH, &[&auth, &auth]))
            .await
            .unwrap();

        assert!(!inner_service_reached(&response));
        assert_eq!(checker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_rejected() {
        let (mut service, _checker) = gate();

        let response = service
            .call(request(TASKS_PATH, &["Basic dXNlcjpwYXNz"]))
            .await
            .unwrap();

        assert!(!inner_service_reached(&response));
    }

    #[tokio::test]
    async fn test_invalid_header_encoding_rejected() {
        let (mut service, _checker) = gate();

        let mut req = request(TASKS_PATH, &[]);
        req.headers_mut().insert(
            "authorization",
            HeaderValue::from_bytes(b"Bearer \xff\xfe invalid").unwrap(),
        );
        let response = service.call(req).await.unwrap();

        assert!(!inner_service_reached(&response));
    }

    #[tokio::test]
    async fn test_oversized_token_rejected_before_check() {
        let (mut service, checker) = gate();

        let auth = format!("Bearer {}", "a".repeat(common::jwt::MAX_JWT_SIZE_BYTES + 1));
        let response = service.call(request(TASKS_PATH, &[&auth])).await.unwrap();

        assert!(!inner_service_reached(&response));
        assert_eq!(checker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_token_rejected() {
        let (mut service, checker) = gate();

        let response = service
            .call(request(TASKS_PATH, &["Bearer forged"]))
            .await
            .unwrap();

        assert!(!inner_service_reached(&response));
        assert_eq!(grpc_status(&response), Some("16"));
        assert_eq!(checker.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler_with_identity() {
        let (mut service, _checker) = gate();

        let auth = format!("Bearer {VALID_TOKEN}");
        let response = service.call(request(TASKS_PATH, &[&auth])).await.unwrap();

        assert!(inner_service_reached(&response));
        assert_eq!(
            response
                .headers()
                .get(AUTHENTICATED_AS)
                .and_then(|v| v.to_str().ok()),
            Some("alice")
        );
    }

    #[test]
    fn test_only_login_is_public() {
        assert!(is_public_method(LOGIN_METHOD_PATH));
        assert!(!is_public_method("/todo_service.ToDoService/Logout"));
        assert!(!is_public_method("/todo_service.ToDoService/CheckSecret"));
        assert!(!is_public_method(TASKS_PATH));
        assert!(!is_public_method("/todo_service.ToDoService/Login/extra"));
    }

    #[test]
    fn test_poll_ready_delegates() {
        let (mut service, _checker) = gate();

        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        let result = Service::<Request<()>>::poll_ready(&mut service, &mut cx);
        assert!(matches!(result, Poll::Ready(Ok(()))));
    }
}
