//! Wiring from a credential store to the gRPC service and its gate.

use crate::grpc::{CredentialCheck, GrpcAuthLayer, TodoGrpcServer};
use crate::ledger::{InMemoryTokenLedger, TokenIdAllocator, TokenRevoker};
use crate::repositories::{
    AccountGetter, TodoItemCreator, TodoItemDeleter, TodoItemGetter, TodoItemUpdater,
};
use crate::secrets::SecretIssuer;
use crate::services::{AuthService, TodoService};
use common::secret::SecretBox;
use proto_gen::todo_service::to_do_service_server::ToDoServiceServer;
use std::sync::Arc;
use std::time::Duration;

/// Services sharing one store and one token ledger.
#[derive(Clone)]
pub struct ServiceStack {
    pub auth: Arc<AuthService>,
    pub todos: Arc<TodoService>,
    pub ledger: Arc<InMemoryTokenLedger>,
}

impl ServiceStack {
    pub fn new<S>(
        store: Arc<S>,
        signing_secret: &SecretBox<Vec<u8>>,
        token_max_age: Duration,
        store_timeout: Duration,
    ) -> Self
    where
        S: AccountGetter
            + TodoItemCreator
            + TodoItemGetter
            + TodoItemUpdater
            + TodoItemDeleter
            + 'static,
    {
        let ledger = Arc::new(InMemoryTokenLedger::new());
        let issuer = Arc::new(SecretIssuer::new(
            signing_secret,
            token_max_age,
            Arc::clone(&ledger) as Arc<dyn TokenIdAllocator>,
            Arc::clone(&ledger) as Arc<dyn TokenRevoker>,
        ));

        let auth = Arc::new(AuthService::with_issuer(
            Arc::clone(&store) as Arc<dyn AccountGetter>,
            issuer,
            store_timeout,
        ));
        let todos = Arc::new(TodoService::from_store(store, store_timeout));

        Self {
            auth,
            todos,
            ledger,
        }
    }

    /// Gate layer checking tokens against this stack's auth service.
    pub fn auth_layer(&self) -> GrpcAuthLayer {
        GrpcAuthLayer::new(Arc::clone(&self.auth) as Arc<dyn CredentialCheck>)
    }

    pub fn grpc_service(&self) -> ToDoServiceServer<TodoGrpcServer> {
        ToDoServiceServer::new(TodoGrpcServer::new(
            Arc::clone(&self.auth),
            Arc::clone(&self.todos),
        ))
    }
}
