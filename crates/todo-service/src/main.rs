//! To-do Service
//!
//! Entry point for the session-authenticated to-do gRPC service.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use todo_service::config::Config;
use todo_service::observability::{logging, metrics};
use todo_service::repositories::{connect_pool, PgStore};
use todo_service::server::ServiceStack;
use tokio::signal;
use tonic::transport::Server;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration comes first: it selects the log format
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    logging::init_logging(config.env_mode)?;

    info!("Starting To-do Service");
    info!(
        grpc_bind_address = %config.grpc_bind_address,
        env_mode = ?config.env_mode,
        token_max_age_seconds = config.token_max_age.as_secs(),
        store_timeout_seconds = config.store_timeout.as_secs(),
        "Configuration loaded successfully"
    );

    if let Some(metrics_addr) = &config.metrics_bind_address {
        let metrics_addr: SocketAddr = metrics_addr.parse().map_err(|e| {
            error!("Invalid metrics bind address: {}", e);
            e
        })?;
        metrics::init_metrics_recorder(metrics_addr).map_err(|e| {
            error!("Failed to initialize metrics: {}", e);
            e
        })?;
        info!(%metrics_addr, "Prometheus exporter listening");
    }

    info!("Connecting to database...");
    let pool = connect_pool(
        &config.database_url,
        config.db_max_connections,
        config.store_timeout,
    )
    .await
    .map_err(|e| {
        error!("Failed to connect to database: {}", e);
        e
    })?;
    info!("Database connection established");

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            error!("Failed to run migrations: {}", e);
            e
        })?;
    info!("Database migrations applied");

    let store = Arc::new(PgStore::new(pool.clone()));
    let stack = ServiceStack::new(
        store,
        &config.signing_secret,
        config.token_max_age,
        config.store_timeout,
    );

    let addr: SocketAddr = config.grpc_bind_address.parse().map_err(|e| {
        error!("Invalid gRPC bind address: {}", e);
        e
    })?;

    info!("To-do Service listening on {}", addr);

    Server::builder()
        .timeout(config.request_timeout)
        .layer(stack.auth_layer())
        .add_service(stack.grpc_service())
        .serve_with_shutdown(addr, shutdown_signal())
        .await
        .map_err(|e| {
            error!("gRPC server error: {}", e);
            e
        })?;

    drain(config.drain_period).await;

    pool.close().await;
    info!("To-do Service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Wait out the drain period before releasing the pool.
async fn drain(period: Duration) {
    if period.is_zero() {
        info!("Skipping drain period (DRAIN_SECONDS=0)");
        return;
    }

    warn!("Draining for {} seconds...", period.as_secs());
    tokio::time::sleep(period).await;
    info!("Drain period complete");
}
