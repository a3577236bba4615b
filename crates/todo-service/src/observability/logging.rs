//! Log subscriber construction.
//!
//! Called once by each binary with the deployment mode from config. Library
//! code only emits `tracing` events and never installs a subscriber itself.

use crate::config::EnvMode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive for a mode. `RUST_LOG` takes precedence.
///
/// `todo` is a target prefix: it covers module paths under `todo_service`
/// and the explicit `todo.*` event targets.
pub fn default_filter(mode: EnvMode) -> &'static str {
    match mode {
        EnvMode::Local | EnvMode::Dev => "todo=debug,create_user=debug,tower=info",
        EnvMode::Prod => "todo=warn,create_user=warn",
    }
}

/// Install the global tracing subscriber for `mode`.
///
/// # Errors
///
/// Returns error if a global subscriber is already installed.
pub fn init_logging(mode: EnvMode) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(mode).into());

    let registry = tracing_subscriber::registry().with(filter);

    match mode {
        EnvMode::Dev => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        EnvMode::Local | EnvMode::Prod => registry
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
    }
}
