//! Account provisioning CLI.
//!
//! Creates a user with a bcrypt-hashed password in the service database.
//! Without `--password` the password is read from the first line of stdin.

use clap::Parser;
use common::secret::SecretString;
use thiserror::Error;
use todo_service::config::{EnvMode, DEFAULT_BCRYPT_COST, DEFAULT_STORE_TIMEOUT_SECONDS};
use todo_service::crypto::{hash_password, PasswordError};
use todo_service::errors::StoreError;
use todo_service::observability::logging;
use todo_service::repositories::{connect_pool, AccountCreator, PgStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

/// Matches `users.username VARCHAR(40)`.
const MAX_USERNAME_LENGTH: usize = 40;

#[derive(Parser)]
#[command(name = "create-user")]
#[command(about = "Create a to-do service account", long_about = None)]
struct Cli {
    #[arg(short, long)]
    username: String,

    /// Read from stdin when omitted.
    #[arg(short, long)]
    password: Option<String>,

    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    #[arg(long, env = "BCRYPT_COST", default_value_t = DEFAULT_BCRYPT_COST)]
    bcrypt_cost: u32,

    #[arg(long, env = "ENV_MODE", default_value = "local")]
    env_mode: EnvMode,
}

#[derive(Debug, Error)]
enum CreateUserError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Password must not be empty")]
    EmptyPassword,

    #[error("Failed to read password from stdin: {0}")]
    Stdin(#[from] std::io::Error),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("Failed to connect to database: {0}")]
    Connect(#[from] sqlx::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn validate_username(username: &str) -> Result<(), CreateUserError> {
    if username.is_empty() {
        return Err(CreateUserError::InvalidUsername(
            "username is required".to_string(),
        ));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(CreateUserError::InvalidUsername(format!(
            "username must be at most {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    Ok(())
}

async fn read_password(cli_password: Option<String>) -> Result<SecretString, CreateUserError> {
    let password = match cli_password {
        Some(password) => password,
        None => {
            let mut line = String::new();
            BufReader::new(tokio::io::stdin())
                .read_line(&mut line)
                .await?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    if password.is_empty() {
        return Err(CreateUserError::EmptyPassword);
    }
    Ok(SecretString::from(password))
}

async fn run(cli: Cli) -> Result<(), CreateUserError> {
    validate_username(&cli.username)?;
    let password = read_password(cli.password).await?;

    let hash = hash_password(&password, cli.bcrypt_cost).await?;

    let pool = connect_pool(
        &cli.database_url,
        1,
        std::time::Duration::from_secs(DEFAULT_STORE_TIMEOUT_SECONDS),
    )
    .await?;
    let store = PgStore::new(pool.clone());

    let result = store.create_account(&cli.username, &hash).await;
    pool.close().await;

    let user = result?;
    info!(user_id = user.user_id, "Account created");
    println!("Created user '{}' with id {}", user.username, user.user_id);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    logging::init_logging(cli.env_mode)?;

    if let Err(e) = run(cli).await {
        error!("{}", e);
        return Err(e.into());
    }
    Ok(())
}
