//! CLI subcommands.

pub mod migrate;
pub mod user;

use secrecy::SecretString;
use shoplane_api::db::{Database, create_pool};
use thiserror::Error;

/// Errors shared by every command that talks to `PostgreSQL`.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read `DATABASE_URL` (after loading `.env`) and open a pool.
pub async fn connect() -> Result<sqlx::PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(create_pool(&database_url).await?)
}

/// Open the `PostgreSQL` backend behind the API repositories.
pub async fn database() -> Result<Database, CommandError> {
    Ok(Database::Postgres(connect().await?))
}
