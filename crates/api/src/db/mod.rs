//! Storage for users, products, carts and orders.
//!
//! # Backends
//!
//! [`Database`] is either a `PostgreSQL` pool or an in-process
//! [`MemoryStore`]. Repositories dispatch on it, and both paths implement the
//! same semantics. Without `DATABASE_URL` (or when it is unreachable outside
//! production) the API runs on the memory store, optionally seeded from a
//! catalog file.
//!
//! # Schema: `shop`
//!
//! - `"user"` - Accounts, with addresses (JSONB) and wishlist (`INTEGER[]`)
//! - `product` - Catalog
//! - `cart` - One document per user, versioned for compare-and-swap writes
//! - `"order"` - Line and address snapshots plus status columns
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p shoplane-cli -- migrate
//! ```

pub mod carts;
pub mod memory;
pub mod orders;
pub mod products;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::{CartRepository, StoredCart};
pub use memory::{CatalogError, MemoryStore};
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use users::UserRepository;

use crate::config::ApiConfig;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Optimistic update lost every retry against concurrent writers.
    #[error("concurrent update")]
    ConcurrentUpdate,
}

/// Map unique-key violations to [`RepositoryError::Conflict`].
pub(crate) fn conflict_on_unique(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(err)
}

/// Convert a stored integer column, flagging out-of-range values.
pub(crate) fn stored<T, U>(value: T, column: &str) -> Result<U, RepositoryError>
where
    U: TryFrom<T>,
    T: Copy + std::fmt::Display,
{
    U::try_from(value).map_err(|_| {
        RepositoryError::DataCorruption(format!("{column} out of range: {value}"))
    })
}

/// Errors raised while choosing and preparing a backend at startup.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("failed to connect to PostgreSQL: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("failed to load catalog: {0}")]
    Catalog(#[from] CatalogError),
}

/// The storage backend.
#[derive(Debug, Clone)]
pub enum Database {
    Postgres(PgPool),
    Memory(Arc<MemoryStore>),
}

impl Database {
    /// Wrap a memory store.
    #[must_use]
    pub fn memory(store: MemoryStore) -> Self {
        Self::Memory(Arc::new(store))
    }

    /// Pick a backend from configuration.
    ///
    /// With a database URL the pool is created and pinged. A failure falls
    /// back to memory except in production. The memory store loads the
    /// catalog file when one is configured.
    ///
    /// # Errors
    ///
    /// Returns `ConnectError::Postgres` in production when the database is
    /// unreachable, and `ConnectError::Catalog` for an unreadable catalog.
    pub async fn connect(config: &ApiConfig) -> Result<Self, ConnectError> {
        if let Some(url) = &config.database_url {
            match create_pool(url).await {
                Ok(pool) => {
                    sqlx::query("SELECT 1").execute(&pool).await?;
                    tracing::info!("Database pool created");
                    return Ok(Self::Postgres(pool));
                }
                Err(e) if config.environment.is_production() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(error = %e, "Database unreachable, using in-memory store");
                }
            }
        } else {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
        }

        let store = MemoryStore::new();
        if let Some(path) = &config.catalog_path {
            let loaded = store.load_catalog(path).await?;
            tracing::info!(products = loaded, path = %path.display(), "Catalog loaded");
        }
        Ok(Self::memory(store))
    }

    /// Backend name reported by health checks.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }

    /// Whether the backend can serve queries.
    pub async fn ping(&self) -> bool {
        match self {
            Self::Postgres(pool) => sqlx::query("SELECT 1").execute(pool).await.is_ok(),
            Self::Memory(_) => true,
        }
    }

    #[must_use]
    pub const fn users(&self) -> UserRepository<'_> {
        UserRepository::new(self)
    }

    #[must_use]
    pub const fn products(&self) -> ProductRepository<'_> {
        ProductRepository::new(self)
    }

    #[must_use]
    pub const fn carts(&self) -> CartRepository<'_> {
        CartRepository::new(self)
    }

    #[must_use]
    pub const fn orders(&self) -> OrderRepository<'_> {
        OrderRepository::new(self)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
