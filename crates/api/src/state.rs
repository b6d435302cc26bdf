//! Application state shared across handlers.

use std::sync::Arc;

use shoplane_core::PricingPolicy;

use crate::config::{ApiConfig, ConfigError};
use crate::db::Database;
use crate::middleware::CookieSigner;
use crate::services::auth::AuthService;
use crate::services::tokens::TokenService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the store, token keys and configuration.
#[derive(Clone, Debug)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

#[derive(Debug)]
struct AppStateInner {
    config: ApiConfig,
    db: Database,
    tokens: TokenService,
    cookies: CookieSigner,
    pricing: PricingPolicy,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the cookie secret cannot derive a signing key.
    pub fn new(config: ApiConfig, db: Database) -> Result<Self, ConfigError> {
        let tokens = TokenService::new(&config.auth);
        let cookies = CookieSigner::new(
            &config.auth.cookie_secret,
            config.environment.is_production(),
        )?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                tokens,
                cookies,
                pricing: PricingPolicy::default(),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the store (Postgres or in-memory).
    #[must_use]
    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    #[must_use]
    pub fn cookies(&self) -> &CookieSigner {
        &self.inner.cookies
    }

    /// Pricing used for cart totals and orders.
    #[must_use]
    pub fn pricing(&self) -> &PricingPolicy {
        &self.inner.pricing
    }

    /// Authentication service over this state's store and tokens.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self.db(), self.tokens())
    }
}
