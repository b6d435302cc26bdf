//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                         - Liveness
//! GET    /health/ready                   - Readiness (store reachable)
//! GET    /api/health                     - Status report
//!
//! # Auth (strict rate limit)
//! POST   /api/auth/register              - Create account, sign in
//! POST   /api/auth/login                 - Sign in
//! POST   /api/auth/refresh               - Rotate tokens
//! POST   /api/auth/logout                - Revoke refresh token, clear cookies
//! GET    /api/auth/me                    - Current profile
//! POST   /api/auth/change-password       - Change password, end session
//!
//! # Account (requires auth)
//! GET    /api/account/addresses          - Saved addresses
//! POST   /api/account/addresses          - Add address
//! PUT    /api/account/addresses/{id}     - Replace address
//! DELETE /api/account/addresses/{id}     - Remove address
//! GET    /api/account/wishlist           - Wishlisted products
//! POST   /api/account/wishlist           - Add to wishlist
//! DELETE /api/account/wishlist/{id}      - Remove from wishlist
//!
//! # Products
//! GET    /api/products                   - Filtered, sorted, paginated listing
//! GET    /api/products/meta/categories   - Categories in stock
//! GET    /api/products/{id}              - Product with related products
//! POST   /api/products                   - Create (admin)
//! PUT    /api/products/{id}              - Replace (admin)
//! DELETE /api/products/{id}              - Delete (admin)
//!
//! # Cart (requires auth)
//! GET    /api/cart                       - Cart with totals
//! POST   /api/cart/add                   - Add product
//! PUT    /api/cart/update/{id}           - Set quantity
//! DELETE /api/cart/remove/{id}           - Remove line
//! DELETE /api/cart/clear                 - Empty cart
//! POST   /api/cart/save-for-later/{id}   - Move line to saved list
//! POST   /api/cart/move-to-cart/{id}     - Move saved line back
//! POST   /api/cart/merge                 - Merge a guest cart
//!
//! # Orders (requires auth)
//! POST   /api/orders                     - Place order
//! GET    /api/orders                     - Order history
//! GET    /api/orders/{id}                - Order detail
//! POST   /api/orders/{id}/cancel         - Cancel pending order
//! PATCH  /api/orders/{id}/status         - Advance status (admin)
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod health;
pub mod orders;
pub mod products;

use std::str::FromStr;

use axum::{
    Router,
    body::Body,
    extract::DefaultBodyLimit,
    http::{Request, Uri},
    middleware::from_fn,
    routing::{delete, get, patch, post, put},
};
use tower_http::trace::TraceLayer;

use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::middleware::{
    RateLimiterLayer, api_rate_limiter, auth_rate_limiter, cors_layer, request_id_middleware,
    security_headers_middleware,
};
use crate::state::AppState;

/// Largest accepted request body.
pub const BODY_LIMIT_BYTES: usize = 10 * 1024;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/change-password", post(auth::change_password))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/addresses",
            get(account::addresses).post(account::create_address),
        )
        .route(
            "/addresses/{id}",
            put(account::update_address).delete(account::delete_address),
        )
        .route(
            "/wishlist",
            get(account::wishlist).post(account::add_to_wishlist),
        )
        .route("/wishlist/{id}", delete(account::remove_from_wishlist))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/meta/categories", get(products::categories))
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::destroy),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update/{id}", put(cart::update))
        .route("/remove/{id}", delete(cart::remove))
        .route("/clear", delete(cart::clear))
        .route("/save-for-later/{id}", post(cart::save_for_later))
        .route("/move-to-cart/{id}", post(cart::move_to_cart))
        .route("/merge", post(cart::merge))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/status", patch(orders::update_status))
}

fn rate_limited(router: Router<AppState>, limiter: Option<RateLimiterLayer>) -> Router<AppState> {
    match limiter {
        Some(layer) => router.layer(layer),
        None => router,
    }
}

/// Create all `/api` routes with their rate limiters.
pub fn api_routes(rate_limit: &RateLimitConfig) -> Router<AppState> {
    let auth = rate_limited(auth_routes(), auth_rate_limiter(rate_limit));

    let api = Router::new()
        .route("/health", get(health::status))
        .nest("/auth", auth)
        .nest("/account", account_routes())
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes());

    rate_limited(api, api_rate_limiter(rate_limit))
}

/// The complete application: routes, fallback and middleware stack.
pub fn app(state: AppState) -> Router {
    let config = state.config();
    let cors = cors_layer(&config.cors);
    let api = api_routes(&config.rate_limit);

    Router::new()
        .route("/health", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = tracing::field::Empty,
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Fallback for unknown routes.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("Route {} does not exist", uri.path()))
}

/// Parse a path ID. Anything that is not a valid ID cannot name an
/// existing resource, so it is a 404.
pub(crate) fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, AppError> {
    raw.parse().map_err(|_| AppError::not_found(what))
}
