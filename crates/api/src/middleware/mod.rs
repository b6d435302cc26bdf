//! HTTP middleware stack for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers (CSP, frame and sniffing protection)
//! 5. CORS (configured origins, with credentials)
//! 6. Body limit (10 KiB)
//! 7. Rate limiting (governor, general on `/api` and strict on `/api/auth`)
//!
//! Authentication is not a layer: handlers opt in through the extractors in
//! [`auth`], which read the signed cookies from [`session`].

pub mod auth;
pub mod cors;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{AuthUser, OptionalAuth, RequireAdmin, RequireAuth};
pub use cors::cors_layer;
pub use rate_limit::{RateLimiterLayer, api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{ACCESS_COOKIE, CookieSigner, REFRESH_COOKIE, SessionCookies};
