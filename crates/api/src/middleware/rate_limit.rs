//! Rate limiting middleware using governor and `tower_governor`.
//!
//! Two limiters share one window:
//! - `auth_rate_limiter`: strict limit for `/api/auth` (default 5 per 15 minutes)
//! - `api_rate_limiter`: general limit for the rest of `/api` (default 100 per 15 minutes)
//!
//! Each client IP gets a bucket of `max` requests that refills one request
//! every `window / max`.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

use crate::config::RateLimitConfig;

// =============================================================================
// Client IP Key Extractor
// =============================================================================

/// Key extractor that checks Cloudflare's `CF-Connecting-IP` header first,
/// then standard proxy headers, then the socket peer address.
#[derive(Clone, Copy, Debug)]
pub struct ClientIpKeyExtractor;

fn header_ip<T>(req: &Request<T>, name: &str) -> Option<IpAddr> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        ["cf-connecting-ip", "x-forwarded-for", "x-real-ip"]
            .into_iter()
            .find_map(|name| header_ip(req, name))
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

// =============================================================================
// Rate Limiter Configuration
// =============================================================================

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

fn limiter(config: &RateLimitConfig, max_requests: u32, name: &str) -> Option<RateLimiterLayer> {
    if !config.enabled {
        return None;
    }
    if max_requests == 0 {
        tracing::warn!(limiter = name, "Rate limit of 0 requests ignored");
        return None;
    }

    let period = config.window / max_requests;
    let Some(governor) = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .period(period)
        .burst_size(max_requests)
        .finish()
    else {
        tracing::warn!(limiter = name, ?period, "Invalid rate limiter settings, limiter disabled");
        return None;
    };

    Some(GovernorLayer::new(Arc::new(governor)))
}

/// Limiter for authentication endpoints, or `None` when disabled.
#[must_use]
pub fn auth_rate_limiter(config: &RateLimitConfig) -> Option<RateLimiterLayer> {
    limiter(config, config.auth_max_requests, "auth")
}

/// Limiter for the general API, or `None` when disabled.
#[must_use]
pub fn api_rate_limiter(config: &RateLimitConfig) -> Option<RateLimiterLayer> {
    limiter(config, config.max_requests, "api")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::Ipv4Addr;
    use std::time::Duration;

    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/api/products");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_cloudflare_header_wins() {
        let req = request(&[
            ("x-forwarded-for", "10.0.0.1, 10.0.0.2"),
            ("cf-connecting-ip", "203.0.113.7"),
        ]);
        assert_eq!(
            ClientIpKeyExtractor.extract(&req).unwrap(),
            IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7))
        );
    }

    #[test]
    fn test_forwarded_for_uses_first_hop() {
        let req = request(&[("x-forwarded-for", "198.51.100.4, 10.0.0.2")]);
        assert_eq!(
            ClientIpKeyExtractor.extract(&req).unwrap(),
            IpAddr::V4(Ipv4Addr::new(198, 51, 100, 4))
        );
    }

    #[test]
    fn test_falls_back_to_peer_address() {
        let mut req = request(&[]);
        req.extensions_mut().insert(ConnectInfo(SocketAddr::from((
            Ipv4Addr::new(192, 0, 2, 9),
            4000,
        ))));
        assert_eq!(
            ClientIpKeyExtractor.extract(&req).unwrap(),
            IpAddr::V4(Ipv4Addr::new(192, 0, 2, 9))
        );
        assert!(ClientIpKeyExtractor.extract(&request(&[])).is_err());
    }

    #[test]
    fn test_disabled_limiters() {
        let config = RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        };
        assert!(api_rate_limiter(&config).is_none());
        assert!(auth_rate_limiter(&config).is_none());

        let zero = RateLimitConfig {
            max_requests: 0,
            window: Duration::from_secs(60),
            ..RateLimitConfig::default()
        };
        assert!(api_rate_limiter(&zero).is_none());
        assert!(auth_rate_limiter(&zero).is_some());
    }
}
