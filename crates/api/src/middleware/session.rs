//! Session cookies.
//!
//! The access and refresh tokens travel in two signed, HTTP-only cookies.
//! Signing uses a key derived from `COOKIE_SECRET`, so a cookie edited by the
//! client reads as absent.

use std::convert::Infallible;
use std::time::Duration;

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponseParts, ResponseParts};
use cookie::{Cookie, CookieJar, Key, SameSite};
use secrecy::{ExposeSecret, SecretString};

use crate::config::ConfigError;
use crate::services::tokens::IssuedTokens;

/// Access token cookie name.
pub const ACCESS_COOKIE: &str = "accessToken";

/// Refresh token cookie name.
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Minimum master key length accepted by the cookie key derivation.
const MIN_COOKIE_SECRET_BYTES: usize = 32;

/// Signs and reads the session cookies.
pub struct CookieSigner {
    key: Key,
    secure: bool,
}

impl std::fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieSigner")
            .field("secure", &self.secure)
            .finish_non_exhaustive()
    }
}

impl CookieSigner {
    /// Derive the signing key. `secure` marks cookies HTTPS-only.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InsecureSecret` if the secret is shorter than 32 bytes.
    pub fn new(secret: &SecretString, secure: bool) -> Result<Self, ConfigError> {
        let bytes = secret.expose_secret().as_bytes();
        if bytes.len() < MIN_COOKIE_SECRET_BYTES {
            return Err(ConfigError::InsecureSecret(
                "COOKIE_SECRET".to_owned(),
                format!("must be at least {MIN_COOKIE_SECRET_BYTES} bytes"),
            ));
        }
        Ok(Self {
            key: Key::derive_from(bytes),
            secure,
        })
    }

    /// Read and verify a signed cookie from request headers.
    #[must_use]
    pub fn read(&self, headers: &HeaderMap, name: &str) -> Option<String> {
        let mut jar = CookieJar::new();
        for header in headers.get_all(COOKIE) {
            let Ok(header) = header.to_str() else {
                continue;
            };
            for cookie in Cookie::split_parse(header).flatten() {
                jar.add_original(cookie.into_owned());
            }
        }
        jar.signed(&self.key)
            .get(name)
            .map(|c| c.value().to_owned())
    }

    /// Cookies carrying a freshly issued token pair.
    #[must_use]
    pub fn issue(
        &self,
        tokens: &IssuedTokens,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> SessionCookies {
        let mut jar = CookieJar::new();
        let mut signed = jar.signed_mut(&self.key);
        signed.add(self.build(ACCESS_COOKIE, tokens.access.clone(), access_ttl));
        signed.add(self.build(REFRESH_COOKIE, tokens.refresh.clone(), refresh_ttl));
        SessionCookies(jar.delta().cloned().collect())
    }

    /// Cookies that remove both tokens from the browser.
    #[must_use]
    pub fn clear(&self) -> SessionCookies {
        let removals = [ACCESS_COOKIE, REFRESH_COOKIE]
            .into_iter()
            .map(|name| {
                let mut cookie = self.build(name, String::new(), Duration::ZERO);
                cookie.make_removal();
                cookie
            })
            .collect();
        SessionCookies(removals)
    }

    fn build(&self, name: &'static str, value: String, ttl: Duration) -> Cookie<'static> {
        let seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .max_age(cookie::time::Duration::seconds(seconds))
            .build()
    }
}

/// `Set-Cookie` headers to attach to a response.
#[derive(Debug, Clone, Default)]
pub struct SessionCookies(Vec<Cookie<'static>>);

impl IntoResponseParts for SessionCookies {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        for cookie in self.0 {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    res.headers_mut().append(SET_COOKIE, value);
                }
                Err(e) => tracing::error!(error = %e, cookie = cookie.name(), "Unencodable cookie"),
            }
        }
        Ok(res)
    }
}
