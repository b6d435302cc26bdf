//! JWT access and refresh tokens.
//!
//! Both token kinds are HS256 JWTs with their own secret and lifetime. The
//! `typ` claim keeps one kind from being accepted as the other. Refresh tokens
//! are single use: a rotated or logged-out `jti` goes into a revocation set
//! that expires entries after the refresh lifetime.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use moka::future::Cache;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shoplane_core::{UserId, UserRole};

use crate::config::AuthConfig;
use crate::models::User;

/// Upper bound on remembered revoked refresh tokens.
const MAX_REVOKED: u64 = 100_000;

/// Token verification and signing failures.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token")]
    Invalid,

    #[error("token revoked")]
    Revoked,

    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Which secret and lifetime a token uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims carried by both token kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: String,
    pub email: String,
    pub role: UserRole,
    pub typ: TokenKind,
    /// Unique token ID, used for revocation.
    pub jti: String,
    /// Issued at (Unix timestamp).
    pub iat: u64,
    /// Issued at, in milliseconds since the epoch.
    pub iat_ms: i64,
    /// Expiration time (Unix timestamp).
    pub exp: u64,
}

impl Claims {
    /// Fresh claims for `user`, valid for `ttl` from now.
    #[must_use]
    pub fn new(user: &User, typ: TokenKind, ttl: Duration) -> Self {
        let issued = Utc::now();
        let now = u64::try_from(issued.timestamp()).unwrap_or_default();
        Self {
            sub: user.id.to_string(),
            email: user.email.as_str().to_owned(),
            role: user.role,
            typ,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            iat_ms: issued.timestamp_millis(),
            exp: now.saturating_add(ttl.as_secs()),
        }
    }

    /// The user the token was issued to.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` if `sub` is not a user ID.
    pub fn user_id(&self) -> Result<UserId, TokenError> {
        self.sub.parse().map_err(|_| TokenError::Invalid)
    }

    /// Issue time in milliseconds since the epoch.
    #[must_use]
    pub const fn issued_at_millis(&self) -> i64 {
        self.iat_ms
    }
}

/// A freshly signed token pair.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access: String,
    pub refresh: String,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn from_secret(secret: &secrecy::SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        }
    }
}

/// Signs, verifies and revokes tokens.
pub struct TokenService {
    access: Keys,
    refresh: Keys,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
    revoked: Cache<String, ()>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("revoked", &self.revoked.entry_count())
            .finish_non_exhaustive()
    }
}

impl TokenService {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            access: Keys::from_secret(&config.jwt_secret),
            refresh: Keys::from_secret(&config.jwt_refresh_secret),
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
            validation,
            revoked: Cache::builder()
                .max_capacity(MAX_REVOKED)
                .time_to_live(config.refresh_token_ttl)
                .build(),
        }
    }

    #[must_use]
    pub const fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    #[must_use]
    pub const fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign a new access and refresh token for `user`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if encoding fails.
    pub fn issue(&self, user: &User) -> Result<IssuedTokens, TokenError> {
        let access = Claims::new(user, TokenKind::Access, self.access_ttl);
        let refresh = Claims::new(user, TokenKind::Refresh, self.refresh_ttl);
        Ok(IssuedTokens {
            access: self.sign(&access)?,
            refresh: self.sign(&refresh)?,
        })
    }

    /// Sign arbitrary claims with the key for their `typ`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if encoding fails.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let keys = self.keys(claims.typ);
        encode(&Header::new(Algorithm::HS256), claims, &keys.encoding).map_err(TokenError::Signing)
    }

    /// Verify an access token.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` past `exp`, otherwise `TokenError::Invalid`
    /// for any bad signature, malformed token or refresh token.
    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(token, TokenKind::Access)
    }

    /// Verify a refresh token that has not been revoked.
    ///
    /// # Errors
    ///
    /// As [`TokenService::verify_access`], plus `TokenError::Revoked`.
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.verify(token, TokenKind::Refresh)?;
        if self.is_revoked(&claims.jti) {
            return Err(TokenError::Revoked);
        }
        Ok(claims)
    }

    /// Reject this refresh token from now on.
    ///
    /// Returns `true` only to the caller that revoked it first, so concurrent
    /// refreshes with one token cannot both rotate.
    pub async fn revoke(&self, claims: &Claims) -> bool {
        self.revoked
            .entry(claims.jti.clone())
            .or_insert(())
            .await
            .is_fresh()
    }

    #[must_use]
    pub fn is_revoked(&self, jti: &str) -> bool {
        self.revoked.contains_key(jti)
    }

    fn keys(&self, kind: TokenKind) -> &Keys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.keys(kind).decoding, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            },
        )?;
        if data.claims.typ != kind {
            return Err(TokenError::Invalid);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use shoplane_core::Email;

    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%"),
            jwt_refresh_secret: SecretString::from("Zq8!Lm3@Vt6#Hy1$Rk4%Nw7^Gp0&Dc2*"),
            cookie_secret: SecretString::from("Fj5*Ts2&Qb9^Wm4%Xe7$Kd1#Ur8@Hn3!"),
            access_token_ttl: Duration::from_secs(900),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 3600),
        }
    }

    fn user() -> User {
        let now = Utc::now();
        User {
            id: UserId::new(42),
            name: "Asha Rao".to_owned(),
            email: Email::parse("asha@example.com").unwrap(),
            role: UserRole::User,
            is_active: true,
            last_login: None,
            password_changed_at: None,
            addresses: Vec::new(),
            wishlist: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let tokens = TokenService::new(&config());
        let issued = tokens.issue(&user()).unwrap();

        let claims = tokens.verify_access(&issued.access).unwrap();
        assert_eq!(claims.user_id().unwrap(), UserId::new(42));
        assert_eq!(claims.email, "asha@example.com");
        assert_eq!(claims.exp - claims.iat, 900);

        let refresh = tokens.verify_refresh(&issued.refresh).unwrap();
        assert_eq!(refresh.typ, TokenKind::Refresh);
        assert_ne!(refresh.jti, claims.jti);
    }

    #[test]
    fn test_kinds_are_not_interchangeable() {
        let tokens = TokenService::new(&config());
        let issued = tokens.issue(&user()).unwrap();
        assert!(matches!(
            tokens.verify_access(&issued.refresh),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            tokens.verify_refresh(&issued.access),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_expired_token() {
        let tokens = TokenService::new(&config());
        let mut claims = Claims::new(&user(), TokenKind::Access, Duration::from_secs(60));
        claims.iat -= 3600;
        claims.exp = claims.iat + 60;
        let token = tokens.sign(&claims).unwrap();
        assert!(matches!(
            tokens.verify_access(&token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_tampered_token_is_invalid() {
        let tokens = TokenService::new(&config());
        let mut token = tokens.issue(&user()).unwrap().access;
        token.push('x');
        assert!(matches!(
            tokens.verify_access(&token),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            tokens.verify_access("not-a-jwt"),
            Err(TokenError::Invalid)
        ));
    }

    #[tokio::test]
    async fn test_revoked_refresh_rejected() {
        let tokens = TokenService::new(&config());
        let issued = tokens.issue(&user()).unwrap();
        let claims = tokens.verify_refresh(&issued.refresh).unwrap();

        assert!(tokens.revoke(&claims).await);
        assert!(!tokens.revoke(&claims).await);

        assert!(tokens.is_revoked(&claims.jti));
        assert!(matches!(
            tokens.verify_refresh(&issued.refresh),
            Err(TokenError::Revoked)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_revocations_have_one_winner() {
        let tokens = std::sync::Arc::new(TokenService::new(&config()));
        let issued = tokens.issue(&user()).unwrap();
        let claims = tokens.verify_refresh(&issued.refresh).unwrap();

        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let tokens = std::sync::Arc::clone(&tokens);
                let claims = claims.clone();
                tokio::spawn(async move { tokens.revoke(&claims).await })
            })
            .collect();
        let mut winners = 0;
        for attempt in attempts {
            if attempt.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
