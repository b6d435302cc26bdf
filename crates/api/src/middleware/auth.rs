//! Authentication extractors.
//!
//! The access token is read from the signed `accessToken` cookie, or from an
//! `Authorization: Bearer` header when no cookie is present.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use shoplane_core::{UserId, UserRole};

use crate::error::{AppError, set_sentry_user};
use crate::middleware::session::ACCESS_COOKIE;
use crate::services::auth::AuthError;
use crate::state::AppState;

/// Identity carried by a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
    pub role: UserRole,
}

/// Extractor that requires a valid access token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> String {
///     format!("Hello, {}!", user.email)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthUser);

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
}

fn authenticate(parts: &Parts, state: &AppState) -> Result<AuthUser, AuthError> {
    let token = state
        .cookies()
        .read(&parts.headers, ACCESS_COOKIE)
        .or_else(|| bearer_token(parts))
        .ok_or(AuthError::MissingToken)?;

    let claims = state
        .tokens()
        .verify_access(&token)
        .map_err(|e| AuthError::from_access(&e))?;
    let id = claims.user_id().map_err(|_| AuthError::InvalidToken)?;

    Ok(AuthUser {
        id,
        email: claims.email,
        role: claims.role,
    })
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state)?;
        set_sentry_user(&user.id, Some(&user.email));
        tracing::Span::current().record("user_id", user.id.as_i32());
        Ok(Self(user))
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, a missing or invalid token is not an error.
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<AuthUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(authenticate(parts, state).ok()))
    }
}

/// Extractor that requires an active administrator.
///
/// The role is re-read from the store, so a demotion or deactivation takes
/// effect before the access token expires.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        let current = state.db().users().get_by_id(user.id).await?;
        let Some(current) = current.filter(|u| u.is_active && u.role.is_admin()) else {
            tracing::warn!(user_id = %user.id, "Admin route refused");
            return Err(AuthError::Forbidden.into());
        };

        Ok(Self(AuthUser {
            id: current.id,
            email: current.email.as_str().to_owned(),
            role: current.role,
        }))
    }
}
