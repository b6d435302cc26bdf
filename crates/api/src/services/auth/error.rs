//! Authentication error types.

use axum::http::StatusCode;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::tokens::TokenError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] shoplane_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Current password did not match on a password change.
    #[error("current password is incorrect")]
    IncorrectPassword,

    /// The account was deactivated.
    #[error("account disabled")]
    AccountDisabled,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// No access token on the request.
    #[error("missing access token")]
    MissingToken,

    /// Access token past its expiry.
    #[error("access token expired")]
    TokenExpired,

    /// Access token failed verification.
    #[error("invalid access token")]
    InvalidToken,

    /// No refresh token cookie.
    #[error("missing refresh token")]
    MissingRefreshToken,

    /// Refresh token was rotated or logged out.
    #[error("refresh token revoked")]
    RefreshRevoked,

    /// Refresh token failed verification, or its user changed.
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// Authenticated, but not an administrator.
    #[error("admin access required")]
    Forbidden,

    /// Token signing error.
    #[error("token error: {0}")]
    Token(#[source] TokenError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Map an access token failure.
    #[must_use]
    pub const fn from_access(err: &TokenError) -> Self {
        match err {
            TokenError::Expired => Self::TokenExpired,
            _ => Self::InvalidToken,
        }
    }

    /// Map a refresh token failure.
    #[must_use]
    pub const fn from_refresh(err: &TokenError) -> Self {
        match err {
            TokenError::Revoked => Self::RefreshRevoked,
            _ => Self::InvalidRefreshToken,
        }
    }

    /// Status code and client-facing `(error, message)` pair.
    ///
    /// Server-side failures return `None`; the caller reports them as 500s.
    #[must_use]
    pub const fn client_view(&self) -> Option<(StatusCode, &'static str, &'static str)> {
        let view = match self {
            Self::InvalidEmail(_) => (
                StatusCode::BAD_REQUEST,
                "Validation failed",
                "Invalid email format",
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Authentication failed",
                "Invalid email or password",
            ),
            Self::IncorrectPassword => (
                StatusCode::UNAUTHORIZED,
                "Authentication failed",
                "Current password is incorrect",
            ),
            Self::AccountDisabled => (
                StatusCode::FORBIDDEN,
                "Account disabled",
                "This account has been deactivated",
            ),
            Self::UserNotFound => (StatusCode::NOT_FOUND, "Not Found", "User not found"),
            Self::UserAlreadyExists => (
                StatusCode::CONFLICT,
                "Registration failed",
                "An account with this email already exists",
            ),
            Self::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "Authentication required",
                "Please log in to access this resource",
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "Token expired",
                "Your session has expired, please log in again",
            ),
            Self::InvalidToken => (
                StatusCode::FORBIDDEN,
                "Invalid token",
                "Authentication failed",
            ),
            Self::MissingRefreshToken => (
                StatusCode::UNAUTHORIZED,
                "No refresh token",
                "Please log in again",
            ),
            Self::RefreshRevoked => (
                StatusCode::UNAUTHORIZED,
                "Token revoked",
                "Please log in again",
            ),
            Self::InvalidRefreshToken => (
                StatusCode::UNAUTHORIZED,
                "Invalid refresh token",
                "Please log in again",
            ),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                "Forbidden",
                "Administrator access required",
            ),
            Self::Token(_) | Self::Repository(_) | Self::PasswordHash => return None,
        };
        Some(view)
    }
}
