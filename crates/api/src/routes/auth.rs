//! Authentication route handlers.
//!
//! Tokens never appear in response bodies. They are set as signed,
//! HTTP-only cookies and rotated on refresh.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{REFRESH_COOKIE, RequireAuth, SessionCookies};
use crate::models::{PublicUser, User, UserProfile};
use crate::services::tokens::IssuedTokens;
use crate::state::AppState;
use crate::validation::{
    FieldError, Validate, ValidJson, Validator, check_email, check_name, check_password,
};

// =============================================================================
// Request / Response Types
// =============================================================================

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> std::result::Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        check_name(&mut v, "name", &self.name);
        check_email(&mut v, "email", &self.email);
        check_password(&mut v, "password", &self.password);
        v.finish()
    }
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> std::result::Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        check_email(&mut v, "email", &self.email);
        v.check(!self.password.is_empty(), "password", "Password is required");
        v.finish()
    }
}

/// Password change request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

impl Validate for ChangePasswordRequest {
    fn validate(&self) -> std::result::Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        v.check(
            !self.current_password.is_empty(),
            "currentPassword",
            "Current password is required",
        );
        check_password(&mut v, "newPassword", &self.new_password);
        v.finish()
    }
}

/// Body of register and login responses.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: &'static str,
    pub user: PublicUser,
}

/// Body carrying only a message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Body of `GET /api/auth/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserProfile,
}

fn session_cookies(state: &AppState, tokens: &IssuedTokens) -> SessionCookies {
    let ttl = state.tokens();
    state
        .cookies()
        .issue(tokens, ttl.access_ttl(), ttl.refresh_ttl())
}

fn signed_in(
    state: &AppState,
    user: &User,
    tokens: &IssuedTokens,
    message: &'static str,
) -> (SessionCookies, Json<AuthResponse>) {
    set_sentry_user(&user.id, Some(user.email.as_str()));
    (
        session_cookies(state, tokens),
        Json(AuthResponse {
            message,
            user: user.public(),
        }),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/auth/register
#[instrument(skip(state, req), fields(email = %req.0.email))]
pub async fn register(
    State(state): State<AppState>,
    req: ValidJson<RegisterRequest>,
) -> Result<(StatusCode, SessionCookies, Json<AuthResponse>)> {
    let ValidJson(req) = req;
    let (user, tokens) = state
        .auth()
        .register(&req.name, &req.email, &req.password)
        .await?;

    let (cookies, body) = signed_in(&state, &user, &tokens, "Registration successful");
    Ok((StatusCode::CREATED, cookies, body))
}

/// POST /api/auth/login
#[instrument(skip(state, req))]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<(SessionCookies, Json<AuthResponse>)> {
    let (user, tokens) = state.auth().login(&req.email, &req.password).await?;
    tracing::info!(user_id = %user.id, "User logged in");
    Ok(signed_in(&state, &user, &tokens, "Login successful"))
}

/// POST /api/auth/refresh
///
/// Any failure also clears both cookies, so the client falls back to login.
#[instrument(skip(state, headers))]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> std::result::Result<(SessionCookies, Json<MessageResponse>), (SessionCookies, AppError)> {
    let token = state.cookies().read(&headers, REFRESH_COOKIE);
    match state.auth().refresh(token.as_deref()).await {
        Ok((_, tokens)) => Ok((
            session_cookies(&state, &tokens),
            Json(MessageResponse {
                message: "Token refreshed successfully",
            }),
        )),
        Err(e) => {
            tracing::debug!(error = %e, "Refresh refused");
            Err((state.cookies().clear(), e.into()))
        }
    }
}

/// POST /api/auth/logout
///
/// Always succeeds, even without a session.
#[instrument(skip(state, headers))]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (SessionCookies, Json<MessageResponse>) {
    let token = state.cookies().read(&headers, REFRESH_COOKIE);
    state.auth().logout(token.as_deref()).await;
    clear_sentry_user();

    (
        state.cookies().clear(),
        Json(MessageResponse {
            message: "Logged out successfully",
        }),
    )
}

/// GET /api/auth/me
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<MeResponse>> {
    let user = state.auth().get_user(user.id).await?;
    Ok(Json(MeResponse {
        user: user.profile(),
    }))
}

/// POST /api/auth/change-password
///
/// Ends the session: the presented refresh token is revoked and both
/// cookies are cleared.
#[instrument(skip(state, user, headers, req), fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
    ValidJson(req): ValidJson<ChangePasswordRequest>,
) -> Result<(SessionCookies, Json<MessageResponse>)> {
    let token = state.cookies().read(&headers, REFRESH_COOKIE);
    state
        .auth()
        .change_password(
            user.id,
            &req.current_password,
            &req.new_password,
            token.as_deref(),
        )
        .await?;

    Ok((
        state.cookies().clear(),
        Json(MessageResponse {
            message: "Password changed successfully. Please log in again.",
        }),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fields(errors: Vec<FieldError>) -> Vec<String> {
        errors.into_iter().map(|e| e.field).collect()
    }

    #[test]
    fn test_register_validation_reports_every_field() {
        let req = RegisterRequest {
            name: "A".to_owned(),
            email: "not-an-email".to_owned(),
            password: "short".to_owned(),
        };
        let errors = fields(req.validate().unwrap_err());
        assert!(errors.contains(&"name".to_owned()));
        assert!(errors.contains(&"email".to_owned()));
        assert!(errors.contains(&"password".to_owned()));
    }

    #[test]
    fn test_valid_registration() {
        let req = RegisterRequest {
            name: "Asha Rao".to_owned(),
            email: "asha@example.com".to_owned(),
            password: "Sup3r$ecure".to_owned(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_change_password_rules() {
        let req = ChangePasswordRequest {
            current_password: String::new(),
            new_password: "alllowercase1!".to_owned(),
        };
        assert_eq!(
            fields(req.validate().unwrap_err()),
            vec!["currentPassword".to_owned(), "newPassword".to_owned()]
        );
    }
}
