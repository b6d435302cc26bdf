//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`.
//!
//! Every error body is JSON: `{error, message}`, with `details` for
//! validation failures and, in development only, `detail` for 500s.

use std::error::Error as _;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use shoplane_core::{CartError, OrderError};

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::validation::FieldError;

static EXPOSE_DETAILS: AtomicBool = AtomicBool::new(false);

/// Include the error chain of 500 responses in the body.
///
/// Enabled at startup in development only.
pub fn expose_internal_details(enabled: bool) {
    EXPOSE_DETAILS.store(enabled, Ordering::Relaxed);
}

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart rule violated.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Order rule violated.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// One or more request fields failed validation.
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request body over the size limit.
    #[error("Payload too large")]
    PayloadTooLarge,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl ErrorBody {
    fn new(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            error,
            message: Some(message.into()),
            details: None,
            detail: None,
        }
    }
}

impl AppError {
    /// Resource not found, phrased as `"<what> not found"`.
    #[must_use]
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            Self::Validation(details) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "Validation failed",
                    message: None,
                    details: Some(details),
                    detail: None,
                },
            ),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, ErrorBody::new("Not Found", message)),
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("Bad Request", message),
            ),
            Self::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorBody::new("Payload Too Large", "Request body exceeds the 10kb limit"),
            ),
            Self::Auth(ref err) => match err.client_view() {
                Some((status, error, message)) => (status, ErrorBody::new(error, message)),
                None => self.internal(),
            },
            Self::Cart(CartError::ItemNotFound(_)) => (
                StatusCode::NOT_FOUND,
                ErrorBody::new("Not Found", "Item not found in cart"),
            ),
            Self::Cart(CartError::InvalidQuantity) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("Bad Request", CartError::InvalidQuantity.to_string()),
            ),
            Self::Order(err) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("Bad Request", err.to_string()),
            ),
            Self::Database(RepositoryError::NotFound) => (
                StatusCode::NOT_FOUND,
                ErrorBody::new("Not Found", "Resource not found"),
            ),
            Self::Database(RepositoryError::Conflict(_)) => (
                StatusCode::CONFLICT,
                ErrorBody::new("Duplicate entry", "This record already exists"),
            ),
            Self::Database(RepositoryError::ConcurrentUpdate) => (
                StatusCode::CONFLICT,
                ErrorBody::new(
                    "Conflict",
                    "The resource was modified concurrently, please retry",
                ),
            ),
            Self::Database(_) => self.internal(),
        }
    }

    /// Log, report to Sentry and hide the cause from the client.
    fn internal(self) -> (StatusCode, ErrorBody) {
        let event_id = sentry::capture_error(&self);
        tracing::error!(
            error = %self,
            sentry_event_id = %event_id,
            "Request error"
        );

        let mut body = ErrorBody::new("Internal server error", "Something went wrong");
        if EXPOSE_DETAILS.load(Ordering::Relaxed) {
            body.detail = Some(error_chain(&self));
        }
        (StatusCode::INTERNAL_SERVER_ERROR, body)
    }
}

fn error_chain(err: &AppError) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::Value;
    use shoplane_core::{OrderStatus, ProductId};

    use super::*;

    async fn render(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::not_found("Product");
        assert_eq!(err.to_string(), "Not found: Product not found");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[tokio::test]
    async fn test_app_error_status_codes() {
        let cases = [
            (AppError::not_found("Order"), StatusCode::NOT_FOUND),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Auth(AuthError::MissingToken), StatusCode::UNAUTHORIZED),
            (AppError::Auth(AuthError::TokenExpired), StatusCode::UNAUTHORIZED),
            (AppError::Auth(AuthError::InvalidToken), StatusCode::FORBIDDEN),
            (AppError::Auth(AuthError::UserAlreadyExists), StatusCode::CONFLICT),
            (
                AppError::Cart(CartError::ItemNotFound(ProductId::new(1))),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::Order(OrderError::NotCancellable {
                    status: OrderStatus::Shipped,
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Database(RepositoryError::ConcurrentUpdate),
                StatusCode::CONFLICT,
            ),
            (AppError::PayloadTooLarge, StatusCode::PAYLOAD_TOO_LARGE),
            (AppError::Order(OrderError::TotalTooLarge), StatusCode::BAD_REQUEST),
            (
                AppError::Database(RepositoryError::DataCorruption("bad row".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let (status, _) = render(err).await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn test_validation_body_lists_fields() {
        let (status, body) = render(AppError::Validation(vec![
            FieldError {
                field: "email".into(),
                message: "Invalid email format".into(),
            },
            FieldError {
                field: "password".into(),
                message: "Password is required".into(),
            },
        ]))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["details"].as_array().unwrap().len(), 2);
        assert_eq!(body["details"][0]["field"], "email");
    }

    #[tokio::test]
    async fn test_duplicate_entry() {
        let (status, body) = render(AppError::Database(RepositoryError::Conflict(
            "email already exists".into(),
        )))
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Duplicate entry");
    }

    #[tokio::test]
    async fn test_internal_errors_are_hidden() {
        let (_, body) = render(AppError::Database(RepositoryError::DataCorruption(
            "secret column".into(),
        )))
        .await;
        assert_eq!(body["error"], "Internal server error");
        assert!(!body.to_string().contains("secret column"));
    }
}
