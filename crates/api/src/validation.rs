//! Request body validation.
//!
//! Handlers take bodies through [`ValidJson`], which deserializes the JSON and
//! then runs the type's [`Validate`] rules. Every failing field is reported,
//! not just the first one.

use axum::extract::{FromRequest, Json, Request};
use axum::http::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Characters accepted as the "special character" in a password.
pub const PASSWORD_SPECIALS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// A single failed rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Collects field errors.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` for `field` unless `ok` holds.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.error(field, message);
        }
        self
    }

    /// Record an error unconditionally.
    pub fn error(&mut self, field: &str, message: &str) -> &mut Self {
        self.errors.push(FieldError {
            field: field.to_owned(),
            message: message.to_owned(),
        });
        self
    }

    /// Whether `field` already failed a rule.
    #[must_use]
    pub fn has_error(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Finish validation.
    ///
    /// # Errors
    ///
    /// Returns every recorded field error.
    pub fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Types that can check their own field rules.
pub trait Validate {
    /// # Errors
    ///
    /// Returns the list of failing fields.
    fn validate(&self) -> Result<(), Vec<FieldError>>;
}

/// JSON body extractor that validates after deserializing.
///
/// Malformed JSON is a 400 with the parser's message and an oversized body is
/// a 413. Rule failures are a 400 with `details` listing each failing field.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => AppError::PayloadTooLarge,
                _ => AppError::BadRequest(rejection.body_text()),
            })?;
        value.validate().map_err(AppError::Validation)?;
        Ok(Self(value))
    }
}

// =============================================================================
// Shared rules
// =============================================================================

/// Check a display name: 2-50 characters, letters and spaces only.
pub fn check_name(v: &mut Validator, field: &str, name: &str) {
    let name = name.trim();
    if name.is_empty() {
        v.error(field, "Name is required");
        return;
    }
    let len = name.chars().count();
    v.check((2..=50).contains(&len), field, "Name must be 2-50 characters");
    v.check(
        name.chars().all(|c| c.is_ascii_alphabetic() || c.is_whitespace()),
        field,
        "Name can only contain letters",
    );
}

/// Check an email address.
pub fn check_email(v: &mut Validator, field: &str, email: &str) {
    if email.trim().is_empty() {
        v.error(field, "Email is required");
    } else if shoplane_core::Email::parse(email).is_err() {
        v.error(field, "Invalid email format");
    }
}

/// Check a new password against the strength rules, reporting each miss.
pub fn check_password(v: &mut Validator, field: &str, password: &str) {
    if password.is_empty() {
        v.error(field, "Password is required");
        return;
    }
    v.check(
        password.chars().count() >= MIN_PASSWORD_LENGTH,
        field,
        "Password must be at least 8 characters",
    );
    v.check(
        password.chars().any(|c| c.is_ascii_uppercase()),
        field,
        "Password must contain uppercase letter",
    );
    v.check(
        password.chars().any(|c| c.is_ascii_lowercase()),
        field,
        "Password must contain lowercase letter",
    );
    v.check(
        password.chars().any(|c| c.is_ascii_digit()),
        field,
        "Password must contain a number",
    );
    v.check(
        password.chars().any(|c| PASSWORD_SPECIALS.contains(c)),
        field,
        "Password must contain special character",
    );
}

/// Check that a trimmed string is present and at most `max` characters.
pub fn check_text(v: &mut Validator, field: &str, value: &str, label: &str, max: usize) {
    let value = value.trim();
    if value.is_empty() {
        v.error(field, &format!("{label} is required"));
    } else if value.chars().count() > max {
        v.error(field, &format!("{label} cannot exceed {max} characters"));
    }
}
