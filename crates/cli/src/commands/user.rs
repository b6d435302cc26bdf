//! Customer account management.
//!
//! # Usage
//!
//! ```bash
//! # Promote a customer to administrator
//! shoplane-cli user set-role -e admin@example.com -r admin
//!
//! # Block or unblock a login
//! shoplane-cli user deactivate -e spammer@example.com
//! shoplane-cli user activate -e spammer@example.com
//! ```

use shoplane_api::db::RepositoryError;
use shoplane_core::{Email, UserRole};
use thiserror::Error;

use super::{CommandError, database};

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: user, admin")]
    InvalidRole(String),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No account with that email.
    #[error("No user with email: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

fn parse_email(email: &str) -> Result<Email, UserError> {
    Email::parse(email).map_err(|_| UserError::InvalidEmail(email.to_owned()))
}

/// Change the role of the account registered under `email`.
///
/// # Errors
///
/// Returns an error for a bad email or role, or an unknown account.
pub async fn set_role(email: &str, role: &str) -> Result<(), UserError> {
    let role: UserRole = role
        .parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))?;
    let email = parse_email(email)?;

    let db = database().await?;
    let user = db
        .users()
        .set_role(&email, role)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => UserError::NotFound(email.to_string()),
            other => other.into(),
        })?;

    tracing::info!(user_id = %user.id, email = %user.email, role = %user.role, "Role updated");
    Ok(())
}

/// Enable or disable logins for the account registered under `email`.
///
/// # Errors
///
/// Returns an error for a bad email or an unknown account.
pub async fn set_active(email: &str, active: bool) -> Result<(), UserError> {
    let email = parse_email(email)?;

    let db = database().await?;
    let users = db.users();
    let user = users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| UserError::NotFound(email.to_string()))?;
    users.set_active(user.id, active).await?;

    tracing::info!(user_id = %user.id, email = %user.email, active, "Account status updated");
    Ok(())
}
