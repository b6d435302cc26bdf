//! Authentication service.
//!
//! Password registration and login, token refresh with rotation, logout and
//! password changes. Field validation happens before these calls; this
//! service enforces credentials, account state and token lifecycle.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;

use shoplane_core::{Email, UserId, UserRole};

use crate::db::{Database, RepositoryError, UserRepository};
use crate::models::{NewUser, User};
use crate::services::tokens::{IssuedTokens, TokenService};

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    tokens: &'a TokenService,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(db: &'a Database, tokens: &'a TokenService) -> Self {
        Self {
            users: UserRepository::new(db),
            tokens,
        }
    }

    /// Register a new user and sign them in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(User, IssuedTokens), AuthError> {
        let email = Email::parse(email)?;
        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create(NewUser {
                name: name.trim().to_owned(),
                email,
                password_hash,
                role: UserRole::User,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "User registered");
        let tokens = self.issue(&user)?;
        Ok((user, tokens))
    }

    /// Login with email and password.
    ///
    /// Unknown emails and wrong passwords fail the same way.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    /// Returns `AuthError::AccountDisabled` for a deactivated account.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(User, IssuedTokens), AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (mut user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash).map_err(|_| AuthError::InvalidCredentials)?;

        if !user.is_active {
            tracing::warn!(user_id = %user.id, "Login attempt on deactivated account");
            return Err(AuthError::AccountDisabled);
        }

        let now = Utc::now();
        self.users.record_login(user.id, now).await?;
        user.last_login = Some(now);

        let tokens = self.issue(&user)?;
        Ok((user, tokens))
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// The presented refresh token is claimed before anything else, so each
    /// one works once even under concurrent requests.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingRefreshToken` without a token,
    /// `AuthError::RefreshRevoked` for a rotated or logged-out token, and
    /// `AuthError::InvalidRefreshToken` for a bad or expired token, a deleted
    /// or deactivated user, or a token older than the last password change.
    pub async fn refresh(
        &self,
        refresh_token: Option<&str>,
    ) -> Result<(User, IssuedTokens), AuthError> {
        let token = refresh_token.ok_or(AuthError::MissingRefreshToken)?;
        let claims = self
            .tokens
            .verify_refresh(token)
            .map_err(|e| AuthError::from_refresh(&e))?;
        let user_id = claims
            .user_id()
            .map_err(|_| AuthError::InvalidRefreshToken)?;
        if !self.tokens.revoke(&claims).await {
            return Err(AuthError::RefreshRevoked);
        }

        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .filter(|u| u.is_active && !u.token_predates_password_change(claims.issued_at_millis()))
            .ok_or(AuthError::InvalidRefreshToken)?;

        let tokens = self.issue(&user)?;
        tracing::debug!(user_id = %user.id, "Tokens refreshed");
        Ok((user, tokens))
    }

    /// Revoke the refresh token, if it is still valid. Never fails.
    pub async fn logout(&self, refresh_token: Option<&str>) {
        if let Some(claims) = refresh_token.and_then(|t| self.tokens.verify_refresh(t).ok()) {
            self.tokens.revoke(&claims).await;
            tracing::debug!(user = %claims.sub, "Refresh token revoked on logout");
        }
    }

    /// Change a password after checking the current one.
    ///
    /// Revokes the presented refresh token and, through `password_changed_at`,
    /// every refresh token issued before the change.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user no longer exists.
    /// Returns `AuthError::IncorrectPassword` if `current` does not match.
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: &str,
        new: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        let password_hash = self
            .users
            .get_password_hash_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        verify_password(current, &password_hash).map_err(|_| AuthError::IncorrectPassword)?;

        let new_hash = hash_password(new)?;
        self.users
            .update_password(user_id, &new_hash, Utc::now())
            .await?;

        self.logout(refresh_token).await;
        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    fn issue(&self, user: &User) -> Result<IssuedTokens, AuthError> {
        self.tokens.issue(user).map_err(AuthError::Token)
    }
}

/// Hash a password with Argon2id and a random salt.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
