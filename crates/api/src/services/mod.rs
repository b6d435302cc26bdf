//! Business logic services.
//!
//! - `auth` - Registration, login, refresh rotation and password changes
//! - `tokens` - JWT signing, verification and refresh revocation

pub mod auth;
pub mod tokens;
