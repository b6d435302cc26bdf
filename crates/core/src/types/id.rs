//! Typed identifiers.
//!
//! Every stored entity is keyed by a positive `SERIAL` integer. Wrapping each
//! in its own type keeps a product id from being passed where an order id is
//! expected, and gives path segments a single parsing rule.

use thiserror::Error;

/// Why a path segment is not an id.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdError {
    #[error("id is not an integer")]
    NotANumber,
    #[error("id must be positive")]
    NotPositive,
}

/// Parse a positive id, ignoring surrounding whitespace.
///
/// # Errors
///
/// Returns [`IdError`] for non-numeric, overflowing, zero or negative input.
pub fn parse_positive(s: &str) -> Result<i32, IdError> {
    let id: i32 = s.trim().parse().map_err(|_| IdError::NotANumber)?;
    if id > 0 {
        Ok(id)
    } else {
        Err(IdError::NotPositive)
    }
}

/// Define an `i32` newtype id.
///
/// The type serializes as a bare number, displays as one, parses with
/// [`parse_positive`] and, with the `postgres` feature, binds as `INTEGER`.
///
/// ```rust
/// # use shoplane_core::define_id;
/// define_id!(ReviewId);
///
/// let id: ReviewId = "17".parse().unwrap();
/// assert_eq!(id.as_i32(), 17);
/// assert!("0".parse::<ReviewId>().is_err());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[cfg_attr(feature = "postgres", derive(::sqlx::Type), sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn as_i32(self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::id::IdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                $crate::types::id::parse_positive(s).map(Self)
            }
        }
    };
}

define_id!(UserId);
define_id!(ProductId);
define_id!(OrderId);
define_id!(AddressId);
