//! Shoplane Core - Shared domain library.
//!
//! This crate provides the types and business rules used across all Shoplane
//! components:
//! - `api` - The REST backend (auth, catalog, cart, orders)
//! - `cli` - Command-line tools for migrations and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP. Both storage backends of the API (Postgres and the
//! in-memory fallback) run the same cart and order rules from here, so they
//! cannot drift apart.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, money rounding, statuses and categories
//! - [`pricing`] - Subtotal, shipping, tax and total computation
//! - [`cart`] - Cart line merging and saved-for-later handling
//! - [`order`] - Order snapshots and the status lifecycle

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod order;
pub mod pricing;
pub mod types;

pub use cart::{Cart, CartError, CartLine};
pub use order::{Order, OrderDraft, OrderError, OrderLine, OrderSummary, ShippingAddress};
pub use pricing::{PriceBreakdown, PricingPolicy};
pub use types::*;
