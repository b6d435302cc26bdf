//! Domain models for the API.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`].

pub mod product;
pub mod user;

pub use product::{
    CatalogEntry, NewProduct, Product, ProductInput, ProductListParams, ProductQuery, ProductSort,
    ProductView,
};
pub use user::{Address, AddressInput, NewUser, PublicUser, User, UserProfile};
