//! In-process storage used when no database is available.
//!
//! All collections live behind one `RwLock`, so every repository call sees a
//! consistent snapshot and writes are serialized.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use shoplane_core::{Order, OrderId, ProductId, UserId};

use super::StoredCart;
use crate::models::{CatalogEntry, NewProduct, Product, User};
use crate::validation::FieldError;

/// Errors loading a catalog file.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("catalog entry {index} is invalid: {}", describe(.errors))]
    InvalidEntry {
        index: usize,
        errors: Vec<FieldError>,
    },
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A user row together with its password hash.
#[derive(Debug, Clone)]
pub(crate) struct StoredUser {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryData {
    pub users: BTreeMap<UserId, StoredUser>,
    pub products: BTreeMap<ProductId, Product>,
    pub carts: HashMap<UserId, StoredCart>,
    pub orders: BTreeMap<OrderId, Order>,
    last_user_id: i32,
    last_product_id: i32,
    last_order_id: i32,
}

impl MemoryData {
    pub fn next_user_id(&mut self) -> UserId {
        self.last_user_id += 1;
        UserId::new(self.last_user_id)
    }

    pub fn next_order_id(&mut self) -> OrderId {
        self.last_order_id += 1;
        OrderId::new(self.last_order_id)
    }

    /// Allocate a product id, or reserve a fixed one from a catalog.
    pub fn product_id(&mut self, fixed: Option<ProductId>) -> ProductId {
        match fixed {
            Some(id) => {
                self.last_product_id = self.last_product_id.max(id.as_i32());
                id
            }
            None => {
                self.last_product_id += 1;
                ProductId::new(self.last_product_id)
            }
        }
    }
}

/// The in-memory backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, MemoryData> {
        self.data.read().await
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, MemoryData> {
        self.data.write().await
    }

    /// Add a product, keeping `id` when given. An existing product with the
    /// same id is replaced.
    pub async fn insert_product(&self, id: Option<ProductId>, new: NewProduct) -> Product {
        let mut data = self.write().await;
        let id = data.product_id(id);
        let product = Product::from_new(id, new, Utc::now());
        data.products.insert(id, product.clone());
        product
    }

    /// Load products from a JSON array of catalog entries.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the JSON is malformed or any entry fails
    /// validation. Nothing is inserted in that case.
    pub async fn load_catalog_json(&self, json: &str) -> Result<usize, CatalogError> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;

        let mut products = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            let new = entry
                .input
                .into_new()
                .map_err(|errors| CatalogError::InvalidEntry { index, errors })?;
            products.push((entry.id, new));
        }

        let count = products.len();
        for (id, new) in products {
            self.insert_product(id, new).await;
        }
        Ok(count)
    }

    /// Load products from a catalog file.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the file cannot be read or parsed.
    pub async fn load_catalog(&self, path: &Path) -> Result<usize, CatalogError> {
        let json = tokio::fs::read_to_string(path).await?;
        self.load_catalog_json(&json).await
    }
}
