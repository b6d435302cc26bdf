//! Cart repository.
//!
//! A cart is one versioned document per user. Writes go through
//! [`CartRepository::update`], which reads the current version, applies the
//! change, and writes only if nobody else wrote in between.

use chrono::{DateTime, Utc};
use sqlx::types::Json;

use shoplane_core::{Cart, CartLine, UserId};

use super::{Database, RepositoryError};

/// Attempts made before giving up on a contended cart.
pub const CAS_ATTEMPTS: usize = 3;

/// A cart together with its storage version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredCart {
    pub cart: Cart,
    /// Zero for a cart that was never written.
    pub version: i32,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct CartRow {
    items: Json<Vec<CartLine>>,
    saved_for_later: Json<Vec<CartLine>>,
    version: i32,
    updated_at: DateTime<Utc>,
}

impl From<CartRow> for StoredCart {
    fn from(r: CartRow) -> Self {
        Self {
            cart: Cart {
                items: r.items.0,
                saved_for_later: r.saved_for_later.0,
            },
            version: r.version,
            updated_at: Some(r.updated_at),
        }
    }
}

/// Repository for shopping carts.
pub struct CartRepository<'a> {
    db: &'a Database,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// The user's cart, empty if none was saved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, user_id: UserId) -> Result<StoredCart, RepositoryError> {
        match self.db {
            Database::Postgres(pool) => {
                let row = sqlx::query_as::<_, CartRow>(
                    "SELECT items, saved_for_later, version, updated_at
                     FROM shop.cart WHERE user_id = $1",
                )
                .bind(user_id)
                .fetch_optional(pool)
                .await?;
                Ok(row.map(StoredCart::from).unwrap_or_default())
            }
            Database::Memory(store) => Ok(store
                .read()
                .await
                .carts
                .get(&user_id)
                .cloned()
                .unwrap_or_default()),
        }
    }

    /// Apply `change` to the user's cart and save it.
    ///
    /// Nothing is written if `change` fails. On a version conflict the cart is
    /// re-read and `change` runs again, up to [`CAS_ATTEMPTS`] times.
    ///
    /// # Errors
    ///
    /// Returns the error from `change`, or `RepositoryError::ConcurrentUpdate` once
    /// the attempts are exhausted.
    pub async fn update<F, T, E>(&self, user_id: UserId, mut change: F) -> Result<(StoredCart, T), E>
    where
        F: FnMut(&mut Cart) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        match self.db {
            Database::Postgres(pool) => {
                for attempt in 1..=CAS_ATTEMPTS {
                    let current = self.get(user_id).await?;
                    let mut cart = current.cart;
                    let output = change(&mut cart)?;

                    let written: Option<(i32, DateTime<Utc>)> = if current.version == 0 {
                        sqlx::query_as(
                            "INSERT INTO shop.cart (user_id, items, saved_for_later, version)
                             VALUES ($1, $2, $3, 1)
                             ON CONFLICT (user_id) DO NOTHING
                             RETURNING version, updated_at",
                        )
                        .bind(user_id)
                        .bind(Json(&cart.items))
                        .bind(Json(&cart.saved_for_later))
                        .fetch_optional(pool)
                        .await
                        .map_err(RepositoryError::from)?
                    } else {
                        sqlx::query_as(
                            "UPDATE shop.cart
                             SET items = $2, saved_for_later = $3,
                                 version = version + 1, updated_at = NOW()
                             WHERE user_id = $1 AND version = $4
                             RETURNING version, updated_at",
                        )
                        .bind(user_id)
                        .bind(Json(&cart.items))
                        .bind(Json(&cart.saved_for_later))
                        .bind(current.version)
                        .fetch_optional(pool)
                        .await
                        .map_err(RepositoryError::from)?
                    };

                    if let Some((version, updated_at)) = written {
                        let saved = StoredCart {
                            cart,
                            version,
                            updated_at: Some(updated_at),
                        };
                        return Ok((saved, output));
                    }
                    tracing::debug!(user_id = %user_id, attempt, "Cart version conflict, retrying");
                }

                tracing::warn!(user_id = %user_id, "Cart update gave up after repeated conflicts");
                Err(RepositoryError::ConcurrentUpdate.into())
            }
            Database::Memory(store) => {
                let mut data = store.write().await;
                let current = data.carts.get(&user_id).cloned().unwrap_or_default();
                let mut cart = current.cart;
                let output = change(&mut cart)?;

                let saved = StoredCart {
                    cart,
                    version: current.version + 1,
                    updated_at: Some(Utc::now()),
                };
                data.carts.insert(user_id, saved.clone());
                Ok((saved, output))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use shoplane_core::{CartError, ProductId};

    use super::*;
    use crate::db::MemoryStore;

    #[derive(Debug)]
    enum TestError {
        Cart(CartError),
        Repository(RepositoryError),
    }

    impl From<RepositoryError> for TestError {
        fn from(err: RepositoryError) -> Self {
            Self::Repository(err)
        }
    }

    fn line(id: i32, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            title: format!("Product {id}"),
            price: "9.99".parse().unwrap(),
            image: String::new(),
            quantity,
        }
    }

    async fn add(db: &Database, user: UserId, id: i32, quantity: u32) -> StoredCart {
        let (saved, ()) = db
            .carts()
            .update(user, |cart| cart.add(line(id, quantity)).map_err(TestError::Cart))
            .await
            .unwrap();
        saved
    }

    #[tokio::test]
    async fn test_missing_cart_is_empty_version_zero() {
        let db = Database::memory(MemoryStore::new());
        let stored = db.carts().get(UserId::new(1)).await.unwrap();
        assert!(stored.cart.is_empty());
        assert_eq!(stored.version, 0);
        assert_eq!(stored.updated_at, None);
    }

    #[tokio::test]
    async fn test_update_bumps_version() {
        let db = Database::memory(MemoryStore::new());
        let user = UserId::new(1);

        assert_eq!(add(&db, user, 1, 1).await.version, 1);

        let saved = add(&db, user, 1, 2).await;
        assert_eq!(saved.version, 2);
        assert_eq!(saved.cart.items.len(), 1);
        assert_eq!(saved.cart.items[0].quantity, 3);
        assert_eq!(db.carts().get(user).await.unwrap(), saved);
    }

    #[tokio::test]
    async fn test_failed_change_writes_nothing() {
        let db = Database::memory(MemoryStore::new());
        let user = UserId::new(1);
        add(&db, user, 1, 1).await;

        let err = db
            .carts()
            .update(user, |cart| {
                cart.clear();
                cart.remove(ProductId::new(2)).map_err(TestError::Cart)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TestError::Cart(CartError::ItemNotFound(_))));

        let stored = db.carts().get(user).await.unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.cart.items.len(), 1);
    }
}
