//! Product catalog repository.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};

use shoplane_core::{Category, ProductId};

use super::{Database, RepositoryError, stored};
use crate::models::product::RELATED_LIMIT;
use crate::models::{NewProduct, Product, ProductQuery, ProductSort};

const PRODUCT_COLUMNS: &str = "id, title, description, price, original_price, discount, rating, \
     reviews, image, images, category, subcategory, brand, features, specifications, in_stock, \
     stock_count, prime, free_shipping, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i32,
    title: String,
    description: String,
    price: Decimal,
    original_price: Option<Decimal>,
    discount: i16,
    rating: Decimal,
    reviews: i32,
    image: String,
    images: Vec<String>,
    category: String,
    subcategory: Option<String>,
    brand: String,
    features: Vec<String>,
    specifications: Json<Map<String, Value>>,
    in_stock: bool,
    stock_count: i32,
    prime: bool,
    free_shipping: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        let category = r.category.parse::<Category>().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid category in database: {e}"))
        })?;

        Ok(Self {
            id: ProductId::new(r.id),
            title: r.title,
            description: r.description,
            price: r.price,
            original_price: r.original_price,
            discount: stored(r.discount, "discount")?,
            rating: r.rating,
            reviews: stored(r.reviews, "reviews")?,
            image: r.image,
            images: r.images,
            category,
            subcategory: r.subcategory,
            brand: r.brand,
            features: r.features,
            specifications: r.specifications.0,
            in_stock: r.in_stock,
            stock_count: stored(r.stock_count, "stock_count")?,
            prime: r.prime,
            free_shipping: r.free_shipping,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Escape `LIKE` wildcards in user input.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &ProductQuery) {
    qb.push(" WHERE TRUE");
    if let Some(search) = &query.search {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR brand ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR category ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category) = &query.category {
        qb.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(min) = query.min_price {
        qb.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = query.max_price {
        qb.push(" AND price <= ").push_bind(max);
    }
    if let Some(min) = query.min_rating {
        qb.push(" AND rating >= ").push_bind(min);
    }
}

const fn order_by(sort: Option<ProductSort>) -> &'static str {
    match sort {
        None => " ORDER BY id ASC",
        Some(ProductSort::PriceAsc) => " ORDER BY price ASC, id ASC",
        Some(ProductSort::PriceDesc) => " ORDER BY price DESC, id ASC",
        Some(ProductSort::Rating) => " ORDER BY rating DESC, id ASC",
        Some(ProductSort::Discount) => " ORDER BY discount DESC, id ASC",
        Some(ProductSort::Newest) => " ORDER BY created_at DESC, id ASC",
    }
}

/// Repository for catalog products.
pub struct ProductRepository<'a> {
    db: &'a Database,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// One page of products matching `query`, and the total match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, query: &ProductQuery) -> Result<(Vec<Product>, u64), RepositoryError> {
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);

        match self.db {
            Database::Postgres(pool) => {
                let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM shop.product");
                push_filters(&mut count, query);
                let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

                let mut select =
                    QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM shop.product"));
                push_filters(&mut select, query);
                select
                    .push(order_by(query.sort))
                    .push(" LIMIT ")
                    .push_bind(i64::from(query.limit))
                    .push(" OFFSET ")
                    .push_bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));

                let rows: Vec<ProductRow> = select.build_query_as().fetch_all(pool).await?;
                let products = rows
                    .into_iter()
                    .map(Product::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((products, stored(total, "count")?))
            }
            Database::Memory(store) => {
                let data = store.read().await;
                let mut matches: Vec<&Product> =
                    data.products.values().filter(|p| query.matches(p)).collect();
                if let Some(sort) = query.sort {
                    matches.sort_by(|a, b| sort.compare(a, b));
                }

                let total = u64::try_from(matches.len()).unwrap_or(u64::MAX);
                let page = matches
                    .into_iter()
                    .skip(offset)
                    .take(limit)
                    .cloned()
                    .collect();
                Ok((page, total))
            }
        }
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        match self.db {
            Database::Postgres(pool) => {
                let sql = format!("SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = $1");
                sqlx::query_as::<_, ProductRow>(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await?
                    .map(Product::try_from)
                    .transpose()
            }
            Database::Memory(store) => Ok(store.read().await.products.get(&id).cloned()),
        }
    }

    /// Get every product in `ids` that exists, in id order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let wanted: BTreeSet<ProductId> = ids.iter().copied().collect();
        match self.db {
            Database::Postgres(pool) => {
                let ids: Vec<i32> = wanted
                    .iter()
                    .copied()
                    .map(ProductId::as_i32)
                    .collect();
                let sql = format!(
                    "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = ANY($1) ORDER BY id"
                );
                sqlx::query_as::<_, ProductRow>(&sql)
                    .bind(ids)
                    .fetch_all(pool)
                    .await?
                    .into_iter()
                    .map(Product::try_from)
                    .collect()
            }
            Database::Memory(store) => {
                let data = store.read().await;
                Ok(wanted
                    .iter()
                    .filter_map(|id| data.products.get(id).cloned())
                    .collect())
            }
        }
    }

    /// Up to four other products in the same category, best rated first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn related(&self, product: &Product) -> Result<Vec<Product>, RepositoryError> {
        match self.db {
            Database::Postgres(pool) => {
                let sql = format!(
                    "SELECT {PRODUCT_COLUMNS} FROM shop.product
                     WHERE category = $1 AND id <> $2
                     ORDER BY rating DESC, id ASC
                     LIMIT $3"
                );
                sqlx::query_as::<_, ProductRow>(&sql)
                    .bind(product.category.as_str())
                    .bind(product.id)
                    .bind(i64::try_from(RELATED_LIMIT).unwrap_or(4))
                    .fetch_all(pool)
                    .await?
                    .into_iter()
                    .map(Product::try_from)
                    .collect()
            }
            Database::Memory(store) => {
                let data = store.read().await;
                let mut related: Vec<&Product> = data
                    .products
                    .values()
                    .filter(|p| p.category == product.category && p.id != product.id)
                    .collect();
                related.sort_by(|a, b| ProductSort::Rating.compare(a, b));
                Ok(related.into_iter().take(RELATED_LIMIT).cloned().collect())
            }
        }
    }

    /// Categories that have at least one product, in menu order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` for an unknown stored category.
    pub async fn categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let present: BTreeSet<Category> = match self.db {
            Database::Postgres(pool) => {
                sqlx::query_scalar::<_, String>("SELECT DISTINCT category FROM shop.product")
                    .fetch_all(pool)
                    .await?
                    .iter()
                    .map(|c| {
                        c.parse::<Category>().map_err(|e| {
                            RepositoryError::DataCorruption(format!(
                                "invalid category in database: {e}"
                            ))
                        })
                    })
                    .collect::<Result<_, _>>()?
            }
            Database::Memory(store) => store
                .read()
                .await
                .products
                .values()
                .map(|p| p.category)
                .collect(),
        };
        Ok(present.into_iter().collect())
    }

    /// Add a product to the catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, new: NewProduct) -> Result<Product, RepositoryError> {
        match self.db {
            Database::Postgres(pool) => {
                let mut qb = QueryBuilder::<Postgres>::new(
                    "INSERT INTO shop.product (title, description, price, original_price, \
                     discount, rating, reviews, image, images, category, subcategory, brand, \
                     features, specifications, in_stock, stock_count, prime, free_shipping) ",
                );
                push_values(&mut qb, &new)?;
                qb.push(format!(" RETURNING {PRODUCT_COLUMNS}"));
                let row: ProductRow = qb.build_query_as().fetch_one(pool).await?;
                Product::try_from(row)
            }
            Database::Memory(store) => Ok(store.insert_product(None, new).await),
        }
    }

    /// Replace a product's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update(&self, id: ProductId, new: NewProduct) -> Result<Product, RepositoryError> {
        match self.db {
            Database::Postgres(pool) => {
                let mut qb = QueryBuilder::<Postgres>::new(
                    "UPDATE shop.product SET (title, description, price, original_price, \
                     discount, rating, reviews, image, images, category, subcategory, brand, \
                     features, specifications, in_stock, stock_count, prime, free_shipping) = ROW",
                );
                push_values(&mut qb, &new)?;
                qb.push(", updated_at = NOW() WHERE id = ")
                    .push_bind(id)
                    .push(format!(" RETURNING {PRODUCT_COLUMNS}"));
                let row: Option<ProductRow> = qb.build_query_as().fetch_optional(pool).await?;
                row.ok_or(RepositoryError::NotFound).and_then(Product::try_from)
            }
            Database::Memory(store) => {
                let mut data = store.write().await;
                let existing = data.products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
                let created_at = existing.created_at;
                *existing = Product::from_new(id, new, Utc::now());
                existing.created_at = created_at;
                Ok(existing.clone())
            }
        }
    }

    /// Remove a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        match self.db {
            Database::Postgres(pool) => {
                let result = sqlx::query("DELETE FROM shop.product WHERE id = $1")
                    .bind(id)
                    .execute(pool)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(RepositoryError::NotFound);
                }
                Ok(())
            }
            Database::Memory(store) => store
                .write()
                .await
                .products
                .remove(&id)
                .map(|_| ())
                .ok_or(RepositoryError::NotFound),
        }
    }
}

/// Push `(v1, v2, ...)` for every writable product column.
fn push_values(qb: &mut QueryBuilder<'_, Postgres>, new: &NewProduct) -> Result<(), RepositoryError> {
    let reviews: i32 = stored(new.reviews, "reviews")?;
    let stock_count: i32 = stored(new.stock_count, "stock_count")?;

    qb.push("(");
    let mut values = qb.separated(", ");
    values
        .push_bind(new.title.clone())
        .push_bind(new.description.clone())
        .push_bind(new.price)
        .push_bind(new.original_price)
        .push_bind(i16::from(new.discount))
        .push_bind(new.rating)
        .push_bind(reviews)
        .push_bind(new.image.clone())
        .push_bind(new.images.clone())
        .push_bind(new.category.as_str())
        .push_bind(new.subcategory.clone())
        .push_bind(new.brand.clone())
        .push_bind(new.features.clone())
        .push_bind(Json(new.specifications.clone()))
        .push_bind(new.in_stock)
        .push_bind(stock_count)
        .push_bind(new.prime)
        .push_bind(new.free_shipping);
    values.push_unseparated(")");
    Ok(())
}
