//! Catalog products, admin input and list queries.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use shoplane_core::{Category, MAX_MONEY, ProductId};

use crate::validation::{FieldError, Validate, Validator, check_text};

/// Default page size for product listings.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: u32 = 100;
/// Number of related products shown on a product page.
pub const RELATED_LIMIT: usize = 4;

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Decimal>,
    pub discount: u8,
    pub rating: Decimal,
    pub reviews: u32,
    pub image: String,
    pub images: Vec<String>,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    pub brand: String,
    pub features: Vec<String>,
    pub specifications: Map<String, Value>,
    pub in_stock: bool,
    pub stock_count: u32,
    pub prime: bool,
    pub free_shipping: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product as rendered to clients, with its derived discount.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub calculated_discount: u32,
}

impl Product {
    /// Percentage saved against the original price, rounded to a whole number.
    ///
    /// Zero when there is no original price or it is not above the price.
    #[must_use]
    pub fn calculated_discount(&self) -> u32 {
        match self.original_price {
            Some(original) if original > self.price && !original.is_zero() => {
                ((original - self.price) / original * Decimal::ONE_HUNDRED)
                    .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                    .to_u32()
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }

    #[must_use]
    pub fn into_view(self) -> ProductView {
        ProductView {
            calculated_discount: self.calculated_discount(),
            product: self,
        }
    }

    /// Build a product from validated fields.
    #[must_use]
    pub fn from_new(id: ProductId, new: NewProduct, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: new.title,
            description: new.description,
            price: new.price,
            original_price: new.original_price,
            discount: new.discount,
            rating: new.rating,
            reviews: new.reviews,
            image: new.image,
            images: new.images,
            category: new.category,
            subcategory: new.subcategory,
            brand: new.brand,
            features: new.features,
            specifications: new.specifications,
            in_stock: new.in_stock,
            stock_count: new.stock_count,
            prime: new.prime,
            free_shipping: new.free_shipping,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Validated product fields, ready to store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub discount: u8,
    pub rating: Decimal,
    pub reviews: u32,
    pub image: String,
    pub images: Vec<String>,
    pub category: Category,
    pub subcategory: Option<String>,
    pub brand: String,
    pub features: Vec<String>,
    pub specifications: Map<String, Value>,
    pub in_stock: bool,
    pub stock_count: u32,
    pub prime: bool,
    pub free_shipping: bool,
}

#[cfg(test)]
impl NewProduct {
    /// An in-stock product with placeholder text fields.
    pub(crate) fn sample(title: &str, category: Category, price: &str) -> Self {
        Self {
            title: title.to_owned(),
            description: format!("{title} description"),
            price: price.parse().unwrap_or_default(),
            original_price: None,
            discount: 0,
            rating: Decimal::new(4, 0),
            reviews: 0,
            image: format!("https://img.example.com/{}.jpg", title.to_lowercase()),
            images: Vec::new(),
            category,
            subcategory: None,
            brand: "Acme".to_owned(),
            features: Vec::new(),
            specifications: Map::new(),
            in_stock: true,
            stock_count: 100,
            prime: false,
            free_shipping: false,
        }
    }
}

/// Product fields as submitted by an administrator or a catalog file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductInput {
    pub title: String,
    pub description: String,
    pub price: Option<Decimal>,
    pub original_price: Option<Decimal>,
    pub discount: Option<i64>,
    pub rating: Option<Decimal>,
    pub reviews: Option<i64>,
    pub image: String,
    pub images: Vec<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub brand: String,
    pub features: Vec<String>,
    pub specifications: Option<Map<String, Value>>,
    pub in_stock: Option<bool>,
    pub stock_count: Option<i64>,
    pub prime: Option<bool>,
    pub free_shipping: Option<bool>,
}

/// One entry of a catalog file: product fields plus an optional fixed id.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub id: Option<ProductId>,
    #[serde(flatten)]
    pub input: ProductInput,
}

impl ProductInput {
    /// Validate and convert into storable fields.
    ///
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn into_new(self) -> Result<NewProduct, Vec<FieldError>> {
        let mut v = Validator::new();

        check_text(&mut v, "title", &self.title, "Title", 200);
        check_text(&mut v, "description", &self.description, "Description", 2000);
        check_text(&mut v, "brand", &self.brand, "Brand", 100);
        check_text(&mut v, "image", &self.image, "Image", 2048);

        match self.price {
            None => {
                v.error("price", "Price is required");
            }
            Some(price) => {
                v.check(price >= Decimal::ZERO, "price", "Price must be positive");
                v.check(price <= MAX_MONEY, "price", &format!("Price cannot exceed {MAX_MONEY}"));
            }
        }
        if let Some(original) = self.original_price {
            v.check(
                original >= Decimal::ZERO,
                "originalPrice",
                "Original price cannot be negative",
            );
            v.check(
                original <= MAX_MONEY,
                "originalPrice",
                &format!("Original price cannot exceed {MAX_MONEY}"),
            );
        }

        let discount = self.discount.unwrap_or(0);
        v.check(
            (0..=100).contains(&discount),
            "discount",
            "Discount must be between 0 and 100",
        );
        let rating = self.rating.unwrap_or(Decimal::ZERO);
        v.check(
            rating >= Decimal::ZERO && rating <= Decimal::new(5, 0),
            "rating",
            "Rating must be between 0 and 5",
        );
        let reviews = self.reviews.unwrap_or(0);
        v.check(
            (0..=i64::from(i32::MAX)).contains(&reviews),
            "reviews",
            "Reviews must be a non-negative count",
        );
        let stock_count = self.stock_count.unwrap_or(100);
        v.check(
            (0..=i64::from(i32::MAX)).contains(&stock_count),
            "stockCount",
            "Stock count must be a non-negative count",
        );

        let category = match self.category.as_deref().map(str::trim) {
            None | Some("") => {
                v.error("category", "Category is required");
                None
            }
            Some(raw) => {
                let parsed = Category::from_str(raw).ok();
                v.check(parsed.is_some(), "category", "Invalid category");
                parsed
            }
        };

        v.finish()?;

        let (Some(price), Some(category)) = (self.price, category) else {
            return Err(vec![FieldError {
                field: "price".to_owned(),
                message: "Price is required".to_owned(),
            }]);
        };

        Ok(NewProduct {
            title: self.title.trim().to_owned(),
            description: self.description,
            price: shoplane_core::round_money(price),
            original_price: self.original_price.map(shoplane_core::round_money),
            discount: u8::try_from(discount).unwrap_or(0),
            rating: rating.round_dp(2),
            reviews: u32::try_from(reviews).unwrap_or(0),
            image: self.image.trim().to_owned(),
            images: self.images,
            category,
            subcategory: self.subcategory.filter(|s| !s.trim().is_empty()),
            brand: self.brand.trim().to_owned(),
            features: self.features,
            specifications: self.specifications.unwrap_or_default(),
            in_stock: self.in_stock.unwrap_or(true),
            stock_count: u32::try_from(stock_count).unwrap_or(0),
            prime: self.prime.unwrap_or(false),
            free_shipping: self.free_shipping.unwrap_or(false),
        })
    }
}

impl Validate for ProductInput {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        self.clone().into_new().map(|_| ())
    }
}

// =============================================================================
// Listing
// =============================================================================

/// Sort orders for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductSort {
    PriceAsc,
    PriceDesc,
    Rating,
    Discount,
    Newest,
}

impl FromStr for ProductSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price-asc" => Ok(Self::PriceAsc),
            "price-desc" => Ok(Self::PriceDesc),
            "rating" => Ok(Self::Rating),
            "discount" => Ok(Self::Discount),
            "newest" => Ok(Self::Newest),
            other => Err(format!("unknown sort '{other}'")),
        }
    }
}

impl ProductSort {
    /// Ordering of two products. Ties fall back to ascending id.
    #[must_use]
    pub fn compare(self, a: &Product, b: &Product) -> Ordering {
        let primary = match self {
            Self::PriceAsc => a.price.cmp(&b.price),
            Self::PriceDesc => b.price.cmp(&a.price),
            Self::Rating => b.rating.cmp(&a.rating),
            Self::Discount => b.discount.cmp(&a.discount),
            Self::Newest => b.created_at.cmp(&a.created_at),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// Raw listing query string parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListParams {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub min_rating: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<String>,
    pub page: Option<String>,
}

/// A parsed product listing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_rating: Option<Decimal>,
    pub sort: Option<ProductSort>,
    pub limit: u32,
    pub page: u32,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            search: None,
            category: None,
            min_price: None,
            max_price: None,
            min_rating: None,
            sort: None,
            limit: DEFAULT_PAGE_SIZE,
            page: 1,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

impl ProductQuery {
    /// Parse raw query parameters. Unknown sort values are ignored.
    ///
    /// # Errors
    ///
    /// Returns every malformed numeric parameter.
    pub fn from_params(params: ProductListParams) -> Result<Self, Vec<FieldError>> {
        let mut v = Validator::new();

        let mut decimal = |field: &str, raw: Option<String>, label: &str| {
            let raw = non_blank(raw)?;
            match raw.parse::<Decimal>() {
                Ok(value) if value >= Decimal::ZERO => Some(value),
                _ => {
                    v.error(field, &format!("{label} must be a non-negative number"));
                    None
                }
            }
        };
        let min_price = decimal("minPrice", params.min_price, "minPrice");
        let max_price = decimal("maxPrice", params.max_price, "maxPrice");
        let min_rating = decimal("minRating", params.min_rating, "minRating");

        let limit = match non_blank(params.limit) {
            None => DEFAULT_PAGE_SIZE,
            Some(raw) => match raw.parse::<u32>() {
                Ok(limit) if (1..=MAX_PAGE_SIZE).contains(&limit) => limit,
                _ => {
                    v.error("limit", "limit must be between 1 and 100");
                    DEFAULT_PAGE_SIZE
                }
            },
        };
        let page = match non_blank(params.page) {
            None => 1,
            Some(raw) => match raw.parse::<u32>() {
                Ok(page) if page >= 1 => page,
                _ => {
                    v.error("page", "page must be a positive integer");
                    1
                }
            },
        };

        v.finish()?;

        Ok(Self {
            search: non_blank(params.search),
            category: non_blank(params.category),
            min_price,
            max_price,
            min_rating,
            sort: non_blank(params.sort).and_then(|s| s.parse().ok()),
            limit,
            page,
        })
    }

    /// Number of matching products skipped before this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Whether `product` passes every filter.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let hit = product.title.to_lowercase().contains(&needle)
                || product.brand.to_lowercase().contains(&needle)
                || product.category.as_str().to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        if self
            .category
            .as_deref()
            .is_some_and(|c| c != product.category.as_str())
        {
            return false;
        }
        if self.min_price.is_some_and(|min| product.price < min)
            || self.max_price.is_some_and(|max| product.price > max)
            || self.min_rating.is_some_and(|min| product.rating < min)
        {
            return false;
        }
        true
    }

    /// Total pages for `total` matches.
    #[must_use]
    pub fn pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit.max(1)))
    }
}
