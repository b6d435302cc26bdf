//! Cart route handlers.
//!
//! Line titles, prices and images are always taken from the catalog when a
//! product enters the cart. Clients only send product IDs and quantities.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use shoplane_core::cart::MAX_LINE_QUANTITY;
use shoplane_core::{Cart, CartLine, PriceBreakdown, ProductId, UserId};

use crate::db::StoredCart;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::Product;
use crate::routes::parse_id;
use crate::state::AppState;
use crate::validation::{FieldError, Validate, ValidJson, Validator};

/// Most lines accepted in one merge.
pub const MAX_MERGE_ITEMS: usize = 100;

// =============================================================================
// Response Types
// =============================================================================

/// A cart as returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub saved_for_later: Vec<CartLine>,
    pub totals: PriceBreakdown,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CartView {
    fn new(stored: StoredCart, state: &AppState) -> Self {
        let totals = stored.cart.totals(state.pricing());
        Self {
            items: stored.cart.items,
            saved_for_later: stored.cart.saved_for_later,
            totals,
            updated_at: stored.updated_at,
        }
    }
}

/// Response of every cart mutation.
#[derive(Debug, Serialize)]
pub struct CartMutation {
    pub message: &'static str,
    pub cart: CartView,
}

/// Response of a guest cart merge.
#[derive(Debug, Serialize)]
pub struct MergeResponse {
    pub message: &'static str,
    pub merged: usize,
    pub skipped: Vec<i64>,
    pub cart: CartView,
}

// =============================================================================
// Request Types
// =============================================================================

pub(crate) fn check_product_id(v: &mut Validator, field: &str, id: Option<i64>) {
    v.check(
        id.is_some_and(|id| id > 0 && i32::try_from(id).is_ok()),
        field,
        "Valid product ID is required",
    );
}

pub(crate) fn check_quantity(v: &mut Validator, field: &str, quantity: Option<i64>) {
    v.check(
        quantity.is_none_or(|q| (1..=i64::from(MAX_LINE_QUANTITY)).contains(&q)),
        field,
        &format!("Quantity must be between 1 and {MAX_LINE_QUANTITY}"),
    );
}

pub(crate) fn to_product_id(id: Option<i64>) -> Result<ProductId> {
    id.and_then(|id| i32::try_from(id).ok())
        .map(ProductId::new)
        .ok_or_else(|| AppError::not_found("Product"))
}

pub(crate) fn to_quantity(quantity: Option<i64>) -> u32 {
    quantity.and_then(|q| u32::try_from(q).ok()).unwrap_or(1)
}

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRequest {
    pub product_id: Option<i64>,
    pub quantity: Option<i64>,
}

impl Validate for AddRequest {
    fn validate(&self) -> std::result::Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        check_product_id(&mut v, "productId", self.product_id);
        check_quantity(&mut v, "quantity", self.quantity);
        v.finish()
    }
}

/// Quantity update request body.
#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: Option<i64>,
}

impl Validate for QuantityRequest {
    fn validate(&self) -> std::result::Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        if self.quantity.is_none() {
            v.error("quantity", "Quantity is required");
        }
        check_quantity(&mut v, "quantity", self.quantity);
        v.finish()
    }
}

/// One line of a guest cart.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeItem {
    pub product_id: Option<i64>,
    pub quantity: Option<i64>,
}

/// Guest cart merge request body.
#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    #[serde(default)]
    pub items: Vec<MergeItem>,
}

impl Validate for MergeRequest {
    fn validate(&self) -> std::result::Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        v.check(
            self.items.len() <= MAX_MERGE_ITEMS,
            "items",
            "Too many items to merge",
        );
        for (i, item) in self.items.iter().enumerate() {
            check_product_id(&mut v, &format!("items[{i}].productId"), item.product_id);
            check_quantity(&mut v, &format!("items[{i}].quantity"), item.quantity);
        }
        v.finish()
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Snapshot a catalog product as a cart line.
pub(crate) fn catalog_line(product: &Product, quantity: u32) -> Result<CartLine> {
    if !product.in_stock || product.stock_count == 0 {
        return Err(AppError::BadRequest(format!(
            "{} is out of stock",
            product.title
        )));
    }
    Ok(CartLine {
        product_id: product.id,
        title: product.title.clone(),
        price: product.price,
        image: product.image.clone(),
        quantity,
    })
}

/// Apply `change` to the user's cart and render the result.
async fn mutate<F>(
    state: &AppState,
    user_id: UserId,
    message: &'static str,
    change: F,
) -> Result<Json<CartMutation>>
where
    F: FnMut(&mut Cart) -> Result<()>,
{
    let (stored, ()) = state.db().carts().update(user_id, change).await?;
    Ok(Json(CartMutation {
        message,
        cart: CartView::new(stored, state),
    }))
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/cart
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartView>> {
    let stored = state.db().carts().get(user.id).await?;
    Ok(Json(CartView::new(stored, &state)))
}

/// POST /api/cart/add
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidJson(req): ValidJson<AddRequest>,
) -> Result<Json<CartMutation>> {
    let product_id = to_product_id(req.product_id)?;
    let product = state
        .db()
        .products()
        .get(product_id)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    let line = catalog_line(&product, to_quantity(req.quantity))?;

    let id = product_id.to_string();
    add_breadcrumb("cart", "Added to cart", &[("product_id", &id)]);

    mutate(&state, user.id, "Item added to cart", |cart| {
        Ok(cart.add(line.clone())?)
    })
    .await
}

/// PUT /api/cart/update/{id}
#[instrument(skip_all, fields(user_id = %user.id, product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<QuantityRequest>,
) -> Result<Json<CartMutation>> {
    let product_id: ProductId = parse_id(&id, "Item")?;
    let quantity = to_quantity(req.quantity);
    mutate(&state, user.id, "Cart updated", |cart| {
        Ok(cart.set_quantity(product_id, quantity)?)
    })
    .await
}

/// DELETE /api/cart/remove/{id}
#[instrument(skip_all, fields(user_id = %user.id, product_id = %id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<CartMutation>> {
    let product_id: ProductId = parse_id(&id, "Item")?;
    mutate(&state, user.id, "Item removed from cart", |cart| {
        cart.remove(product_id)?;
        Ok(())
    })
    .await
}

/// DELETE /api/cart/clear
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartMutation>> {
    mutate(&state, user.id, "Cart cleared", |cart| {
        cart.clear();
        Ok(())
    })
    .await
}

/// POST /api/cart/save-for-later/{id}
#[instrument(skip_all, fields(user_id = %user.id, product_id = %id))]
pub async fn save_for_later(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<CartMutation>> {
    let product_id: ProductId = parse_id(&id, "Item")?;
    mutate(&state, user.id, "Item saved for later", |cart| {
        Ok(cart.save_for_later(product_id)?)
    })
    .await
}

/// POST /api/cart/move-to-cart/{id}
#[instrument(skip_all, fields(user_id = %user.id, product_id = %id))]
pub async fn move_to_cart(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<CartMutation>> {
    let product_id: ProductId = parse_id(&id, "Item")?;
    mutate(&state, user.id, "Item moved to cart", |cart| {
        Ok(cart.move_to_cart(product_id)?)
    })
    .await
}

/// POST /api/cart/merge
///
/// Unknown and out-of-stock products are skipped and reported back.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn merge(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidJson(req): ValidJson<MergeRequest>,
) -> Result<Json<MergeResponse>> {
    let requested: Vec<(ProductId, u32)> = req
        .items
        .iter()
        .map(|item| Ok((to_product_id(item.product_id)?, to_quantity(item.quantity))))
        .collect::<Result<_>>()?;

    let ids: Vec<ProductId> = requested.iter().map(|(id, _)| *id).collect();
    let catalog: HashMap<ProductId, Product> = state
        .db()
        .products()
        .get_many(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut lines = Vec::with_capacity(requested.len());
    let mut skipped = Vec::new();
    for (id, quantity) in requested {
        match catalog.get(&id).map(|p| catalog_line(p, quantity)) {
            Some(Ok(line)) => lines.push(line),
            _ => skipped.push(i64::from(id.as_i32())),
        }
    }

    let (stored, merged) = state
        .db()
        .carts()
        .update(user.id, |cart| {
            Ok::<_, AppError>(cart.merge(lines.iter().cloned()))
        })
        .await?;

    tracing::info!(merged, skipped = skipped.len(), "Guest cart merged");
    Ok(Json(MergeResponse {
        message: "Cart merged",
        merged,
        skipped,
        cart: CartView::new(stored, &state),
    }))
}
