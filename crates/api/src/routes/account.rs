//! Account route handlers: saved addresses and the wishlist.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use shoplane_core::{AddressId, ProductId};

use crate::error::{AppError, Result};
use crate::middleware::{AuthUser, RequireAuth};
use crate::models::{Address, AddressInput, Product, User};
use crate::routes::parse_id;
use crate::state::AppState;
use crate::validation::{FieldError, Validate, ValidJson};

async fn load_user(state: &AppState, user: &AuthUser) -> Result<User> {
    state
        .db()
        .users()
        .get_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

// =============================================================================
// Addresses
// =============================================================================

/// Address list response.
#[derive(Debug, Serialize)]
pub struct AddressesResponse {
    pub addresses: Vec<Address>,
}

/// Single address change response.
#[derive(Debug, Serialize)]
pub struct AddressResponse {
    pub message: &'static str,
    pub address: Address,
    pub addresses: Vec<Address>,
}

/// GET /api/account/addresses
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn addresses(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<AddressesResponse>> {
    let user = load_user(&state, &user).await?;
    Ok(Json(AddressesResponse {
        addresses: user.addresses,
    }))
}

/// POST /api/account/addresses
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidJson(input): ValidJson<AddressInput>,
) -> Result<(StatusCode, Json<AddressResponse>)> {
    let mut user = load_user(&state, &user).await?;
    let address = user.add_address(input);
    state
        .db()
        .users()
        .save_addresses(user.id, &user.addresses)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AddressResponse {
            message: "Address added",
            address,
            addresses: user.addresses,
        }),
    ))
}

/// PUT /api/account/addresses/{id}
#[instrument(skip_all, fields(user_id = %user.id, address_id = %id))]
pub async fn update_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    ValidJson(input): ValidJson<AddressInput>,
) -> Result<Json<AddressResponse>> {
    let id: AddressId = parse_id(&id, "Address")?;
    let mut user = load_user(&state, &user).await?;
    let address = user
        .update_address(id, input)
        .ok_or_else(|| AppError::not_found("Address"))?;
    state
        .db()
        .users()
        .save_addresses(user.id, &user.addresses)
        .await?;

    Ok(Json(AddressResponse {
        message: "Address updated",
        address,
        addresses: user.addresses,
    }))
}

/// DELETE /api/account/addresses/{id}
#[instrument(skip_all, fields(user_id = %user.id, address_id = %id))]
pub async fn delete_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id: AddressId = parse_id(&id, "Address")?;
    let mut user = load_user(&state, &user).await?;
    if !user.remove_address(id) {
        return Err(AppError::not_found("Address"));
    }
    state
        .db()
        .users()
        .save_addresses(user.id, &user.addresses)
        .await?;

    Ok(Json(json!({
        "message": "Address removed",
        "addresses": user.addresses,
    })))
}

// =============================================================================
// Wishlist
// =============================================================================

/// Wishlist add request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistRequest {
    pub product_id: Option<i64>,
}

impl Validate for WishlistRequest {
    fn validate(&self) -> std::result::Result<(), Vec<FieldError>> {
        match self.product_id {
            Some(id) if id > 0 && i32::try_from(id).is_ok() => Ok(()),
            _ => Err(vec![FieldError {
                field: "productId".to_owned(),
                message: "Valid product ID is required".to_owned(),
            }]),
        }
    }
}

/// GET /api/account/wishlist
///
/// Products deleted from the catalog since they were wishlisted are left out.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn wishlist(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Value>> {
    let user = load_user(&state, &user).await?;
    let products = state.db().products().get_many(&user.wishlist).await?;
    let views: Vec<_> = products.into_iter().map(Product::into_view).collect();
    Ok(Json(json!({ "wishlist": views })))
}

/// POST /api/account/wishlist
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidJson(req): ValidJson<WishlistRequest>,
) -> Result<Json<Value>> {
    let product_id = req
        .product_id
        .and_then(|id| i32::try_from(id).ok())
        .map(ProductId::new)
        .ok_or_else(|| AppError::not_found("Product"))?;
    if state.db().products().get(product_id).await?.is_none() {
        return Err(AppError::not_found("Product"));
    }

    let mut user = load_user(&state, &user).await?;
    if user.add_to_wishlist(product_id) {
        state
            .db()
            .users()
            .set_wishlist(user.id, &user.wishlist)
            .await?;
    }

    Ok(Json(json!({
        "message": "Added to wishlist",
        "wishlist": user.wishlist,
    })))
}

/// DELETE /api/account/wishlist/{id}
#[instrument(skip_all, fields(user_id = %user.id, product_id = %id))]
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let product_id: ProductId = parse_id(&id, "Product")?;
    let mut user = load_user(&state, &user).await?;
    if !user.remove_from_wishlist(product_id) {
        return Err(AppError::NotFound("Product not in wishlist".to_owned()));
    }
    state
        .db()
        .users()
        .set_wishlist(user.id, &user.wishlist)
        .await?;

    Ok(Json(json!({
        "message": "Removed from wishlist",
        "wishlist": user.wishlist,
    })))
}
