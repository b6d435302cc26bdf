//! Product catalog route handlers.
//!
//! Reads are public. Creating, replacing and deleting products needs an
//! administrator.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Serialize;
use tracing::instrument;

use shoplane_core::{Category, ProductId};

use crate::db::RepositoryError;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{OptionalAuth, RequireAdmin};
use crate::models::{Product, ProductInput, ProductListParams, ProductQuery, ProductView};
use crate::routes::auth::MessageResponse;
use crate::routes::parse_id;
use crate::state::AppState;
use crate::validation::ValidJson;

/// Pagination block of a listing response.
#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u64,
}

/// Product listing response.
#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<ProductView>,
    pub pagination: Pagination,
}

/// Product page response.
#[derive(Debug, Serialize)]
pub struct ProductDetailResponse {
    pub product: ProductView,
    pub related: Vec<ProductView>,
}

/// Response to creating or replacing a product.
#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub message: &'static str,
    pub product: ProductView,
}

/// Categories response.
#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<Category>,
}

fn product_missing(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::not_found("Product"),
        other => other.into(),
    }
}

/// GET /api/products
#[instrument(skip(state, viewer, params))]
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Query(params): Query<ProductListParams>,
) -> Result<Json<ProductListResponse>> {
    let query = ProductQuery::from_params(params).map_err(AppError::Validation)?;
    let (products, total) = state.db().products().list(&query).await?;

    tracing::debug!(
        viewer = ?viewer.map(|u| u.id),
        total,
        page = query.page,
        "Product listing"
    );

    Ok(Json(ProductListResponse {
        products: products.into_iter().map(Product::into_view).collect(),
        pagination: Pagination {
            total,
            page: query.page,
            limit: query.limit,
            pages: query.pages(total),
        },
    }))
}

/// GET /api/products/{id}
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductDetailResponse>> {
    let id: ProductId = parse_id(&id, "Product")?;
    let repo = state.db().products();
    let product = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    let related = repo.related(&product).await?;

    Ok(Json(ProductDetailResponse {
        product: product.into_view(),
        related: related.into_iter().map(Product::into_view).collect(),
    }))
}

/// GET /api/products/meta/categories
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<CategoriesResponse>> {
    let categories = state.db().products().categories().await?;
    Ok(Json(CategoriesResponse { categories }))
}

/// POST /api/products
#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ValidJson(input): ValidJson<ProductInput>,
) -> Result<(StatusCode, Json<ProductResponse>)> {
    let new = input.into_new().map_err(AppError::Validation)?;
    let product = state.db().products().create(new).await?;

    let id = product.id.to_string();
    add_breadcrumb("catalog", "Product created", &[("product_id", &id)]);
    tracing::info!(product_id = %product.id, "Product created");

    Ok((
        StatusCode::CREATED,
        Json(ProductResponse {
            message: "Product created",
            product: product.into_view(),
        }),
    ))
}

/// PUT /api/products/{id}
#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    ValidJson(input): ValidJson<ProductInput>,
) -> Result<Json<ProductResponse>> {
    let id: ProductId = parse_id(&id, "Product")?;
    let new = input.into_new().map_err(AppError::Validation)?;
    let product = state
        .db()
        .products()
        .update(id, new)
        .await
        .map_err(product_missing)?;

    tracing::info!(product_id = %product.id, "Product updated");
    Ok(Json(ProductResponse {
        message: "Product updated",
        product: product.into_view(),
    }))
}

/// DELETE /api/products/{id}
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn destroy(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let id: ProductId = parse_id(&id, "Product")?;
    state
        .db()
        .products()
        .delete(id)
        .await
        .map_err(product_missing)?;

    tracing::info!(product_id = %id, "Product deleted");
    Ok(Json(MessageResponse {
        message: "Product deleted",
    }))
}
