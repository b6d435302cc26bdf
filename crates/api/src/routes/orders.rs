//! Order route handlers.
//!
//! Orders are priced from catalog snapshots taken at placement. Customers
//! only ever see their own orders: anyone else's order is reported missing.

use std::collections::HashMap;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use shoplane_core::order::DELIVERY_ESTIMATE;
use shoplane_core::{
    Order, OrderDraft, OrderId, OrderLine, OrderStatus, OrderSummary, PaymentMethod, ProductId,
    UserId,
};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::{AddressInput, Product};
use crate::routes::cart::{catalog_line, check_product_id, check_quantity, to_product_id, to_quantity};
use crate::routes::parse_id;
use crate::state::AppState;
use crate::validation::{FieldError, Validate, ValidJson, Validator};

/// Longest accepted order note or cancellation reason.
pub const MAX_NOTE_LENGTH: usize = 500;

// =============================================================================
// Request Types
// =============================================================================

/// One explicitly ordered line.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: Option<i64>,
    pub quantity: Option<i64>,
}

/// Order placement request body.
///
/// Without `items`, the user's cart is ordered.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: Option<AddressInput>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

fn check_note(v: &mut Validator, field: &str, note: Option<&str>) {
    v.check(
        note.is_none_or(|n| n.trim().chars().count() <= MAX_NOTE_LENGTH),
        field,
        "Cannot exceed 500 characters",
    );
}

impl Validate for CreateOrderRequest {
    fn validate(&self) -> std::result::Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        for (i, item) in self.items.iter().enumerate() {
            check_product_id(&mut v, &format!("items[{i}].productId"), item.product_id);
            check_quantity(&mut v, &format!("items[{i}].quantity"), item.quantity);
        }
        match &self.shipping_address {
            Some(address) => address.check(&mut v, "shippingAddress."),
            None => {
                v.error("shippingAddress", "Shipping address is required");
            }
        }
        if let Some(method) = &self.payment_method {
            v.check(
                method.parse::<PaymentMethod>().is_ok(),
                "paymentMethod",
                "Invalid payment method",
            );
        }
        check_note(&mut v, "notes", self.notes.as_deref());
        v.finish()
    }
}

/// Cancellation request body.
#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

impl Validate for CancelRequest {
    fn validate(&self) -> std::result::Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        check_note(&mut v, "reason", self.reason.as_deref());
        v.finish()
    }
}

/// Administrative status change request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    #[serde(default)]
    pub status: String,
    pub tracking_number: Option<String>,
}

impl Validate for StatusRequest {
    fn validate(&self) -> std::result::Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        v.check(
            self.status.parse::<OrderStatus>().is_ok(),
            "status",
            "Invalid order status",
        );
        if let Some(tracking) = &self.tracking_number {
            let len = tracking.trim().chars().count();
            v.check(
                (1..=100).contains(&len),
                "trackingNumber",
                "Tracking number must be 1-100 characters",
            );
        }
        v.finish()
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Order confirmation returned on placement.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub id: OrderId,
    pub status: OrderStatus,
    pub total: Decimal,
    pub estimated_delivery: &'static str,
}

/// Placement response.
#[derive(Debug, Serialize)]
pub struct PlacedResponse {
    pub message: &'static str,
    pub order: PlacedOrder,
}

/// Order history response.
#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<OrderSummary>,
}

/// Full order response.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order: Order,
}

/// Order change response.
#[derive(Debug, Serialize)]
pub struct OrderChangeResponse {
    pub message: &'static str,
    pub order: Order,
}

// =============================================================================
// Helpers
// =============================================================================

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

/// Price explicitly requested lines from the current catalog.
async fn catalog_lines(state: &AppState, items: &[OrderItemRequest]) -> Result<Vec<OrderLine>> {
    let requested: Vec<(ProductId, u32)> = items
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

    requested
        .into_iter()
        .map(|(id, quantity)| {
            let product = catalog
                .get(&id)
                .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))?;
            Ok(OrderLine::from(catalog_line(product, quantity)?))
        })
        .collect()
}

/// Drop ordered lines from the cart after a cart checkout.
///
/// The order already exists at this point, so a failure is logged rather
/// than reported: a retry would place the order twice.
async fn clear_ordered(state: &AppState, user_id: UserId, ordered: &[OrderLine]) {
    let result = state
        .db()
        .carts()
        .update(user_id, |cart| {
            for line in ordered {
                // Lines removed concurrently are already gone.
                let _ = cart.remove(line.product_id);
            }
            Ok::<_, AppError>(())
        })
        .await;
    if let Err(e) = result {
        tracing::error!(user_id = %user_id, error = %e, "Failed to clear cart after order");
    }
}

fn missing_order() -> AppError {
    AppError::not_found("Order")
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/orders
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidJson(req): ValidJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<PlacedResponse>)> {
    let from_cart = req.items.is_empty();
    let items = if from_cart {
        let stored = state.db().carts().get(user.id).await?;
        stored.cart.items.into_iter().map(OrderLine::from).collect()
    } else {
        catalog_lines(&state, &req.items).await?
    };

    let payment_method = req
        .payment_method
        .as_deref()
        .map(str::parse::<PaymentMethod>)
        .transpose()
        .map_err(|_| AppError::BadRequest("Invalid payment method".to_owned()))?
        .unwrap_or_default();
    let shipping_address = req
        .shipping_address
        .ok_or_else(|| AppError::BadRequest("Shipping address is required".to_owned()))?
        .into_shipping();

    let draft = OrderDraft::new(
        user.id,
        items,
        shipping_address,
        payment_method,
        trimmed(req.notes),
        state.pricing(),
        Utc::now(),
    )?;
    let order = state.db().orders().create(draft).await?;

    if from_cart {
        clear_ordered(&state, user.id, &order.items).await;
    }

    let id = order.id.to_string();
    add_breadcrumb("order", "Order placed", &[("order_id", &id)]);
    tracing::info!(order_id = %order.id, total = %order.pricing.total, "Order placed");

    Ok((
        StatusCode::CREATED,
        Json(PlacedResponse {
            message: "Order placed successfully",
            order: PlacedOrder {
                id: order.id,
                status: order.status,
                total: order.pricing.total,
                estimated_delivery: DELIVERY_ESTIMATE,
            },
        }),
    ))
}

/// GET /api/orders
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<OrdersResponse>> {
    let orders = state.db().orders().list_for_user(user.id).await?;
    Ok(Json(OrdersResponse {
        orders: orders.iter().map(Order::summary).collect(),
    }))
}

/// GET /api/orders/{id}
#[instrument(skip_all, fields(user_id = %user.id, order_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>> {
    let id: OrderId = parse_id(&id, "Order")?;
    let order = state
        .db()
        .orders()
        .get(id, Some(user.id))
        .await?
        .ok_or_else(missing_order)?;
    Ok(Json(OrderResponse { order }))
}

/// POST /api/orders/{id}/cancel
#[instrument(skip_all, fields(user_id = %user.id, order_id = %id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<OrderChangeResponse>> {
    let id: OrderId = parse_id(&id, "Order")?;
    // The body is optional here, unlike every other JSON route.
    let req: CancelRequest = if body.is_empty() {
        CancelRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?
    };
    req.validate().map_err(AppError::Validation)?;
    let reason = trimmed(req.reason);

    let order = state
        .db()
        .orders()
        .update_with(id, Some(user.id), |order| {
            order.cancel(reason, Utc::now()).map_err(AppError::from)
        })
        .await?
        .ok_or_else(missing_order)?;

    tracing::info!(order_id = %order.id, "Order cancelled");
    Ok(Json(OrderChangeResponse {
        message: "Order cancelled successfully",
        order,
    }))
}

/// PATCH /api/orders/{id}/status
#[instrument(skip_all, fields(admin_id = %admin.id, order_id = %id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<StatusRequest>,
) -> Result<Json<OrderChangeResponse>> {
    let id: OrderId = parse_id(&id, "Order")?;
    let target: OrderStatus = req
        .status
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid order status".to_owned()))?;
    let tracking_number = trimmed(req.tracking_number);

    let order = state
        .db()
        .orders()
        .update_with(id, None, |order| {
            order
                .advance(target, tracking_number, Utc::now())
                .map_err(AppError::from)
        })
        .await?
        .ok_or_else(missing_order)?;

    tracing::info!(order_id = %order.id, status = %order.status, "Order status changed");
    Ok(Json(OrderChangeResponse {
        message: "Order status updated",
        order,
    }))
}
