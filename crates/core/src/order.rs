//! Orders and their lifecycle.
//!
//! An [`Order`] is a priced snapshot taken at checkout. Lines and the shipping
//! address never change after placement. Only the fulfillment and payment
//! state moves, through [`Order::cancel`] and [`Order::advance`].

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::{CartLine, MAX_LINE_QUANTITY};
use crate::pricing::{PriceBreakdown, PricingPolicy};
use crate::types::{
    MAX_MONEY, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId,
};

/// Days from placement to the estimated delivery date.
pub const ESTIMATED_DELIVERY_DAYS: i64 = 5;

/// Human-readable delivery estimate shown after checkout.
pub const DELIVERY_ESTIMATE: &str = "3-5 business days";

/// Errors from order rules.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// Checkout with nothing to buy.
    #[error("Order must have items")]
    NoItems,
    /// A line quantity outside `1..=MAX_LINE_QUANTITY`.
    #[error("Quantity must be between 1 and {max}", max = MAX_LINE_QUANTITY)]
    InvalidQuantity,
    /// A total the order ledger cannot record.
    #[error("Order total exceeds {max}", max = MAX_MONEY)]
    TotalTooLarge,
    /// Cancellation after the order left `pending`.
    #[error("Only pending orders can be cancelled")]
    NotCancellable {
        /// Status at the time of the attempt.
        status: OrderStatus,
    },
    /// A status change outside the allowed lifecycle.
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },
}

/// Delivery address captured on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Country used when an address omits one.
#[must_use]
pub fn default_country() -> String {
    "India".to_owned()
}

/// One purchased product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub title: String,
    pub price: Decimal,
    pub image: String,
    pub quantity: u32,
}

impl From<CartLine> for OrderLine {
    fn from(line: CartLine) -> Self {
        Self {
            product_id: line.product_id,
            title: line.title,
            price: line.price,
            image: line.image,
            quantity: line.quantity,
        }
    }
}

/// A priced order that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub user_id: UserId,
    pub items: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub pricing: PriceBreakdown,
    pub notes: Option<String>,
    pub estimated_delivery: DateTime<Utc>,
}

impl OrderDraft {
    /// Price `items` and build a draft placed at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::NoItems`] for an empty list,
    /// [`OrderError::InvalidQuantity`] if any line quantity is out of range and
    /// [`OrderError::TotalTooLarge`] if the total exceeds [`MAX_MONEY`].
    pub fn new(
        user_id: UserId,
        items: Vec<OrderLine>,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
        notes: Option<String>,
        policy: &PricingPolicy,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }
        if items
            .iter()
            .any(|l| l.quantity == 0 || l.quantity > MAX_LINE_QUANTITY)
        {
            return Err(OrderError::InvalidQuantity);
        }

        let pricing = policy.quote(items.iter().map(|l| (l.price, l.quantity)), Decimal::ZERO);
        if pricing.total > MAX_MONEY {
            return Err(OrderError::TotalTooLarge);
        }

        Ok(Self {
            user_id,
            items,
            shipping_address,
            payment_method,
            pricing,
            notes,
            estimated_delivery: now + Duration::days(ESTIMATED_DELIVERY_DAYS),
        })
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub pricing: PriceBreakdown,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub estimated_delivery: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compact listing entry for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: OrderId,
    pub status: OrderStatus,
    pub total: Decimal,
    pub item_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Materialize a draft under the id the store assigned.
    #[must_use]
    pub fn from_draft(id: OrderId, draft: OrderDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: draft.user_id,
            items: draft.items,
            shipping_address: draft.shipping_address,
            payment_method: draft.payment_method,
            payment_status: PaymentStatus::Pending,
            pricing: draft.pricing,
            status: OrderStatus::Pending,
            tracking_number: None,
            estimated_delivery: draft.estimated_delivery,
            delivered_at: None,
            cancelled_at: None,
            cancel_reason: None,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |count, l| count.saturating_add(l.quantity))
    }

    /// Listing entry for this order.
    #[must_use]
    pub fn summary(&self) -> OrderSummary {
        OrderSummary {
            id: self.id,
            status: self.status,
            total: self.pricing.total,
            item_count: self.item_count(),
            created_at: self.created_at,
        }
    }

    /// Cancel a pending order. A captured payment is marked refunded.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::NotCancellable`] unless the order is `pending`.
    pub fn cancel(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.status.is_cancellable() {
            return Err(OrderError::NotCancellable {
                status: self.status,
            });
        }

        self.status = OrderStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancel_reason = reason;
        if self.payment_status == PaymentStatus::Paid {
            self.payment_status = PaymentStatus::Refunded;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Move the order one step along its fulfillment path.
    ///
    /// Delivery stamps `delivered_at` and settles cash-on-delivery payments.
    /// A return refunds a paid order. A supplied tracking number replaces the
    /// stored one.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] for any move other than one
    /// step forward or `delivered -> returned`.
    pub fn advance(
        &mut self,
        target: OrderStatus,
        tracking_number: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if !self.status.can_transition_to(target) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }

        match target {
            OrderStatus::Delivered => {
                self.delivered_at = Some(now);
                if self.payment_method == PaymentMethod::Cod {
                    self.payment_status = PaymentStatus::Paid;
                }
            }
            OrderStatus::Returned if self.payment_status == PaymentStatus::Paid => {
                self.payment_status = PaymentStatus::Refunded;
            }
            _ => {}
        }

        if tracking_number.is_some() {
            self.tracking_number = tracking_number;
        }
        self.status = target;
        self.updated_at = now;
        Ok(())
    }
}
