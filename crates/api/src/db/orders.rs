//! Order repository.
//!
//! Lines and the shipping address are written once, as JSONB snapshots.
//! Status changes go through [`OrderRepository::update_with`], which locks the
//! row while the change is applied.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;

use shoplane_core::{
    Order, OrderDraft, OrderId, OrderLine, OrderStatus, PaymentMethod, PaymentStatus,
    PriceBreakdown, ShippingAddress, UserId,
};

use super::{Database, RepositoryError, stored};

const ORDER_COLUMNS: &str = "id, user_id, items, shipping_address, payment_method, \
     payment_status, subtotal, item_count, shipping, tax, discount, total, status, \
     tracking_number, estimated_delivery, delivered_at, cancelled_at, cancel_reason, notes, \
     created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    items: Json<Vec<OrderLine>>,
    shipping_address: Json<ShippingAddress>,
    payment_method: String,
    payment_status: String,
    subtotal: Decimal,
    item_count: i32,
    shipping: Decimal,
    tax: Decimal,
    discount: Decimal,
    total: Decimal,
    status: String,
    tracking_number: Option<String>,
    estimated_delivery: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn corrupt<E: std::fmt::Display>(column: &str) -> impl FnOnce(E) -> RepositoryError + '_ {
    move |e| RepositoryError::DataCorruption(format!("invalid {column} in database: {e}"))
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderId::new(r.id),
            user_id: UserId::new(r.user_id),
            items: r.items.0,
            shipping_address: r.shipping_address.0,
            payment_method: r
                .payment_method
                .parse::<PaymentMethod>()
                .map_err(corrupt("payment method"))?,
            payment_status: r
                .payment_status
                .parse::<PaymentStatus>()
                .map_err(corrupt("payment status"))?,
            pricing: PriceBreakdown {
                subtotal: r.subtotal,
                item_count: stored(r.item_count, "item_count")?,
                shipping: r.shipping,
                tax: r.tax,
                discount: r.discount,
                total: r.total,
            },
            status: r.status.parse::<OrderStatus>().map_err(corrupt("status"))?,
            tracking_number: r.tracking_number,
            estimated_delivery: r.estimated_delivery,
            delivered_at: r.delivered_at,
            cancelled_at: r.cancelled_at,
            cancel_reason: r.cancel_reason,
            notes: r.notes,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Repository for placed orders.
pub struct OrderRepository<'a> {
    db: &'a Database,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Store a new order in `pending`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, draft: OrderDraft) -> Result<Order, RepositoryError> {
        match self.db {
            Database::Postgres(pool) => {
                let sql = format!(
                    r#"INSERT INTO shop."order" (user_id, items, shipping_address, payment_method,
                           subtotal, item_count, shipping, tax, discount, total,
                           estimated_delivery, notes)
                       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                       RETURNING {ORDER_COLUMNS}"#
                );
                let pricing = draft.pricing;
                let item_count: i32 = stored(pricing.item_count, "item_count")?;
                let row = sqlx::query_as::<_, OrderRow>(&sql)
                    .bind(draft.user_id)
                    .bind(Json(&draft.items))
                    .bind(Json(&draft.shipping_address))
                    .bind(draft.payment_method.as_str())
                    .bind(pricing.subtotal)
                    .bind(item_count)
                    .bind(pricing.shipping)
                    .bind(pricing.tax)
                    .bind(pricing.discount)
                    .bind(pricing.total)
                    .bind(draft.estimated_delivery)
                    .bind(&draft.notes)
                    .fetch_one(pool)
                    .await?;
                Order::try_from(row)
            }
            Database::Memory(store) => {
                let mut data = store.write().await;
                let order = Order::from_draft(data.next_order_id(), draft, Utc::now());
                data.orders.insert(order.id, order.clone());
                Ok(order)
            }
        }
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        match self.db {
            Database::Postgres(pool) => {
                let sql = format!(
                    r#"SELECT {ORDER_COLUMNS} FROM shop."order"
                       WHERE user_id = $1
                       ORDER BY created_at DESC, id DESC"#
                );
                sqlx::query_as::<_, OrderRow>(&sql)
                    .bind(user_id)
                    .fetch_all(pool)
                    .await?
                    .into_iter()
                    .map(Order::try_from)
                    .collect()
            }
            Database::Memory(store) => {
                let data = store.read().await;
                let mut orders: Vec<Order> = data
                    .orders
                    .values()
                    .filter(|o| o.user_id == user_id)
                    .cloned()
                    .collect();
                orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
                Ok(orders)
            }
        }
    }

    /// Get an order by ID, optionally restricted to one owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        id: OrderId,
        owner: Option<UserId>,
    ) -> Result<Option<Order>, RepositoryError> {
        match self.db {
            Database::Postgres(pool) => {
                let sql = format!(
                    r#"SELECT {ORDER_COLUMNS} FROM shop."order"
                       WHERE id = $1 AND ($2::INTEGER IS NULL OR user_id = $2)"#
                );
                sqlx::query_as::<_, OrderRow>(&sql)
                    .bind(id)
                    .bind(owner)
                    .fetch_optional(pool)
                    .await?
                    .map(Order::try_from)
                    .transpose()
            }
            Database::Memory(store) => Ok(store
                .read()
                .await
                .orders
                .get(&id)
                .filter(|o| owner.is_none_or(|u| o.user_id == u))
                .cloned()),
        }
    }

    /// Apply `change` to an order and save its status fields.
    ///
    /// Returns `Ok(None)` if the order does not exist or belongs to someone
    /// other than `owner`. Nothing is written if `change` fails.
    ///
    /// # Errors
    ///
    /// Returns the error from `change`, or a repository error.
    pub async fn update_with<F, E>(
        &self,
        id: OrderId,
        owner: Option<UserId>,
        change: F,
    ) -> Result<Option<Order>, E>
    where
        F: FnOnce(&mut Order) -> Result<(), E>,
        E: From<RepositoryError>,
    {
        match self.db {
            Database::Postgres(pool) => {
                let mut tx = pool.begin().await.map_err(RepositoryError::from)?;

                let sql = format!(
                    r#"SELECT {ORDER_COLUMNS} FROM shop."order"
                       WHERE id = $1 AND ($2::INTEGER IS NULL OR user_id = $2)
                       FOR UPDATE"#
                );
                let Some(row) = sqlx::query_as::<_, OrderRow>(&sql)
                    .bind(id)
                    .bind(owner)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(RepositoryError::from)?
                else {
                    return Ok(None);
                };

                let mut order = Order::try_from(row)?;
                change(&mut order)?;

                sqlx::query(
                    r#"
                    UPDATE shop."order"
                    SET status = $2, payment_status = $3, tracking_number = $4,
                        delivered_at = $5, cancelled_at = $6, cancel_reason = $7,
                        updated_at = $8
                    WHERE id = $1
                    "#,
                )
                .bind(order.id)
                .bind(order.status.as_str())
                .bind(order.payment_status.as_str())
                .bind(&order.tracking_number)
                .bind(order.delivered_at)
                .bind(order.cancelled_at)
                .bind(&order.cancel_reason)
                .bind(order.updated_at)
                .execute(&mut *tx)
                .await
                .map_err(RepositoryError::from)?;

                tx.commit().await.map_err(RepositoryError::from)?;
                Ok(Some(order))
            }
            Database::Memory(store) => {
                let mut data = store.write().await;
                let Some(existing) = data
                    .orders
                    .get_mut(&id)
                    .filter(|o| owner.is_none_or(|u| o.user_id == u))
                else {
                    return Ok(None);
                };

                let mut order = existing.clone();
                change(&mut order)?;
                *existing = order.clone();
                Ok(Some(order))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shoplane_core::order::default_country;
    use shoplane_core::{OrderError, PricingPolicy, ProductId};

    use super::*;
    use crate::db::MemoryStore;

    #[derive(Debug)]
    enum TestError {
        Order(OrderError),
        Repository(RepositoryError),
    }

    impl From<RepositoryError> for TestError {
        fn from(err: RepositoryError) -> Self {
            Self::Repository(err)
        }
    }

    fn draft(user: i32) -> OrderDraft {
        let line = OrderLine {
            product_id: ProductId::new(1),
            title: "Kindle".to_owned(),
            price: "99.99".parse().unwrap(),
            image: "k.jpg".to_owned(),
            quantity: 1,
        };
        let address = ShippingAddress {
            name: "Asha Rao".to_owned(),
            street: "12 MG Road".to_owned(),
            city: "Bengaluru".to_owned(),
            state: "KA".to_owned(),
            postal_code: "560001".to_owned(),
            country: default_country(),
            phone: None,
        };
        OrderDraft::new(
            UserId::new(user),
            vec![line],
            address,
            PaymentMethod::Card,
            None,
            &PricingPolicy::default(),
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_orders_are_scoped_to_owner() {
        let db = Database::memory(MemoryStore::new());
        let order = db.orders().create(draft(1)).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);

        let orders = db.orders();
        assert!(orders.get(order.id, Some(UserId::new(1))).await.unwrap().is_some());
        assert!(orders.get(order.id, Some(UserId::new(2))).await.unwrap().is_none());
        assert!(orders.get(order.id, None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let db = Database::memory(MemoryStore::new());
        let first = db.orders().create(draft(1)).await.unwrap();
        let second = db.orders().create(draft(1)).await.unwrap();
        db.orders().create(draft(2)).await.unwrap();

        let ids: Vec<_> = db
            .orders()
            .list_for_user(UserId::new(1))
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_update_with_applies_and_rejects() {
        let db = Database::memory(MemoryStore::new());
        let order = db.orders().create(draft(1)).await.unwrap();
        let cancel = |o: &mut Order| o.cancel(None, Utc::now()).map_err(TestError::Order);

        let cancelled = db
            .orders()
            .update_with(order.id, Some(UserId::new(1)), cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let err = db
            .orders()
            .update_with(order.id, Some(UserId::new(1)), cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TestError::Order(OrderError::NotCancellable { .. })
        ));

        let other = db
            .orders()
            .update_with(order.id, Some(UserId::new(2)), cancel)
            .await
            .unwrap();
        assert!(other.is_none());
    }
}
