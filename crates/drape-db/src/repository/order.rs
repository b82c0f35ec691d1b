//! # Order Repository
//!
//! Database operations for paid orders and their item snapshots.
//!
//! ## Order Write
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    insert(order)                                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. INSERT INTO orders (... payment_id UNIQUE ...)              │   │
//! │  │                                                                 │   │
//! │  │  2. INSERT INTO order_items  × N   (frozen cart snapshot)       │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← an order never exists without its items                       │
//! │                                                                         │
//! │  Second insert for the same payment_id → DbError::UniqueViolation       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use super::{into_items, LineRow};
use crate::error::{DbError, DbResult};
use drape_core::{Money, Order, OrderStatus, PaymentStatus, ShippingDetails};

const ORDER_COLUMNS: &str = r#"
    id, user_id,
    subtotal_cents, insurance_cents, tax_cents, total_cents, currency,
    status, payment_status, payment_id,
    ship_name, ship_email, ship_address, ship_city, ship_state, ship_zip, ship_phone,
    created_at, updated_at
"#;

/// An `orders` row before its items are attached.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    user_id: String,
    subtotal_cents: i64,
    insurance_cents: i64,
    tax_cents: i64,
    total_cents: i64,
    currency: String,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_id: String,
    ship_name: String,
    ship_email: String,
    ship_address: String,
    ship_city: String,
    ship_state: String,
    ship_zip: String,
    ship_phone: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<drape_core::CartLineItem>) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            items,
            subtotal: Money::from_cents(self.subtotal_cents),
            insurance_deposit: Money::from_cents(self.insurance_cents),
            tax: Money::from_cents(self.tax_cents),
            total: Money::from_cents(self.total_cents),
            currency: self.currency,
            status: self.status,
            payment_status: self.payment_status,
            payment_id: self.payment_id,
            shipping: ShippingDetails {
                name: self.ship_name,
                email: self.ship_email,
                address: self.ship_address,
                city: self.ship_city,
                state: self.ship_state,
                zip: self.ship_zip,
                phone: self.ship_phone,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Repository for order database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.orders();
///
/// repo.insert(&order).await?;
/// let again = repo.find_by_payment_id(&order.payment_id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Inserts an order and its items atomically.
    ///
    /// ## Errors
    /// - [`DbError::UniqueViolation`] if an order already exists for the
    ///   payment id (or the order id)
    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        debug!(
            order_id = %order.id,
            payment_id = %order.payment_id,
            items = order.items.len(),
            "Inserting order"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id,
                subtotal_cents, insurance_cents, tax_cents, total_cents, currency,
                status, payment_status, payment_id,
                ship_name, ship_email, ship_address, ship_city, ship_state, ship_zip, ship_phone,
                created_at, updated_at
            ) VALUES (
                ?1, ?2,
                ?3, ?4, ?5, ?6, ?7,
                ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                ?18, ?19
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(order.subtotal.cents())
        .bind(order.insurance_deposit.cents())
        .bind(order.tax.cents())
        .bind(order.total.cents())
        .bind(&order.currency)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(&order.payment_id)
        .bind(&order.shipping.name)
        .bind(&order.shipping.email)
        .bind(&order.shipping.address)
        .bind(&order.shipping.city)
        .bind(&order.shipping.state)
        .bind(&order.shipping.zip)
        .bind(&order.shipping.phone)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } if field.ends_with("payment_id") => {
                DbError::UniqueViolation {
                    field,
                    value: order.payment_id.clone(),
                }
            }
            other => other,
        })?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id, position, item_id, name, price_per_day, rental_days, size
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&order.id)
            .bind(position as i64)
            .bind(&item.item_id)
            .bind(&item.name)
            .bind(item.price_per_day.to_string())
            .bind(item.rental_days)
            .bind(&item.size)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    /// Gets an order by our id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        self.with_items(row).await
    }

    /// Gets the order recorded for a processor payment id.
    pub async fn find_by_payment_id(&self, payment_id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE payment_id = ?1");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await?;

        self.with_items(row).await
    }

    /// A shopper's orders, newest first.
    pub async fn list_by_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 \
             ORDER BY created_at DESC, rowid DESC"
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.get_items(&row.id).await?;
            orders.push(row.into_order(items));
        }

        Ok(orders)
    }

    /// Moves an order from `from` to `to`.
    ///
    /// The update only applies if the order is still in `from`, so two
    /// concurrent transitions cannot both win. Whether `from → to` is a
    /// legal edge is the caller's decision.
    ///
    /// ## Errors
    /// - [`DbError::NotFound`] if no order with `id` is in `from`
    pub async fn update_status(
        &self,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(order_id = %id, %from, %to, "Updating order status");

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = ?3,
                updated_at = ?4
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("Order ({from})"), id));
        }

        Ok(())
    }

    async fn get_items(&self, order_id: &str) -> DbResult<Vec<drape_core::CartLineItem>> {
        let rows: Vec<LineRow> = sqlx::query_as(
            r#"
            SELECT item_id, name, price_per_day, rental_days, size
            FROM order_items
            WHERE order_id = ?1
            ORDER BY position
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        into_items(rows)
    }

    async fn with_items(&self, row: Option<OrderRow>) -> DbResult<Option<Order>> {
        match row {
            Some(row) => {
                let items = self.get_items(&row.id).await?;
                Ok(Some(row.into_order(items)))
            }
            None => Ok(None),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
