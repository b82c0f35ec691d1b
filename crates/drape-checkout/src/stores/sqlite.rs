//! SQLite-backed stores over `drape-db` repositories.

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use drape_core::{Cart, Order, OrderStatus};
use drape_db::Database;

use super::{CartStore, OrderStore};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct SqliteCartStore {
    db: Database,
}

impl SqliteCartStore {
    pub fn new(db: Database) -> Self {
        SqliteCartStore { db }
    }
}

#[async_trait]
impl CartStore for SqliteCartStore {
    async fn load(&self, user_id: &str) -> StoreResult<Cart> {
        Ok(self.db.carts().load(user_id).await?.unwrap_or_default())
    }

    async fn save(&self, user_id: &str, cart: &Cart) -> StoreResult<()> {
        Ok(self.db.carts().save(user_id, cart).await?)
    }

    async fn clear(&self, user_id: &str) -> StoreResult<()> {
        Ok(self.db.carts().clear(user_id).await?)
    }
}

#[derive(Debug, Clone)]
pub struct SqliteOrderStore {
    db: Database,
}

impl SqliteOrderStore {
    pub fn new(db: Database) -> Self {
        SqliteOrderStore { db }
    }
}

#[async_trait]
impl OrderStore for SqliteOrderStore {
    async fn save(&self, order: &Order) -> StoreResult<()> {
        Ok(self.db.orders().insert(order).await?)
    }

    async fn get(&self, order_id: &str) -> StoreResult<Option<Order>> {
        Ok(self.db.orders().get_by_id(order_id).await?)
    }

    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Order>> {
        Ok(self.db.orders().list_by_user(user_id).await?)
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> StoreResult<Option<Order>> {
        Ok(self.db.orders().find_by_payment_id(payment_id).await?)
    }

    async fn update_status(&self, order_id: &str, next: OrderStatus) -> StoreResult<Order> {
        let repo = self.db.orders();

        let mut order = repo
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            })?;

        let from = order.status;
        order.transition_to(next, Utc::now())?;

        // Conditional on `from`: a concurrent transition makes this NotFound
        repo.update_status(order_id, from, next, order.updated_at)
            .await?;

        debug!(order_id, %from, to = %next, "Order status updated");
        Ok(order)
    }
}
