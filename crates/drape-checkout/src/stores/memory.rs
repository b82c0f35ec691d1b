//! In-memory stores for tests and local development.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use drape_core::{Cart, Order, OrderStatus};

use super::{CartStore, OrderStore};
use crate::error::{StoreError, StoreResult};

/// Carts in a map keyed by user id. Clones share the map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartStore {
    carts: Arc<Mutex<HashMap<String, Cart>>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn load(&self, user_id: &str) -> StoreResult<Cart> {
        Ok(self
            .carts
            .lock()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, user_id: &str, cart: &Cart) -> StoreResult<()> {
        self.carts
            .lock()
            .await
            .insert(user_id.to_string(), cart.clone());
        Ok(())
    }

    async fn clear(&self, user_id: &str) -> StoreResult<()> {
        if let Some(cart) = self.carts.lock().await.get_mut(user_id) {
            cart.clear();
        }
        Ok(())
    }
}

/// Orders in insertion order. Clones share the list.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<Mutex<Vec<Order>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.lock().await.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn save(&self, order: &Order) -> StoreResult<()> {
        let mut orders = self.orders.lock().await;

        if orders.iter().any(|o| o.payment_id == order.payment_id) {
            return Err(StoreError::DuplicatePayment {
                payment_id: order.payment_id.clone(),
            });
        }
        if orders.iter().any(|o| o.id == order.id) {
            return Err(StoreError::Backend(format!("order id {} already used", order.id)));
        }

        orders.push(order.clone());
        Ok(())
    }

    async fn get(&self, order_id: &str) -> StoreResult<Option<Order>> {
        Ok(self
            .orders
            .lock()
            .await
            .iter()
            .find(|o| o.id == order_id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Order>> {
        let orders = self.orders.lock().await;
        // Reverse first so equal timestamps keep newest-inserted first
        let mut mine: Vec<Order> = orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mine)
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> StoreResult<Option<Order>> {
        Ok(self
            .orders
            .lock()
            .await
            .iter()
            .find(|o| o.payment_id == payment_id)
            .cloned())
    }

    async fn update_status(&self, order_id: &str, next: OrderStatus) -> StoreResult<Order> {
        let mut orders = self.orders.lock().await;
        let order = orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            })?;

        order.transition_to(next, Utc::now())?;
        Ok(order.clone())
    }
}
