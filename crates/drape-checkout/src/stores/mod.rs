//! # Store Ports
//!
//! Where carts and orders live. The checkout only sees these traits.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │                 CartStore                    OrderStore                 │
//! │                     │                            │                      │
//! │          ┌──────────┴──────────┐      ┌──────────┴──────────┐           │
//! │          ▼                     ▼      ▼                     ▼           │
//! │  InMemoryCartStore    SqliteCartStore   InMemoryOrderStore  Sqlite..    │
//! │  (tests, dev)         (drape-db)        (tests, dev)        (drape-db)  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;

use drape_core::{Cart, Order, OrderStatus};

use crate::error::StoreResult;

pub mod memory;
pub mod sqlite;

pub use memory::{InMemoryCartStore, InMemoryOrderStore};
pub use sqlite::{SqliteCartStore, SqliteOrderStore};

/// Per-shopper cart storage.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// The shopper's cart; empty if they have none.
    async fn load(&self, user_id: &str) -> StoreResult<Cart>;

    /// Replaces the shopper's cart.
    async fn save(&self, user_id: &str, cart: &Cart) -> StoreResult<()>;

    /// Empties the shopper's cart.
    async fn clear(&self, user_id: &str) -> StoreResult<()>;
}

/// Durable order storage.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Writes a new order.
    ///
    /// Fails with `StoreError::DuplicatePayment` if an order already
    /// exists for `order.payment_id`.
    async fn save(&self, order: &Order) -> StoreResult<()>;

    async fn get(&self, order_id: &str) -> StoreResult<Option<Order>>;

    /// A shopper's orders, newest first.
    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Order>>;

    async fn find_by_payment_id(&self, payment_id: &str) -> StoreResult<Option<Order>>;

    /// Moves an order to `next` and returns it.
    ///
    /// Fails with `StoreError::InvalidTransition` for an edge the order
    /// lifecycle doesn't have, and `StoreError::NotFound` for an unknown id.
    async fn update_status(&self, order_id: &str, next: OrderStatus) -> StoreResult<Order>;
}
