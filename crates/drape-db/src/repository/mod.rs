//! # Repository Module
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  OrderRecorder / CartService (drape-checkout)                           │
//! │       │                                                                 │
//! │       │  db.orders().insert(&order)                                     │
//! │       ▼                                                                 │
//! │  OrderRepository                       CartRepository                   │
//! │  ├── insert(&self, order)              ├── load(&self, user_id)         │
//! │  ├── get_by_id(&self, id)              ├── save(&self, user_id, cart)   │
//! │  ├── find_by_payment_id(&self, pi)     └── clear(&self, user_id)        │
//! │  ├── list_by_user(&self, user_id)                                       │
//! │  └── update_status(&self, id, ..)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both repositories store line items the same way, so the row type for a
//! stored line lives here.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{DbError, DbResult};
use drape_core::CartLineItem;

pub mod cart;
pub mod order;

/// A line item as stored in `order_items` or `cart_items`.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct LineRow {
    pub item_id: String,
    pub name: String,
    pub price_per_day: String,
    pub rental_days: i64,
    pub size: Option<String>,
}

impl LineRow {
    pub fn into_item(self) -> DbResult<CartLineItem> {
        let price_per_day = Decimal::from_str(&self.price_per_day)
            .map_err(|_| DbError::corrupt("price_per_day", &self.price_per_day))?;

        Ok(CartLineItem {
            item_id: self.item_id,
            name: self.name,
            price_per_day,
            rental_days: self.rental_days,
            size: self.size,
        })
    }
}

/// Converts stored lines, stopping at the first corrupt one.
pub(crate) fn into_items(rows: Vec<LineRow>) -> DbResult<Vec<CartLineItem>> {
    rows.into_iter().map(LineRow::into_item).collect()
}
