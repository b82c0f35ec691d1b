//! # Cart
//!
//! The shopper's cart: rentable line items waiting to be checked out.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Shopper Action           Cart Method              Change               │
//! │  ──────────────           ───────────              ──────               │
//! │                                                                         │
//! │  "Rent" button ─────────► add_item() ────────────► push / replace days  │
//! │                                                                         │
//! │  Change rental length ──► set_rental_days() ─────► items[i].days = n    │
//! │                                                                         │
//! │  Remove ────────────────► remove_item() ─────────► items.remove(i)      │
//! │                                                                         │
//! │  Order recorded ────────► clear() ───────────────► items.clear()        │
//! │                                                                         │
//! │  Checkout ──────────────► snapshot() ────────────► (read only copy)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Line items are unique by (item id, size). Renting the same dress in the
//! same size again replaces the rental length instead of adding a second
//! line; a different size is a different line.
//!
//! Every change bumps the cart's revision, clearing included, so the same
//! lines added again after an order form a new checkout attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CartError, CartResult};
use crate::types::CartLineItem;
use crate::validation::line_item_defect;
use crate::MAX_CART_ITEMS;

/// The shopping cart.
///
/// ## Invariants
/// - Every item passed [`line_item_defect`] when it was added
/// - At most one line per (item id, size)
/// - At most [`MAX_CART_ITEMS`] lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    items: Vec<CartLineItem>,

    /// Incremented on every change.
    #[serde(default)]
    #[ts(type = "number")]
    revision: u64,

    /// When the cart was last changed.
    #[ts(as = "String")]
    updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates a new empty cart.
    pub fn new() -> Self {
        Cart {
            items: Vec::new(),
            revision: 0,
            updated_at: Utc::now(),
        }
    }

    /// Rebuilds a cart from stored items without re-validating them.
    ///
    /// Used by persistence adapters; pricing validates every item again
    /// before anything is charged.
    pub fn from_items(items: Vec<CartLineItem>, revision: u64, updated_at: DateTime<Utc>) -> Self {
        Cart {
            items,
            revision,
            updated_at,
        }
    }

    /// Adds an item, or replaces the rental length if the same item and
    /// size is already in the cart.
    pub fn add_item(&mut self, item: CartLineItem) -> CartResult<()> {
        if let Some(reason) = line_item_defect(&item) {
            return Err(CartError::InvalidItem {
                item_id: item.item_id,
                reason,
            });
        }

        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|i| i.same_slot(&item.item_id, item.size.as_deref()))
        {
            *existing = item;
            self.touch();
            return Ok(());
        }

        if self.items.len() >= MAX_CART_ITEMS {
            return Err(CartError::CartFull {
                max: MAX_CART_ITEMS,
            });
        }

        self.items.push(item);
        self.touch();
        Ok(())
    }

    /// Changes the rental length of one line.
    pub fn set_rental_days(
        &mut self,
        item_id: &str,
        size: Option<&str>,
        rental_days: i64,
    ) -> CartResult<()> {
        let line = self
            .items
            .iter_mut()
            .find(|i| i.same_slot(item_id, size))
            .ok_or_else(|| CartError::ItemNotInCart {
                item_id: item_id.to_string(),
            })?;

        let mut updated = line.clone();
        updated.rental_days = rental_days;
        if let Some(reason) = line_item_defect(&updated) {
            return Err(CartError::InvalidItem {
                item_id: item_id.to_string(),
                reason,
            });
        }

        *line = updated;
        self.touch();
        Ok(())
    }

    /// Removes one line.
    pub fn remove_item(&mut self, item_id: &str, size: Option<&str>) -> CartResult<()> {
        let initial_len = self.items.len();
        self.items.retain(|i| !i.same_slot(item_id, size));

        if self.items.len() == initial_len {
            return Err(CartError::ItemNotInCart {
                item_id: item_id.to_string(),
            });
        }

        self.touch();
        Ok(())
    }

    /// Removes every line.
    pub fn clear(&mut self) {
        self.items.clear();
        self.touch();
    }

    /// The current lines.
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    /// An owned copy of the lines, for pricing and order snapshots.
    pub fn snapshot(&self) -> Vec<CartLineItem> {
        self.items.clone()
    }

    /// Number of lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Change counter; two loads with the same revision hold the same lines.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
        self.updated_at = Utc::now();
    }
}

impl Default for Cart {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn dress(days: i64) -> CartLineItem {
        CartLineItem::new("dress-1", "Silk Dress", Decimal::from(45), days).with_size("M")
    }

    #[test]
    fn test_add_item() {
        let mut cart = Cart::new();
        cart.add_item(dress(2)).unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.items()[0].rental_days, 2);
    }

    #[test]
    fn test_same_item_and_size_replaces_days() {
        let mut cart = Cart::new();
        cart.add_item(dress(2)).unwrap();
        cart.add_item(dress(5)).unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.items()[0].rental_days, 5);
    }

    #[test]
    fn test_different_size_is_new_line() {
        let mut cart = Cart::new();
        cart.add_item(dress(2)).unwrap();
        cart.add_item(dress(2).with_size("L")).unwrap();

        assert_eq!(cart.item_count(), 2);
    }

    #[test]
    fn test_rejects_invalid_item() {
        let mut cart = Cart::new();
        let err = cart.add_item(dress(0)).unwrap_err();

        assert!(matches!(err, CartError::InvalidItem { .. }));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_cart_full() {
        let mut cart = Cart::new();
        for i in 0..MAX_CART_ITEMS {
            cart.add_item(CartLineItem::new(format!("item-{i}"), "Item", Decimal::ONE, 1))
                .unwrap();
        }

        let err = cart
            .add_item(CartLineItem::new("one-more", "Item", Decimal::ONE, 1))
            .unwrap_err();
        assert_eq!(err, CartError::CartFull { max: MAX_CART_ITEMS });
    }

    #[test]
    fn test_set_rental_days() {
        let mut cart = Cart::new();
        cart.add_item(dress(2)).unwrap();

        cart.set_rental_days("dress-1", Some("M"), 7).unwrap();
        assert_eq!(cart.items()[0].rental_days, 7);

        assert!(cart.set_rental_days("dress-1", Some("M"), -1).is_err());
        assert_eq!(cart.items()[0].rental_days, 7);

        assert!(matches!(
            cart.set_rental_days("dress-1", Some("S"), 3),
            Err(CartError::ItemNotInCart { .. })
        ));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::new();
        cart.add_item(dress(2)).unwrap();
        cart.add_item(CartLineItem::new("bag-3", "Clutch", Decimal::from(12), 1))
            .unwrap();

        cart.remove_item("bag-3", None).unwrap();
        assert_eq!(cart.item_count(), 1);
        assert!(cart.remove_item("bag-3", None).is_err());

        cart.clear();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut cart = Cart::new();
        cart.add_item(dress(2)).unwrap();

        let snapshot = cart.snapshot();
        cart.clear();

        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_revision_moves_on_every_change() {
        let mut cart = Cart::new();
        assert_eq!(cart.revision(), 0);

        cart.add_item(dress(2)).unwrap();
        let first = cart.revision();

        cart.clear();
        cart.add_item(dress(2)).unwrap();

        // Same lines as before, but a later revision
        assert_eq!(cart.items(), &[dress(2)]);
        assert!(cart.revision() > first);

        let failed = cart.revision();
        assert!(cart.add_item(dress(0)).is_err());
        assert_eq!(cart.revision(), failed);
    }
}
