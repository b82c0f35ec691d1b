//! # Domain Types
//!
//! Core domain types used throughout Drape checkout.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  CartLineItem   │   │PricingBreakdown │   │ PaymentIntent   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  item_id        │   │  subtotal       │   │  intent_id      │       │
//! │  │  price_per_day  │──►│  insurance      │──►│  client_secret  │       │
//! │  │  rental_days    │   │  tax            │   │  amount         │       │
//! │  │  size           │   │  total          │   │  currency       │       │
//! │  └─────────────────┘   └─────────────────┘   └────────┬────────┘       │
//! │                                                       │ succeeded       │
//! │                                                       ▼                 │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ShippingDetails  │──►│     Order       │◄──│  OrderStatus    │       │
//! │  │  name, email    │   │  items snapshot │   │  Pending        │       │
//! │  │  address, zip   │   │  payment_id     │   │  Processing ... │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::InvalidStatusTransition;
use crate::money::Money;

// =============================================================================
// Cart Line Item
// =============================================================================

/// One rentable product entry in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    /// Catalog item id.
    pub item_id: String,

    /// Display name at time of adding (frozen).
    pub name: String,

    /// Price for one rental day, in major units.
    #[ts(as = "String")]
    pub price_per_day: Decimal,

    /// Number of rental days.
    pub rental_days: i64,

    /// Selected size, if the item comes in sizes.
    pub size: Option<String>,
}

impl CartLineItem {
    /// Creates a line item without a size.
    pub fn new(
        item_id: impl Into<String>,
        name: impl Into<String>,
        price_per_day: Decimal,
        rental_days: i64,
    ) -> Self {
        CartLineItem {
            item_id: item_id.into(),
            name: name.into(),
            price_per_day,
            rental_days,
            size: None,
        }
    }

    /// Sets the size.
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// Exact line total (price per day × rental days), `None` on overflow.
    pub fn line_total(&self) -> Option<Decimal> {
        self.price_per_day
            .checked_mul(Decimal::from(self.rental_days))
    }

    /// Whether this line holds `item_id` in `size`.
    pub fn same_slot(&self, item_id: &str, size: Option<&str>) -> bool {
        self.item_id == item_id && self.size.as_deref() == size
    }
}

// =============================================================================
// Pricing Breakdown
// =============================================================================

/// The priced view of a cart.
///
/// ## Invariant
/// `total == subtotal + insurance_deposit + tax`, exactly, in cents.
/// Only built by [`crate::PricingEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PricingBreakdown {
    pub subtotal: Money,
    pub insurance_deposit: Money,
    pub tax: Money,
    pub total: Money,
}

// =============================================================================
// Payment Intent
// =============================================================================

/// A processor-side intent to charge the shopper, as the storefront sees it.
///
/// Ephemeral: requested fresh per checkout attempt and dropped with the
/// checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    /// Processor's id for the intent (e.g. `pi_...`).
    pub intent_id: String,
    /// Secret the browser SDK needs to authorize the charge.
    pub client_secret: String,
    /// Amount requested, in minor units.
    pub amount: Money,
    /// ISO 4217 currency code, lowercase.
    pub currency: String,
    /// Key the intent was created under; identical for retries of the same cart.
    pub idempotency_key: String,
}

/// Processor status of a payment intent after confirmation.
///
/// Only [`ConfirmationStatus::Succeeded`] means money moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    /// Anything the processor reports that this crate does not know about.
    #[serde(other)]
    Unknown,
}

impl ConfirmationStatus {
    /// True only for a captured, successful payment.
    #[inline]
    pub fn is_succeeded(&self) -> bool {
        matches!(self, ConfirmationStatus::Succeeded)
    }
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfirmationStatus::RequiresPaymentMethod => "requires_payment_method",
            ConfirmationStatus::RequiresConfirmation => "requires_confirmation",
            ConfirmationStatus::RequiresAction => "requires_action",
            ConfirmationStatus::Processing => "processing",
            ConfirmationStatus::RequiresCapture => "requires_capture",
            ConfirmationStatus::Canceled => "canceled",
            ConfirmationStatus::Succeeded => "succeeded",
            ConfirmationStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// The processor's answer to a confirm call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    pub payment_intent_id: String,
    pub status: ConfirmationStatus,
}

// =============================================================================
// Shipping Details
// =============================================================================

/// Where to send the rental. All fields are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    pub name: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub phone: String,
}

// =============================================================================
// Order Status
// =============================================================================

/// Fulfillment status of an order.
///
/// ## Transitions
/// ```text
/// Pending ──► Processing ──► Shipped ──► Delivered
///    │            │
///    └────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Whether fulfillment may move an order from `self` to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (*self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
        )
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Money-side status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

// =============================================================================
// Order
// =============================================================================

/// The durable record of a completed, paid rental.
///
/// Uses the snapshot pattern: `items` is a copy of the cart at the moment the
/// payment succeeded, never a live reference to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub items: Vec<CartLineItem>,
    pub subtotal: Money,
    pub insurance_deposit: Money,
    pub tax: Money,
    /// The pricing engine's total, not whatever the processor echoed back.
    pub total: Money,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Processor payment intent id; unique per order.
    pub payment_id: String,
    pub shipping: ShippingDetails,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns the breakdown this order was charged for.
    pub fn breakdown(&self) -> PricingBreakdown {
        PricingBreakdown {
            subtotal: self.subtotal,
            insurance_deposit: self.insurance_deposit,
            tax: self.tax,
            total: self.total,
        }
    }

    /// Moves the order to `next`, stamping `updated_at`.
    pub fn transition_to(
        &mut self,
        next: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<(), InvalidStatusTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total() {
        let item = CartLineItem::new("dress-1", "Silk Dress", Decimal::new(4550, 2), 3);
        assert_eq!(item.line_total(), Some(Decimal::new(13650, 2)));
    }

    #[test]
    fn test_same_slot_respects_size() {
        let item = CartLineItem::new("dress-1", "Silk Dress", Decimal::from(45), 2).with_size("M");
        assert!(item.same_slot("dress-1", Some("M")));
        assert!(!item.same_slot("dress-1", Some("L")));
        assert!(!item.same_slot("dress-1", None));
    }

    #[test]
    fn test_status_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));

        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Processing));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_confirmation_status_serde() {
        let status: ConfirmationStatus = serde_json::from_str("\"succeeded\"").unwrap();
        assert!(status.is_succeeded());

        let status: ConfirmationStatus = serde_json::from_str("\"requires_action\"").unwrap();
        assert_eq!(status, ConfirmationStatus::RequiresAction);

        let status: ConfirmationStatus = serde_json::from_str("\"something_new\"").unwrap();
        assert_eq!(status, ConfirmationStatus::Unknown);
    }

    #[test]
    fn test_line_item_json_shape() {
        let item = CartLineItem::new("dress-1", "Silk Dress", Decimal::new(4550, 2), 2).with_size("S");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["itemId"], "dress-1");
        assert_eq!(json["pricePerDay"], "45.50");
        assert_eq!(json["rentalDays"], 2);
        assert_eq!(json["size"], "S");
    }

    #[test]
    fn test_order_status_defaults() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
    }
}
