//! # Error Types
//!
//! Domain-specific error types for drape-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  drape-core errors (this file)                                          │
//! │  ├── PricingError            - Cart cannot be priced                    │
//! │  ├── CartError               - Cart mutation rejected                   │
//! │  ├── ValidationError         - Shipping form / input failures           │
//! │  └── InvalidStatusTransition - Fulfillment moved an order illegally     │
//! │                                                                         │
//! │  drape-db errors (separate crate)                                       │
//! │  └── DbError                 - Database operation failures              │
//! │                                                                         │
//! │  drape-checkout errors                                                  │
//! │  └── CheckoutError           - What the storefront sees                 │
//! │                                                                         │
//! │  Flow: PricingError → CheckoutError::Pricing → "cannot check out"       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pricing errors are raised before any network call, so they always leave
//! the cart and the shopper's card untouched.

use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Pricing Error
// =============================================================================

/// Errors raised while turning a cart into a pricing breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    /// The cart has no line items.
    ///
    /// ## User Workflow
    /// ```text
    /// Click "Checkout" with empty cart
    ///      │
    ///      ▼
    /// EmptyCart
    ///      │
    ///      ▼
    /// UI shows: "Your cart is empty" (no payment intent requested)
    /// ```
    #[error("Cart is empty")]
    EmptyCart,

    /// A line item has a non-positive price or rental length.
    #[error("Invalid line item #{index} ({name}): {reason}")]
    InvalidLineItem {
        index: usize,
        name: String,
        reason: String,
    },

    /// The computed total cannot be charged (zero, negative, or overflowed).
    #[error("Invalid total: {reason}")]
    InvalidTotal { reason: String },
}

impl PricingError {
    pub(crate) fn invalid_total(reason: impl Into<String>) -> Self {
        PricingError::InvalidTotal {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Cart Error
// =============================================================================

/// Cart mutation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Cart has reached its maximum number of line items.
    #[error("Cart cannot have more than {max} items")]
    CartFull { max: usize },

    /// The item is not in the cart.
    #[error("Item {item_id} not in cart")]
    ItemNotInCart { item_id: String },

    /// The item was rejected before it reached the cart.
    #[error("Cannot add {item_id} to cart: {reason}")]
    InvalidItem { item_id: String, reason: String },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation of the checkout form before pricing runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., malformed email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Order Status Transition
// =============================================================================

/// Fulfillment tried to move an order along an edge that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Order cannot move from {from} to {to}")]
pub struct InvalidStatusTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result of pricing a cart.
pub type PricingResult<T> = Result<T, PricingError>;

/// Result of mutating a cart.
pub type CartResult<T> = Result<T, CartError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pricing_error_messages() {
        assert_eq!(PricingError::EmptyCart.to_string(), "Cart is empty");

        let err = PricingError::InvalidLineItem {
            index: 0,
            name: "Silk Dress".to_string(),
            reason: "rental days must be at least 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid line item #0 (Silk Dress): rental days must be at least 1"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "email".to_string(),
        };
        assert_eq!(err.to_string(), "email is required");
    }

    #[test]
    fn test_transition_error_message() {
        let err = InvalidStatusTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Processing,
        };
        assert_eq!(err.to_string(), "Order cannot move from delivered to processing");
    }
}
