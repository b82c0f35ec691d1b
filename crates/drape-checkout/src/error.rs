//! # Checkout Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Checkout Error Categories                          │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    BLOCKED      │  │  SHOPPER RETRY  │  │   RECONCILIATION        │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Pricing        │  │  PaymentIntent  │  │  OrderPersistence       │ │
//! │  │  Validation     │  │    Creation     │  │  (money moved, no       │ │
//! │  │  Cart           │  │  Payment        │  │   order row)            │ │
//! │  │  Config         │  │    Confirmation │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Before confirmation: cart untouched, nothing charged.                  │
//! │  After confirmation: the charge is always either recorded or logged     │
//! │  with its payment id.                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use drape_core::{
    CartError, ConfirmationStatus, InvalidStatusTransition, PricingError, ValidationError,
};
use drape_db::DbError;

use crate::config::ConfigError;

/// Result type alias for checkout operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

/// Result type alias for processor calls.
pub type ProcessorResult<T> = Result<T, ProcessorError>;

/// Result type alias for store port calls.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Processor Error
// =============================================================================

/// Failures talking to the payment processor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessorError {
    /// The request never got a response (DNS, TLS, connection reset).
    #[error("Payment processor request failed: {0}")]
    RequestFailed(String),

    /// The request took longer than the client timeout.
    #[error("Payment processor timed out")]
    Timeout,

    /// Bad or revoked secret key.
    #[error("Payment processor rejected the API key")]
    Unauthorized,

    /// Too many requests.
    #[error("Payment processor rate limited the request")]
    RateLimited,

    /// The card was declined.
    #[error("Card declined: {message}")]
    Declined {
        code: Option<String>,
        message: String,
    },

    /// Any other non-success response.
    #[error("Payment processor error {status}: {message}")]
    Api { status: u16, message: String },

    /// A success response we could not read.
    #[error("Unreadable payment processor response: {0}")]
    ResponseParse(String),
}

impl ProcessorError {
    /// Whether sending the same request again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcessorError::RequestFailed(_)
            | ProcessorError::Timeout
            | ProcessorError::RateLimited => true,
            ProcessorError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

// =============================================================================
// Store Error
// =============================================================================

/// Failures from a cart or order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An order already exists for this processor payment id.
    #[error("Order already recorded for payment {payment_id}")]
    DuplicatePayment { payment_id: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Fulfillment asked for a status change that is not allowed.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidStatusTransition),

    /// Storage is unreachable or busy; the same call may work later.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Storage refused the operation and will keep refusing it.
    #[error("Storage error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UniqueViolation { field, value } if field.ends_with("payment_id") => {
                StoreError::DuplicatePayment { payment_id: value }
            }
            DbError::NotFound { entity, id } => StoreError::NotFound { entity, id },
            other if other.is_transient() => StoreError::Unavailable(other.to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

// =============================================================================
// Checkout Error
// =============================================================================

/// What the storefront sees when a checkout step fails.
#[derive(Debug, Error)]
pub enum CheckoutError {
    // =========================================================================
    // Blocked: nothing requested, nothing charged
    // =========================================================================
    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    // =========================================================================
    // Processor: the shopper may try again
    // =========================================================================
    /// No payment intent; the cart is untouched.
    #[error("Could not start payment: {reason}")]
    PaymentIntentCreation { reason: String },

    /// The payment did not succeed (declined, needs action, timed out).
    #[error("Payment {payment_intent_id} not completed: {reason}")]
    PaymentConfirmation {
        payment_intent_id: String,
        /// Last status the processor reported, if it answered at all.
        status: Option<ConfirmationStatus>,
        reason: String,
    },

    // =========================================================================
    // Storage
    // =========================================================================
    /// The payment succeeded but no order could be written.
    #[error("Payment {payment_id} succeeded but the order was not saved: {source}")]
    OrderPersistence {
        payment_id: String,
        #[source]
        source: StoreError,
    },

    #[error("Cart store failed: {0}")]
    CartStore(#[source] StoreError),

    #[error("Order store failed: {0}")]
    OrderStore(#[source] StoreError),

    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: String },

    #[error(transparent)]
    InvalidStatusTransition(#[from] InvalidStatusTransition),
}

impl CheckoutError {
    /// Whether the shopper can retry the same checkout.
    ///
    /// ## Retryable Errors
    /// - Payment intent creation and confirmation failures
    /// - Transient cart store failures
    ///
    /// ## Non-Retryable Errors
    /// - Pricing, validation and cart errors (the cart must change first)
    /// - Order persistence (needs reconciliation, not a second charge)
    pub fn is_retryable(&self) -> bool {
        match self {
            CheckoutError::PaymentIntentCreation { .. }
            | CheckoutError::PaymentConfirmation { .. } => true,
            CheckoutError::CartStore(e) | CheckoutError::OrderStore(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Whether money moved without an order to show for it.
    pub fn requires_reconciliation(&self) -> bool {
        matches!(self, CheckoutError::OrderPersistence { .. })
    }

    /// The processor payment id involved, if any.
    pub fn payment_id(&self) -> Option<&str> {
        match self {
            CheckoutError::OrderPersistence { payment_id, .. } => Some(payment_id),
            CheckoutError::PaymentConfirmation {
                payment_intent_id, ..
            } => Some(payment_intent_id),
            _ => None,
        }
    }

    pub(crate) fn intent_creation(reason: impl Into<String>) -> Self {
        CheckoutError::PaymentIntentCreation {
            reason: reason.into(),
        }
    }
}

/// Maps order-store failures for reads and fulfillment updates.
impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidTransition(t) => CheckoutError::InvalidStatusTransition(t),
            StoreError::NotFound { id, .. } => CheckoutError::OrderNotFound { order_id: id },
            other => CheckoutError::OrderStore(other),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use drape_core::OrderStatus;

    #[test]
    fn test_processor_retryable() {
        assert!(ProcessorError::Timeout.is_retryable());
        assert!(ProcessorError::Api {
            status: 503,
            message: "down".into()
        }
        .is_retryable());

        assert!(!ProcessorError::Unauthorized.is_retryable());
        assert!(!ProcessorError::Declined {
            code: Some("card_declined".into()),
            message: "Your card was declined.".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_db_error_mapping() {
        let dup = StoreError::from(DbError::UniqueViolation {
            field: "orders.payment_id".into(),
            value: "pi_1".into(),
        });
        assert!(matches!(dup, StoreError::DuplicatePayment { ref payment_id } if payment_id == "pi_1"));

        assert!(StoreError::from(DbError::PoolExhausted).is_transient());
        assert!(!StoreError::from(DbError::MigrationFailed("x".into())).is_transient());

        let check = StoreError::from(DbError::CheckViolation {
            message: "CHECK constraint failed: total_cents > 0".into(),
        });
        assert!(matches!(check, StoreError::Backend(_)));
        assert!(!check.is_transient());
    }

    #[test]
    fn test_checkout_error_classification() {
        assert!(!CheckoutError::from(PricingError::EmptyCart).is_retryable());
        assert!(CheckoutError::intent_creation("processor down").is_retryable());

        let persistence = CheckoutError::OrderPersistence {
            payment_id: "pi_9".into(),
            source: StoreError::Unavailable("disk full".into()),
        };
        assert!(persistence.requires_reconciliation());
        assert!(!persistence.is_retryable());
        assert_eq!(persistence.payment_id(), Some("pi_9"));
    }

    #[test]
    fn test_store_error_to_checkout_error() {
        let err = CheckoutError::from(StoreError::InvalidTransition(InvalidStatusTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Cancelled,
        }));
        assert!(matches!(err, CheckoutError::InvalidStatusTransition(_)));

        let err = CheckoutError::from(StoreError::NotFound {
            entity: "Order".into(),
            id: "o-1".into(),
        });
        assert!(matches!(err, CheckoutError::OrderNotFound { ref order_id } if order_id == "o-1"));
    }
}
