//! # Order Recorder
//!
//! Turns a succeeded payment into a durable order.
//!
//! ## Recording Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  PaymentConfirmation                                                    │
//! │         │                                                               │
//! │         ├── status != succeeded ──► PaymentConfirmation error           │
//! │         │                           (no order, cart untouched)          │
//! │         ▼                                                               │
//! │  Order for this payment id already stored? ──► clear a leftover cart,   │
//! │         │                                      return it                │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  OrderStore::save  ◄──┐                                                 │
//! │         │             │ transient failure: exponential backoff          │
//! │         ├─────────────┘                                                 │
//! │         ├── gave up ──► error! with payment id ──► OrderPersistence     │
//! │         ▼                                          (cart untouched)     │
//! │  CartStore::clear (failure only logged)                                 │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  OrderCompleted event ──► Order                                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cart is cleared only after the order is stored, so a failed write
//! never loses what the shopper paid for.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use drape_core::{
    CartLineItem, Order, OrderStatus, PaymentConfirmation, PaymentStatus, PricingBreakdown,
    ShippingDetails,
};

use crate::error::{CheckoutError, CheckoutResult, StoreError};
use crate::events::{CheckoutEvent, EventBus};
use crate::stores::{CartStore, OrderStore};

// =============================================================================
// Retry Policy
// =============================================================================

/// How hard to try before giving up on an order write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,

    /// Wait after the first failure.
    pub initial_backoff: Duration,

    /// Longest wait between attempts.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// A single attempt with no retries.
    pub fn no_retry() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

// =============================================================================
// Order Draft
// =============================================================================

/// Everything an order needs besides the payment itself.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub user_id: String,
    /// Cart snapshot taken when checkout began.
    pub items: Vec<CartLineItem>,
    pub breakdown: PricingBreakdown,
    pub currency: String,
    pub shipping: ShippingDetails,
}

// =============================================================================
// Order Recorder
// =============================================================================

/// Writes orders for succeeded payments and clears the shopper's cart.
#[derive(Clone)]
pub struct OrderRecorder {
    orders: Arc<dyn OrderStore>,
    carts: Arc<dyn CartStore>,
    events: EventBus,
    retry: RetryPolicy,
}

impl OrderRecorder {
    pub fn new(orders: Arc<dyn OrderStore>, carts: Arc<dyn CartStore>, events: EventBus) -> Self {
        OrderRecorder {
            orders,
            carts,
            events,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Records the order for a confirmed payment.
    ///
    /// Calling this twice for the same payment returns the first order
    /// instead of writing a second one.
    ///
    /// ## Errors
    /// - [`CheckoutError::PaymentConfirmation`] if the payment did not
    ///   succeed; nothing is written
    /// - [`CheckoutError::OrderPersistence`] if the payment succeeded but
    ///   the order could not be stored; the cart is left as it was
    pub async fn record(
        &self,
        confirmation: &PaymentConfirmation,
        draft: OrderDraft,
    ) -> CheckoutResult<Order> {
        let payment_id = confirmation.payment_intent_id.as_str();

        if !confirmation.status.is_succeeded() {
            info!(
                payment_id,
                status = %confirmation.status,
                "Payment not succeeded; no order recorded"
            );
            return Err(CheckoutError::PaymentConfirmation {
                payment_intent_id: payment_id.to_string(),
                status: Some(confirmation.status),
                reason: format!("payment status is {}", confirmation.status),
            });
        }

        match self.orders.find_by_payment_id(payment_id).await {
            Ok(Some(existing)) => {
                debug!(payment_id, order_id = %existing.id, "Order already recorded");
                if existing.user_id == draft.user_id {
                    self.clear_leftover_cart(&existing).await;
                }
                return Ok(existing);
            }
            Ok(None) => {}
            // The write below still enforces uniqueness
            Err(e) => warn!(payment_id, error = %e, "Could not check for an existing order"),
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4().to_string(),
            user_id: draft.user_id,
            items: draft.items,
            subtotal: draft.breakdown.subtotal,
            insurance_deposit: draft.breakdown.insurance_deposit,
            tax: draft.breakdown.tax,
            total: draft.breakdown.total,
            currency: draft.currency,
            status: OrderStatus::Processing,
            payment_status: PaymentStatus::Paid,
            payment_id: payment_id.to_string(),
            shipping: draft.shipping,
            created_at: now,
            updated_at: now,
        };

        let order = match self.save_with_retry(&order).await {
            Ok(()) => order,
            Err(StoreError::DuplicatePayment { .. }) => {
                return self.existing_after_race(payment_id).await;
            }
            Err(source) => {
                error!(
                    payment_id,
                    user_id = %order.user_id,
                    total = %order.total,
                    error = %source,
                    "Payment succeeded but the order was not saved; reconcile manually"
                );
                return Err(CheckoutError::OrderPersistence {
                    payment_id: payment_id.to_string(),
                    source,
                });
            }
        };

        info!(
            order_id = %order.id,
            payment_id,
            total = %order.total,
            "Order recorded"
        );

        self.clear_cart(&order).await;

        self.events.publish(CheckoutEvent::OrderCompleted {
            order_id: order.id.clone(),
            user_id: order.user_id.clone(),
            payment_id: order.payment_id.clone(),
            total: order.total,
        });

        Ok(order)
    }

    /// Moves a stored order along its fulfillment lifecycle.
    pub async fn update_status(&self, order_id: &str, next: OrderStatus) -> CheckoutResult<Order> {
        let order = self.orders.update_status(order_id, next).await?;
        info!(order_id, status = %order.status, "Order status changed");
        Ok(order)
    }

    async fn save_with_retry(&self, order: &Order) -> Result<(), StoreError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut backoff = self.retry.backoff();
        let mut attempt = 1;

        loop {
            match self.orders.save(order).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let wait = backoff.next_backoff().unwrap_or(self.retry.max_backoff);
                    warn!(
                        payment_id = %order.payment_id,
                        attempt,
                        max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Order write failed; retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn clear_cart(&self, order: &Order) {
        match self.carts.clear(&order.user_id).await {
            Ok(()) => {
                self.events.publish(CheckoutEvent::CartCleared {
                    user_id: order.user_id.clone(),
                });
            }
            Err(e) => warn!(
                user_id = %order.user_id,
                order_id = %order.id,
                error = %e,
                "Order recorded but the cart was not cleared"
            ),
        }
    }

    /// A replayed confirmation finishes a clear that failed the first time.
    ///
    /// Only a cart still holding exactly the order's lines is cleared; a
    /// cart the shopper has since changed is left alone.
    async fn clear_leftover_cart(&self, order: &Order) {
        match self.carts.load(&order.user_id).await {
            Ok(cart) if !cart.is_empty() && cart.items() == order.items.as_slice() => {
                debug!(order_id = %order.id, "Clearing cart left over from recorded order");
                self.clear_cart(order).await;
            }
            Ok(_) => {}
            Err(e) => warn!(
                user_id = %order.user_id,
                order_id = %order.id,
                error = %e,
                "Could not check for a cart left over from recorded order"
            ),
        }
    }

    /// Another writer stored the order first; hand theirs back.
    async fn existing_after_race(&self, payment_id: &str) -> CheckoutResult<Order> {
        match self.orders.find_by_payment_id(payment_id).await {
            Ok(Some(existing)) => {
                debug!(payment_id, order_id = %existing.id, "Order recorded concurrently");
                Ok(existing)
            }
            Ok(None) => Err(CheckoutError::OrderPersistence {
                payment_id: payment_id.to_string(),
                source: StoreError::Backend(
                    "duplicate payment reported but no order found".to_string(),
                ),
            }),
            Err(source) => {
                error!(payment_id, error = %source, "Could not read back recorded order");
                Err(CheckoutError::OrderPersistence {
                    payment_id: payment_id.to_string(),
                    source,
                })
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
