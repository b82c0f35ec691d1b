//! # Checkout Service
//!
//! One checkout attempt, end to end.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  begin_checkout(user, shipping)                                         │
//! │    validate shipping ──► load cart ──► price ──► issue intent           │
//! │         │                    │            │            │                │
//! │    Validation           CartStore     Pricing    PaymentIntentCreation  │
//! │                                                                         │
//! │    ──► CheckoutSession { snapshot, breakdown, intent, shipping }        │
//! │        (cart untouched, nothing charged)                                │
//! │                                                                         │
//! │  complete_checkout(session, payment_method)                             │
//! │    confirm (bounded by timeout) ──► OrderRecorder::record               │
//! │         │                                 │                             │
//! │    PaymentConfirmation             OrderPersistence                     │
//! │                                                                         │
//! │  record_confirmed(session, confirmation)                                │
//! │    for confirmations made by the processor's client SDK                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Dropping `complete_checkout` before the processor answers records
//! nothing: the recorder only runs once confirmation has returned.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use drape_core::validation::validate_shipping_details;
use drape_core::{
    CartLineItem, Order, OrderStatus, PaymentConfirmation, PaymentIntent, PricingBreakdown,
    PricingEngine, ShippingDetails, DEFAULT_CURRENCY,
};
use drape_db::Database;

use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, CheckoutResult, StoreError};
use crate::events::EventBus;
use crate::issuer::PaymentIntentIssuer;
use crate::processor::{PaymentProcessor, StripeProcessor};
use crate::recorder::{OrderDraft, OrderRecorder, RetryPolicy};
use crate::stores::{CartStore, OrderStore, SqliteCartStore, SqliteOrderStore};

/// Default bound on a confirm call.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);

// =============================================================================
// Checkout Session
// =============================================================================

/// A priced cart with an open payment intent.
///
/// Holds the cart snapshot the order will be built from, so later cart
/// edits don't change what this attempt records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub session_id: String,
    pub user_id: String,
    /// Cart revision the snapshot was taken at.
    pub cart_revision: u64,
    pub items: Vec<CartLineItem>,
    pub breakdown: PricingBreakdown,
    pub intent: PaymentIntent,
    pub shipping: ShippingDetails,
    pub created_at: DateTime<Utc>,
}

impl CheckoutSession {
    /// What the storefront hands to the processor's client SDK.
    pub fn client_secret(&self) -> &str {
        &self.intent.client_secret
    }

    fn draft(&self) -> OrderDraft {
        OrderDraft {
            user_id: self.user_id.clone(),
            items: self.items.clone(),
            breakdown: self.breakdown,
            currency: self.intent.currency.clone(),
            shipping: self.shipping.clone(),
        }
    }
}

// =============================================================================
// Checkout Service
// =============================================================================

/// Cart to order, through the payment processor.
///
/// ## Example
/// ```rust,ignore
/// let service = CheckoutService::new(processor, carts, orders, events);
/// let session = service.begin_checkout("user-1", &shipping).await?;
/// // storefront collects card details with session.client_secret()
/// let order = service.complete_checkout(&session, "pm_card_visa").await?;
/// ```
#[derive(Clone)]
pub struct CheckoutService {
    pricing: PricingEngine,
    processor: Arc<dyn PaymentProcessor>,
    issuer: PaymentIntentIssuer,
    recorder: OrderRecorder,
    carts: Arc<dyn CartStore>,
    orders: Arc<dyn OrderStore>,
    confirm_timeout: Duration,
}

impl CheckoutService {
    /// A service with default pricing, currency and timeouts.
    pub fn new(
        processor: Arc<dyn PaymentProcessor>,
        carts: Arc<dyn CartStore>,
        orders: Arc<dyn OrderStore>,
        events: EventBus,
    ) -> Self {
        CheckoutService {
            pricing: PricingEngine::default(),
            issuer: PaymentIntentIssuer::new(processor.clone(), DEFAULT_CURRENCY),
            recorder: OrderRecorder::new(orders.clone(), carts.clone(), events),
            processor,
            carts,
            orders,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
        }
    }

    /// A service with pricing, currency, timeouts and retries from `config`.
    pub fn from_config(
        config: &CheckoutConfig,
        processor: Arc<dyn PaymentProcessor>,
        carts: Arc<dyn CartStore>,
        orders: Arc<dyn OrderStore>,
        events: EventBus,
    ) -> Self {
        CheckoutService::new(processor, carts, orders, events)
            .with_pricing(config.pricing_engine())
            .with_currency(config.currency())
            .with_confirm_timeout(config.confirm_timeout())
            .with_retry_policy(config.retry_policy())
    }

    /// Opens the configured database and talks to the configured processor.
    ///
    /// ## Errors
    /// - [`CheckoutError::Config`] if the config is invalid or has no
    ///   processor secret key
    /// - [`CheckoutError::OrderStore`] if the database cannot be opened
    pub async fn connect(config: &CheckoutConfig, events: EventBus) -> CheckoutResult<Self> {
        config.validate()?;
        let processor = StripeProcessor::from_settings(&config.payment)?;

        let db = Database::new(config.db_config())
            .await
            .map_err(|e| CheckoutError::OrderStore(StoreError::from(e)))?;

        info!(
            database = %config.persistence.database_path.display(),
            currency = config.currency(),
            "Checkout service connected"
        );

        Ok(CheckoutService::from_config(
            config,
            Arc::new(processor),
            Arc::new(SqliteCartStore::new(db.clone())),
            Arc::new(SqliteOrderStore::new(db)),
            events,
        ))
    }

    pub fn with_pricing(mut self, pricing: PricingEngine) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.issuer = PaymentIntentIssuer::new(self.processor.clone(), currency);
        self
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.recorder = self.recorder.with_retry_policy(retry);
        self
    }

    pub fn pricing(&self) -> &PricingEngine {
        &self.pricing
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Prices the shopper's cart and opens a payment intent for it.
    ///
    /// ## Errors
    /// - [`CheckoutError::Validation`] for a bad shipping form
    /// - [`CheckoutError::Pricing`] for an empty or unpriceable cart
    /// - [`CheckoutError::PaymentIntentCreation`] if the processor refuses
    ///
    /// None of these touch the cart or charge anything.
    pub async fn begin_checkout(
        &self,
        user_id: &str,
        shipping: &ShippingDetails,
    ) -> CheckoutResult<CheckoutSession> {
        validate_shipping_details(shipping)?;

        let cart = self
            .carts
            .load(user_id)
            .await
            .map_err(CheckoutError::CartStore)?;
        let items = cart.snapshot();

        let breakdown = self.pricing.price_for(&items, Some(shipping))?;
        debug!(
            user_id,
            item_count = items.len(),
            subtotal = %breakdown.subtotal,
            insurance = %breakdown.insurance_deposit,
            tax = %breakdown.tax,
            total = %breakdown.total,
            "Cart priced"
        );

        let intent = self
            .issuer
            .issue(user_id, cart.revision(), &items, &breakdown)
            .await?;

        let session = CheckoutSession {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            cart_revision: cart.revision(),
            items,
            breakdown,
            intent,
            shipping: shipping.clone(),
            created_at: Utc::now(),
        };

        info!(
            session_id = %session.session_id,
            user_id,
            cart_revision = session.cart_revision,
            intent_id = %session.intent.intent_id,
            total = %session.breakdown.total,
            "Checkout started"
        );

        Ok(session)
    }

    /// Confirms the session's payment and records the order.
    ///
    /// ## Errors
    /// - [`CheckoutError::PaymentConfirmation`] if the processor fails,
    ///   times out, or reports anything but `succeeded`
    /// - [`CheckoutError::OrderPersistence`] if the charge went through
    ///   but no order could be stored
    pub async fn complete_checkout(
        &self,
        session: &CheckoutSession,
        payment_method: &str,
    ) -> CheckoutResult<Order> {
        let intent_id = session.intent.intent_id.as_str();

        let confirmation = match tokio::time::timeout(
            self.confirm_timeout,
            self.processor.confirm_payment(intent_id, payment_method),
        )
        .await
        {
            Ok(Ok(confirmation)) => confirmation,
            Ok(Err(e)) => {
                warn!(intent_id, error = %e, "Payment confirmation failed");
                return Err(CheckoutError::PaymentConfirmation {
                    payment_intent_id: intent_id.to_string(),
                    status: None,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(
                    intent_id,
                    timeout_secs = self.confirm_timeout.as_secs(),
                    "Payment confirmation timed out"
                );
                return Err(CheckoutError::PaymentConfirmation {
                    payment_intent_id: intent_id.to_string(),
                    status: None,
                    reason: format!(
                        "no answer from the processor within {:?}",
                        self.confirm_timeout
                    ),
                });
            }
        };

        self.record_confirmed(session, &confirmation).await
    }

    /// Records the order for a confirmation obtained outside this service.
    pub async fn record_confirmed(
        &self,
        session: &CheckoutSession,
        confirmation: &PaymentConfirmation,
    ) -> CheckoutResult<Order> {
        if confirmation.payment_intent_id != session.intent.intent_id {
            warn!(
                session_id = %session.session_id,
                expected = %session.intent.intent_id,
                got = %confirmation.payment_intent_id,
                "Confirmation is for a different payment intent"
            );
            return Err(CheckoutError::PaymentConfirmation {
                payment_intent_id: confirmation.payment_intent_id.clone(),
                status: Some(confirmation.status),
                reason: format!(
                    "confirmation does not belong to intent {}",
                    session.intent.intent_id
                ),
            });
        }

        self.recorder.record(confirmation, session.draft()).await
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// A shopper's orders, newest first.
    pub async fn orders_for_user(&self, user_id: &str) -> CheckoutResult<Vec<Order>> {
        Ok(self.orders.list_for_user(user_id).await?)
    }

    pub async fn order(&self, order_id: &str) -> CheckoutResult<Order> {
        self.orders
            .get(order_id)
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound {
                order_id: order_id.to_string(),
            })
    }

    /// Moves an order along its fulfillment lifecycle.
    pub async fn advance_order(&self, order_id: &str, next: OrderStatus) -> CheckoutResult<Order> {
        self.recorder.update_status(order_id, next).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::MockPaymentProcessor;
    use crate::stores::{InMemoryCartStore, InMemoryOrderStore};
    use drape_core::{Cart, ConfirmationStatus, Money, ValidationError};
    use rust_decimal::Decimal;

    fn shipping() -> ShippingDetails {
        ShippingDetails {
            name: "Grace Hopper".into(),
            email: "grace@example.com".into(),
            address: "1 Compiler Ct".into(),
            city: "Arlington".into(),
            state: "VA".into(),
            zip: "22201".into(),
            phone: "555-0199".into(),
        }
    }

    async fn setup(
        processor: MockPaymentProcessor,
    ) -> (CheckoutService, InMemoryCartStore, InMemoryOrderStore) {
        let carts = InMemoryCartStore::new();
        let orders = InMemoryOrderStore::new();

        let mut cart = Cart::new();
        cart.add_item(CartLineItem::new("dress-1", "Silk Dress", Decimal::from(45), 2))
            .unwrap();
        carts.save("user-1", &cart).await.unwrap();

        let service = CheckoutService::new(
            Arc::new(processor),
            Arc::new(carts.clone()),
            Arc::new(orders.clone()),
            EventBus::default(),
        );
        (service, carts, orders)
    }

    #[tokio::test]
    async fn test_begin_checkout_prices_and_issues() {
        let (service, carts, _) = setup(MockPaymentProcessor::new()).await;

        let session = service.begin_checkout("user-1", &shipping()).await.unwrap();

        assert_eq!(session.breakdown.total, Money::from_cents(11250));
        assert_eq!(session.intent.amount, Money::from_cents(11250));
        assert_eq!(session.intent.currency, "usd");
        assert!(!session.client_secret().is_empty());
        assert_eq!(carts.load("user-1").await.unwrap().item_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_shipping_blocks_checkout() {
        let processor = MockPaymentProcessor::new();
        let (service, _, _) = setup(processor.clone()).await;

        let mut bad = shipping();
        bad.zip = "  ".into();

        let err = service.begin_checkout("user-1", &bad).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Validation(ValidationError::Required { ref field }) if field == "zip"
        ));
        assert_eq!(processor.create_calls().await, 0);
    }

    #[tokio::test]
    async fn test_mismatched_confirmation_rejected() {
        let (service, _, orders) = setup(MockPaymentProcessor::new()).await;
        let session = service.begin_checkout("user-1", &shipping()).await.unwrap();

        let err = service
            .record_confirmed(
                &session,
                &PaymentConfirmation {
                    payment_intent_id: "pi_someone_else".into(),
                    status: ConfirmationStatus::Succeeded,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::PaymentConfirmation { .. }));
        assert!(orders.is_empty().await);
    }

    #[tokio::test]
    async fn test_order_lookup_and_fulfillment() {
        let (service, _, _) = setup(MockPaymentProcessor::new()).await;
        let session = service.begin_checkout("user-1", &shipping()).await.unwrap();
        let order = service
            .complete_checkout(&session, "pm_card_visa")
            .await
            .unwrap();

        assert_eq!(service.order(&order.id).await.unwrap(), order);
        assert_eq!(service.orders_for_user("user-1").await.unwrap(), vec![order.clone()]);
        assert!(service.orders_for_user("user-2").await.unwrap().is_empty());

        let shipped = service
            .advance_order(&order.id, OrderStatus::Shipped)
            .await
            .unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);

        assert!(matches!(
            service.order("nope").await.unwrap_err(),
            CheckoutError::OrderNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_from_config_applies_settings() {
        let config = CheckoutConfig::from_toml_str(
            r#"
            [pricing]
            insurance_rate_bps = 1000
            tax_rate_bps = 800

            [payment]
            currency = "eur"

            [persistence]
            max_attempts = 5
            "#,
        )
        .unwrap();

        let service = CheckoutService::from_config(
            &config,
            Arc::new(MockPaymentProcessor::new()),
            Arc::new(InMemoryCartStore::new()),
            Arc::new(InMemoryOrderStore::new()),
            EventBus::default(),
        );

        assert_eq!(service.pricing().insurance_rate().bps(), 1000);
        assert_eq!(service.recorder.retry_policy().max_attempts, 5);

        let items = vec![CartLineItem::new("dress-1", "Silk Dress", Decimal::from(45), 2)];
        let breakdown = service.pricing().price_for(&items, Some(&shipping())).unwrap();
        // 90.00 + 9.00 insurance + 7.20 tax
        assert_eq!(breakdown.total, Money::from_cents(10620));
        assert_eq!(service.issuer.currency(), "eur");
    }
}
