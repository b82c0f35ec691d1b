//! # Payment Intent Issuer
//!
//! Turns a priced cart into a processor payment intent.
//!
//! ## Issue Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  total (major units, e.g. 112.50)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  × 100, round half-up ──► 11250          (45.005 → 4501)                │
//! │       │                                                                 │
//! │       ├── <= 0 ──► PaymentIntentCreation   (no network call)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  idempotency key = uuid v5(user, cart revision, cart lines, total)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  processor.create_payment_intent(11250, "usd", key, metadata)           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PaymentIntent { client_secret, amount: our 11250, ... }                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The amount on the returned [`PaymentIntent`] is always the one we
//! computed; whatever the processor echoes back is only logged.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use drape_core::{CartLineItem, Money, PaymentIntent, PricingBreakdown};

use crate::error::{CheckoutError, CheckoutResult};
use crate::processor::{IntentMetadata, PaymentProcessor};

/// Namespace for checkout idempotency keys.
const IDEMPOTENCY_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_4d2e_8a9b_4f3c_b2d1_7e5a_9c0d_3b18);

/// Stripe rejects metadata values longer than this.
const MAX_METADATA_VALUE_LEN: usize = 500;

/// Converts a major-unit amount to minor units, rounding half-up.
///
/// `None` if the amount does not fit in an `i64` of cents.
///
/// ## Example
/// ```rust
/// use drape_checkout::issuer::to_minor_units;
/// use rust_decimal::Decimal;
///
/// assert_eq!(to_minor_units(Decimal::new(45005, 3)), Some(4501));
/// assert_eq!(to_minor_units(Decimal::new(11250, 2)), Some(11250));
/// ```
pub fn to_minor_units(amount_major: Decimal) -> Option<i64> {
    Money::from_major(amount_major).map(|m| m.cents())
}

/// Idempotency key for one checkout attempt.
///
/// Same shopper, same cart revision, same lines, same total → same key, so
/// a retried request returns the intent created the first time. Renting the
/// same lines again after an order moves the revision and gets a new intent.
pub fn idempotency_key(
    user_id: &str,
    cart_revision: u64,
    items: &[CartLineItem],
    total: Money,
) -> String {
    let mut fingerprint = String::new();
    fingerprint.push_str(user_id);
    fingerprint.push('\n');
    fingerprint.push_str(&format!("rev:{cart_revision}\n"));
    for item in items {
        fingerprint.push_str(&format!(
            "{}|{}|{}|{}\n",
            item.item_id,
            item.size.as_deref().unwrap_or(""),
            item.price_per_day.normalize(),
            item.rental_days
        ));
    }
    fingerprint.push_str(&total.cents().to_string());

    Uuid::new_v5(&IDEMPOTENCY_NAMESPACE, fingerprint.as_bytes()).to_string()
}

/// Audit metadata for an intent: who, what, and how the total was built.
pub fn intent_metadata(
    user_id: &str,
    items: &[CartLineItem],
    breakdown: &PricingBreakdown,
) -> IntentMetadata {
    let lines = items
        .iter()
        .map(|item| match &item.size {
            Some(size) => format!("{}/{}x{}", item.item_id, size, item.rental_days),
            None => format!("{}x{}", item.item_id, item.rental_days),
        })
        .collect::<Vec<_>>()
        .join(",");

    let mut metadata = IntentMetadata::new();
    metadata.insert("user_id".into(), user_id.to_string());
    metadata.insert("items".into(), truncate(lines, MAX_METADATA_VALUE_LEN));
    metadata.insert("item_count".into(), items.len().to_string());
    metadata.insert("subtotal".into(), breakdown.subtotal.to_major().to_string());
    metadata.insert(
        "insurance_deposit".into(),
        breakdown.insurance_deposit.to_major().to_string(),
    );
    metadata.insert("tax".into(), breakdown.tax.to_major().to_string());
    metadata.insert("total".into(), breakdown.total.to_major().to_string());
    metadata
}

fn truncate(mut value: String, max: usize) -> String {
    if value.len() > max {
        let mut cut = max;
        while !value.is_char_boundary(cut) {
            cut -= 1;
        }
        value.truncate(cut);
    }
    value
}

/// Requests payment intents for priced carts.
#[derive(Clone)]
pub struct PaymentIntentIssuer {
    processor: Arc<dyn PaymentProcessor>,
    currency: String,
}

impl PaymentIntentIssuer {
    pub fn new(processor: Arc<dyn PaymentProcessor>, currency: impl Into<String>) -> Self {
        PaymentIntentIssuer {
            processor,
            currency: currency.into(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Issues an intent for a priced cart at `cart_revision`.
    pub async fn issue(
        &self,
        user_id: &str,
        cart_revision: u64,
        items: &[CartLineItem],
        breakdown: &PricingBreakdown,
    ) -> CheckoutResult<PaymentIntent> {
        let key = idempotency_key(user_id, cart_revision, items, breakdown.total);
        let mut metadata = intent_metadata(user_id, items, breakdown);
        metadata.insert("cart_revision".into(), cart_revision.to_string());

        self.issue_for_total(breakdown.total.to_major(), &key, &metadata)
            .await
    }

    /// Issues an intent for a total in major units.
    ///
    /// ## Errors
    /// - [`CheckoutError::PaymentIntentCreation`] if the amount is not
    ///   positive after conversion (checked before any network call), or
    ///   the processor call fails
    pub async fn issue_for_total(
        &self,
        total_major: Decimal,
        idempotency_key: &str,
        metadata: &IntentMetadata,
    ) -> CheckoutResult<PaymentIntent> {
        let amount_minor = to_minor_units(total_major).ok_or_else(|| {
            CheckoutError::intent_creation(format!("amount {total_major} is too large"))
        })?;

        if amount_minor <= 0 {
            return Err(CheckoutError::intent_creation(format!(
                "amount must be positive, got {amount_minor} minor units"
            )));
        }

        let intent = self
            .processor
            .create_payment_intent(amount_minor, &self.currency, idempotency_key, metadata)
            .await
            .map_err(|e| {
                warn!(error = %e, amount_minor, "Payment intent creation failed");
                CheckoutError::intent_creation(e.to_string())
            })?;

        if intent.amount != amount_minor {
            warn!(
                intent_id = %intent.id,
                requested = amount_minor,
                echoed = intent.amount,
                "Processor echoed a different amount; keeping ours"
            );
        }

        info!(intent_id = %intent.id, amount_minor, currency = %self.currency, "Payment intent issued");

        Ok(PaymentIntent {
            intent_id: intent.id,
            client_secret: intent.client_secret,
            amount: Money::from_cents(amount_minor),
            currency: self.currency.clone(),
            idempotency_key: idempotency_key.to_string(),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
