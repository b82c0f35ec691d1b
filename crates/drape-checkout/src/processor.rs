//! # Payment Processor
//!
//! The port the checkout charges through, a Stripe-compatible HTTP client,
//! and an in-memory processor for tests and local development.
//!
//! ## Payment Intent Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  create_payment_intent(amount, currency, key, metadata)                 │
//! │       │   POST /v1/payment_intents          Idempotency-Key: key        │
//! │       ▼                                                                 │
//! │  requires_payment_method ──► client_secret to the browser               │
//! │       │                                                                 │
//! │  confirm_payment(intent_id, payment_method)                             │
//! │       │   POST /v1/payment_intents/{id}/confirm                         │
//! │       ▼                                                                 │
//! │  succeeded │ processing │ requires_action │ canceled │ ...              │
//! │       │                                                                 │
//! │       └── only `succeeded` may become an order                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use drape_core::{ConfirmationStatus, PaymentConfirmation};

use crate::config::{ConfigError, PaymentSettings};
use crate::error::{ProcessorError, ProcessorResult};

/// Free-form key/value pairs stored on the intent for audit.
pub type IntentMetadata = BTreeMap<String, String>;

/// A payment intent as the processor reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorIntent {
    pub id: String,
    pub client_secret: String,
    /// Amount in minor units, as echoed by the processor.
    pub amount: i64,
    pub currency: String,
    pub status: ConfirmationStatus,
}

/// Payment processor port.
///
/// Implementations must be cheap to share behind an `Arc`.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Creates (or, for a repeated `idempotency_key`, returns) an intent.
    async fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        idempotency_key: &str,
        metadata: &IntentMetadata,
    ) -> ProcessorResult<ProcessorIntent>;

    /// Confirms an intent with a payment method (e.g. `pm_card_visa`).
    async fn confirm_payment(
        &self,
        intent_id: &str,
        payment_method: &str,
    ) -> ProcessorResult<PaymentConfirmation>;
}

// =============================================================================
// Stripe-compatible HTTP Client
// =============================================================================

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    decline_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConfirmResponse {
    id: String,
    status: ConfirmationStatus,
}

/// Talks to Stripe, or anything that speaks its payment intents API.
#[derive(Clone)]
pub struct StripeProcessor {
    client: Client,
    secret_key: String,
    api_base_url: String,
}

impl std::fmt::Debug for StripeProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeProcessor")
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

impl StripeProcessor {
    /// Creates a client for `api_base_url` (no trailing `/v1`).
    pub fn new(
        secret_key: impl Into<String>,
        api_base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> ProcessorResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProcessorError::RequestFailed(e.to_string()))?;

        Ok(StripeProcessor {
            client,
            secret_key: secret_key.into(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Builds the client from `[payment]` settings.
    ///
    /// ## Errors
    /// - [`ConfigError::Invalid`] if no secret key is configured
    pub fn from_settings(settings: &PaymentSettings) -> Result<Self, ConfigError> {
        let secret_key = settings.secret_key.clone().ok_or_else(|| {
            ConfigError::Invalid("payment.secret_key is required for the Stripe processor".into())
        })?;

        Self::new(
            secret_key,
            settings.api_base_url.clone(),
            Duration::from_secs(settings.request_timeout_secs),
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> ProcessorResult<T> {
        let mut request = self
            .client
            .post(format!("{}{}", self.api_base_url, path))
            .bearer_auth(&self.secret_key)
            .form(form);

        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProcessorError::Timeout
            } else {
                ProcessorError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ProcessorError::ResponseParse(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        let api_error = serde_json::from_str::<ErrorEnvelope>(&body).ok().map(|e| e.error);

        warn!(status = status.as_u16(), path, "Payment processor returned an error");

        Err(match status {
            StatusCode::UNAUTHORIZED => ProcessorError::Unauthorized,
            StatusCode::TOO_MANY_REQUESTS => ProcessorError::RateLimited,
            StatusCode::PAYMENT_REQUIRED => {
                let (code, message) = match api_error {
                    Some(e) => (
                        e.decline_code.or(e.code),
                        e.message.unwrap_or_else(|| "card declined".to_string()),
                    ),
                    None => (None, body),
                };
                ProcessorError::Declined { code, message }
            }
            _ => ProcessorError::Api {
                status: status.as_u16(),
                message: api_error.and_then(|e| e.message).unwrap_or(body),
            },
        })
    }
}

#[async_trait]
impl PaymentProcessor for StripeProcessor {
    async fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        idempotency_key: &str,
        metadata: &IntentMetadata,
    ) -> ProcessorResult<ProcessorIntent> {
        let mut form = vec![
            ("amount".to_string(), amount_minor.to_string()),
            ("currency".to_string(), currency.to_string()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        form.extend(
            metadata
                .iter()
                .map(|(k, v)| (format!("metadata[{k}]"), v.clone())),
        );

        debug!(amount_minor, currency, idempotency_key, "Creating payment intent");

        self.post_form("/v1/payment_intents", &form, Some(idempotency_key))
            .await
    }

    async fn confirm_payment(
        &self,
        intent_id: &str,
        payment_method: &str,
    ) -> ProcessorResult<PaymentConfirmation> {
        let form = vec![("payment_method".to_string(), payment_method.to_string())];

        debug!(intent_id, "Confirming payment intent");

        let response: ConfirmResponse = self
            .post_form(
                &format!("/v1/payment_intents/{intent_id}/confirm"),
                &form,
                None,
            )
            .await?;

        Ok(PaymentConfirmation {
            payment_intent_id: response.id,
            status: response.status,
        })
    }
}

// =============================================================================
// In-memory Processor
// =============================================================================

#[derive(Debug, Default)]
struct MockState {
    /// Intents by idempotency key.
    intents: HashMap<String, ProcessorIntent>,
    metadata: HashMap<String, IntentMetadata>,
    create_calls: usize,
    confirm_calls: usize,
    fail_create: Option<ProcessorError>,
    fail_confirm: Option<ProcessorError>,
}

/// Processor that keeps intents in memory.
///
/// Honors idempotency keys like Stripe does, and can be told how
/// confirmation should go.
///
/// ## Example
/// ```rust,ignore
/// let processor = MockPaymentProcessor::new()
///     .with_confirm_status(ConfirmationStatus::RequiresAction);
/// ```
#[derive(Debug, Clone)]
pub struct MockPaymentProcessor {
    state: Arc<Mutex<MockState>>,
    confirm_status: ConfirmationStatus,
    confirm_delay: Option<Duration>,
}

impl MockPaymentProcessor {
    /// A processor whose confirmations succeed.
    pub fn new() -> Self {
        MockPaymentProcessor {
            state: Arc::new(Mutex::new(MockState::default())),
            confirm_status: ConfirmationStatus::Succeeded,
            confirm_delay: None,
        }
    }

    /// Status every confirmation reports.
    pub fn with_confirm_status(mut self, status: ConfirmationStatus) -> Self {
        self.confirm_status = status;
        self
    }

    /// Delay before every confirmation answers.
    pub fn with_confirm_delay(mut self, delay: Duration) -> Self {
        self.confirm_delay = Some(delay);
        self
    }

    /// Makes the next intent creation fail with `error`.
    pub async fn fail_next_create(&self, error: ProcessorError) {
        self.state.lock().await.fail_create = Some(error);
    }

    /// Makes the next confirmation fail with `error`.
    pub async fn fail_next_confirm(&self, error: ProcessorError) {
        self.state.lock().await.fail_confirm = Some(error);
    }

    /// Number of create calls, including idempotent repeats.
    pub async fn create_calls(&self) -> usize {
        self.state.lock().await.create_calls
    }

    pub async fn confirm_calls(&self) -> usize {
        self.state.lock().await.confirm_calls
    }

    /// Distinct intents created.
    pub async fn intent_count(&self) -> usize {
        self.state.lock().await.intents.len()
    }

    /// Metadata an intent was created with.
    pub async fn metadata_for(&self, intent_id: &str) -> Option<IntentMetadata> {
        self.state.lock().await.metadata.get(intent_id).cloned()
    }
}

impl Default for MockPaymentProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProcessor for MockPaymentProcessor {
    async fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        idempotency_key: &str,
        metadata: &IntentMetadata,
    ) -> ProcessorResult<ProcessorIntent> {
        let mut state = self.state.lock().await;
        state.create_calls += 1;

        if let Some(error) = state.fail_create.take() {
            return Err(error);
        }

        if let Some(existing) = state.intents.get(idempotency_key) {
            debug!(intent_id = %existing.id, "Mock processor replayed idempotent intent");
            return Ok(existing.clone());
        }

        let id = format!("pi_mock_{}", Uuid::new_v4().simple());
        let intent = ProcessorIntent {
            client_secret: format!("{id}_secret_{}", Uuid::new_v4().simple()),
            id,
            amount: amount_minor,
            currency: currency.to_string(),
            status: ConfirmationStatus::RequiresPaymentMethod,
        };

        info!(intent_id = %intent.id, amount_minor, "Mock payment intent created");

        state.metadata.insert(intent.id.clone(), metadata.clone());
        state
            .intents
            .insert(idempotency_key.to_string(), intent.clone());

        Ok(intent)
    }

    async fn confirm_payment(
        &self,
        intent_id: &str,
        _payment_method: &str,
    ) -> ProcessorResult<PaymentConfirmation> {
        if let Some(delay) = self.confirm_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        state.confirm_calls += 1;

        if let Some(error) = state.fail_confirm.take() {
            return Err(error);
        }

        let intent = state
            .intents
            .values_mut()
            .find(|intent| intent.id == intent_id)
            .ok_or_else(|| ProcessorError::Api {
                status: 404,
                message: format!("No such payment_intent: '{intent_id}'"),
            })?;

        intent.status = self.confirm_status;

        Ok(PaymentConfirmation {
            payment_intent_id: intent.id.clone(),
            status: self.confirm_status,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn stripe(server: &MockServer) -> StripeProcessor {
        StripeProcessor::new("sk_test_123", server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_stripe_create_intent() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(header("authorization", "Bearer sk_test_123"))
            .and(header("idempotency-key", "key-1"))
            .and(body_string_contains("amount=11250"))
            .and(body_string_contains("currency=usd"))
            .and(body_string_contains("metadata%5Btotal%5D=112.50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pi_123",
                "object": "payment_intent",
                "amount": 11250,
                "currency": "usd",
                "client_secret": "pi_123_secret_abc",
                "status": "requires_payment_method"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let metadata = IntentMetadata::from([("total".to_string(), "112.50".to_string())]);
        let intent = stripe(&server)
            .create_payment_intent(11250, "usd", "key-1", &metadata)
            .await
            .unwrap();

        assert_eq!(intent.id, "pi_123");
        assert_eq!(intent.client_secret, "pi_123_secret_abc");
        assert_eq!(intent.amount, 11250);
        assert_eq!(intent.status, ConfirmationStatus::RequiresPaymentMethod);
    }

    #[tokio::test]
    async fn test_stripe_confirm() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents/pi_123/confirm"))
            .and(body_string_contains("payment_method=pm_card_visa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pi_123",
                "status": "succeeded"
            })))
            .mount(&server)
            .await;

        let confirmation = stripe(&server)
            .confirm_payment("pi_123", "pm_card_visa")
            .await
            .unwrap();

        assert_eq!(confirmation.payment_intent_id, "pi_123");
        assert!(confirmation.status.is_succeeded());
    }

    #[tokio::test]
    async fn test_stripe_decline() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents/pi_123/confirm"))
            .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
                "error": {
                    "type": "card_error",
                    "code": "card_declined",
                    "decline_code": "insufficient_funds",
                    "message": "Your card has insufficient funds."
                }
            })))
            .mount(&server)
            .await;

        let err = stripe(&server)
            .confirm_payment("pi_123", "pm_card_visa")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ProcessorError::Declined {
                code: Some("insufficient_funds".into()),
                message: "Your card has insufficient funds.".into()
            }
        );
    }

    #[tokio::test]
    async fn test_stripe_error_statuses() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents/pi_down/confirm"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let processor = stripe(&server);

        let err = processor
            .create_payment_intent(100, "usd", "key", &IntentMetadata::new())
            .await
            .unwrap_err();
        assert_eq!(err, ProcessorError::Unauthorized);

        let err = processor.confirm_payment("pi_down", "pm").await.unwrap_err();
        assert_eq!(
            err,
            ProcessorError::Api {
                status: 503,
                message: "upstream down".into()
            }
        );
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_stripe_unreadable_success_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = stripe(&server)
            .create_payment_intent(100, "usd", "key", &IntentMetadata::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::ResponseParse(_)));
    }

    #[test]
    fn test_from_settings_requires_secret_key() {
        let settings = PaymentSettings::default();
        assert!(StripeProcessor::from_settings(&settings).is_err());

        let settings = PaymentSettings {
            secret_key: Some("sk_test_1".into()),
            ..PaymentSettings::default()
        };
        assert!(StripeProcessor::from_settings(&settings).is_ok());
    }

    #[tokio::test]
    async fn test_mock_idempotent_create() {
        let processor = MockPaymentProcessor::new();
        let metadata = IntentMetadata::new();

        let first = processor
            .create_payment_intent(500, "usd", "same-key", &metadata)
            .await
            .unwrap();
        let second = processor
            .create_payment_intent(500, "usd", "same-key", &metadata)
            .await
            .unwrap();
        let other = processor
            .create_payment_intent(500, "usd", "other-key", &metadata)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_ne!(first.id, other.id);
        assert_eq!(processor.create_calls().await, 3);
        assert_eq!(processor.intent_count().await, 2);
    }

    #[tokio::test]
    async fn test_mock_confirm_status_and_unknown_intent() {
        let processor = MockPaymentProcessor::new().with_confirm_status(ConfirmationStatus::Processing);
        let intent = processor
            .create_payment_intent(500, "usd", "k", &IntentMetadata::new())
            .await
            .unwrap();

        let confirmation = processor.confirm_payment(&intent.id, "pm").await.unwrap();
        assert_eq!(confirmation.status, ConfirmationStatus::Processing);

        let err = processor.confirm_payment("pi_nope", "pm").await.unwrap_err();
        assert!(matches!(err, ProcessorError::Api { status: 404, .. }));
    }
}
