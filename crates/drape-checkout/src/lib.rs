//! # drape-checkout: Checkout Pipeline for Drape
//!
//! Turns a shopper's saved cart into a paid, recorded rental order.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Checkout Architecture                            │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 CheckoutService (orchestrator)                   │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │    ┌──────────────┬───────────┼──────────────┬───────────────┐         │
//! │    ▼              ▼           ▼              ▼               ▼          │
//! │  CartStore   PricingEngine  PaymentIntent  OrderRecorder  EventBus      │
//! │  (port)      (drape-core)   Issuer         (retry +       (broadcast)   │
//! │    │                          │             idempotent)                 │
//! │    │                          ▼                 │                       │
//! │    │                   PaymentProcessor         ▼                       │
//! │    │                   Stripe │ Mock        OrderStore (port)           │
//! │    │                                            │                       │
//! │    └──────────► InMemory*Store │ Sqlite*Store (drape-db) ◄──┘           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Nothing is requested from the processor for a cart that cannot be
//!   priced or a shipping form that does not validate.
//! - An order exists only for a payment the processor reported `succeeded`.
//! - The cart is cleared only after its order is stored.
//! - A charge whose order could not be stored surfaces as
//!   [`CheckoutError::OrderPersistence`] with the payment id, and is logged.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use drape_checkout::{CheckoutConfig, CheckoutService, EventBus};
//!
//! drape_checkout::telemetry::init_tracing();
//! let config = CheckoutConfig::load(None)?;
//! let service = CheckoutService::connect(&config, EventBus::default()).await?;
//!
//! let session = service.begin_checkout("user-1", &shipping).await?;
//! let order = service.complete_checkout(&session, "pm_card_visa").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart_service;
pub mod checkout;
pub mod config;
pub mod error;
pub mod events;
pub mod issuer;
pub mod processor;
pub mod recorder;
pub mod stores;
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use cart_service::CartService;
pub use checkout::{CheckoutService, CheckoutSession};
pub use config::{CheckoutConfig, ConfigError};
pub use error::{CheckoutError, CheckoutResult, ProcessorError, StoreError};
pub use events::{CheckoutEvent, EventBus};
pub use issuer::PaymentIntentIssuer;
pub use processor::{MockPaymentProcessor, PaymentProcessor, StripeProcessor};
pub use recorder::{OrderDraft, OrderRecorder, RetryPolicy};
pub use stores::{
    CartStore, InMemoryCartStore, InMemoryOrderStore, OrderStore, SqliteCartStore,
    SqliteOrderStore,
};
