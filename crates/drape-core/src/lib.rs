//! # drape-core: Pure Business Logic for Drape Checkout
//!
//! This crate holds the rules behind the rental checkout: how a cart is
//! priced, what an order looks like, and which inputs are allowed through.
//! Nothing in here touches a database, a network, or a clock-driven timer.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Drape Checkout Pipeline                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  Storefront (TypeScript)                        │   │
//! │  │     Cart page ──► Checkout form ──► Card entry ──► Confirmation │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    drape-checkout                               │   │
//! │  │     begin_checkout, complete_checkout, record_confirmed         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ drape-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  pricing  │  │ validation│  │   │
//! │  │   │   Order   │  │   Money   │  │  Engine   │  │  shipping │  │   │
//! │  │   │ LineItem  │  │   Rate    │  │ TaxPolicy │  │ line item │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (line items, orders, shipping details)
//! - [`money`] - Integer minor-unit money and basis-point rates
//! - [`cart`] - The shopper's cart
//! - [`pricing`] - Subtotal, insurance deposit, tax and total
//! - [`validation`] - Line item and shipping form rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use drape_core::{CartLineItem, PricingEngine};
//! use rust_decimal::Decimal;
//!
//! let engine = PricingEngine::default();
//! let items = vec![CartLineItem::new("dress-1", "Silk Dress", Decimal::from(45), 2)];
//!
//! let breakdown = engine.price(&items).unwrap();
//! assert_eq!(breakdown.subtotal.cents(), 9000);
//! assert_eq!(breakdown.insurance_deposit.cents(), 2250);
//! assert_eq!(breakdown.total.cents(), 11250);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::Cart;
pub use error::{CartError, InvalidStatusTransition, PricingError, ValidationError};
pub use money::{Money, Rate};
pub use pricing::{FlatRateTax, NoTax, PricingEngine, TaxPolicy};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Insurance deposit charged on every rental, in basis points (25%).
pub const DEFAULT_INSURANCE_RATE_BPS: u32 = 2500;

/// Currency used when none is configured (ISO 4217, lowercase as processors expect).
pub const DEFAULT_CURRENCY: &str = "usd";

/// Maximum line items allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Longest rental a single line item may request.
///
/// ## Business Reason
/// Catches typos like 300 instead of 3 before they reach a card.
pub const MAX_RENTAL_DAYS: i64 = 365;
