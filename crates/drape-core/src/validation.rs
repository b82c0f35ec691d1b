//! # Validation Module
//!
//! Input validation for the checkout pipeline.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Storefront (TypeScript)                                       │
//! │  ├── Form field hints                                                   │
//! │  └── Immediate shopper feedback                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── Shipping form: required fields, email shape, phone digits          │
//! │  └── Line items: price > 0, 1 <= days <= 365                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── NOT NULL / CHECK constraints                                       │
//! │  └── UNIQUE payment_id                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;

use crate::error::{PricingError, ValidationError};
use crate::types::{CartLineItem, ShippingDetails};
use crate::MAX_RENTAL_DAYS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest value accepted for any free-text shipping field.
const MAX_FIELD_LEN: usize = 200;

// =============================================================================
// Line Items
// =============================================================================

/// Describes what is wrong with a line item, if anything.
///
/// Shared by the cart (rejects on add) and the pricing engine (rejects the
/// whole cart), so both report the same reason.
pub fn line_item_defect(item: &CartLineItem) -> Option<String> {
    if item.item_id.trim().is_empty() {
        return Some("item id is required".to_string());
    }

    if item.price_per_day <= Decimal::ZERO {
        return Some(format!(
            "price per day must be positive, got {}",
            item.price_per_day
        ));
    }

    if item.rental_days < 1 {
        return Some(format!(
            "rental days must be at least 1, got {}",
            item.rental_days
        ));
    }

    if item.rental_days > MAX_RENTAL_DAYS {
        return Some(format!(
            "rental days cannot exceed {}, got {}",
            MAX_RENTAL_DAYS, item.rental_days
        ));
    }

    None
}

/// Validates one line item at position `index` in the cart.
///
/// ## Example
/// ```rust
/// use drape_core::validation::validate_line_item;
/// use drape_core::{CartLineItem, PricingError};
/// use rust_decimal::Decimal;
///
/// let bad = CartLineItem::new("coat-9", "Wool Coat", Decimal::from(10), -1);
/// let err = validate_line_item(0, &bad).unwrap_err();
/// assert!(matches!(err, PricingError::InvalidLineItem { index: 0, .. }));
/// ```
pub fn validate_line_item(index: usize, item: &CartLineItem) -> Result<(), PricingError> {
    match line_item_defect(item) {
        Some(reason) => Err(PricingError::InvalidLineItem {
            index,
            name: item.name.clone(),
            reason,
        }),
        None => Ok(()),
    }
}

// =============================================================================
// Shipping Details
// =============================================================================

/// Validates the checkout form.
///
/// ## Rules
/// - Every field is required (whitespace-only counts as empty)
/// - No field longer than 200 characters
/// - Email: one `@`, non-empty local part, dotted domain
/// - Phone: digits plus `+ - ( ) .` and spaces, at least 7 digits
///
/// ## User Workflow
/// ```text
/// Shopper submits checkout form
///      │
///      ▼
/// validate_shipping_details() ← THIS FUNCTION
///      │
///      ├── Error → form shows the field message, no payment intent
///      │
///      └── OK → cart is priced, payment intent requested
/// ```
pub fn validate_shipping_details(details: &ShippingDetails) -> ValidationResult<()> {
    let fields = [
        ("name", &details.name),
        ("email", &details.email),
        ("address", &details.address),
        ("city", &details.city),
        ("state", &details.state),
        ("zip", &details.zip),
        ("phone", &details.phone),
    ];

    for (field, value) in fields {
        let value = value.trim();
        if value.is_empty() {
            return Err(ValidationError::Required {
                field: field.to_string(),
            });
        }
        if value.chars().count() > MAX_FIELD_LEN {
            return Err(ValidationError::TooLong {
                field: field.to_string(),
                max: MAX_FIELD_LEN,
            });
        }
    }

    validate_email(details.email.trim())?;
    validate_phone(details.phone.trim())?;

    Ok(())
}

fn validate_email(email: &str) -> ValidationResult<()> {
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: reason.to_string(),
    };

    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return Err(invalid("must contain exactly one @")),
    };

    if local.is_empty() {
        return Err(invalid("missing name before @"));
    }

    let dotted: Vec<&str> = domain.split('.').collect();
    if dotted.len() < 2 || dotted.iter().any(|label| label.is_empty()) {
        return Err(invalid("domain must look like example.com"));
    }

    if email.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain spaces"));
    }

    Ok(())
}

fn validate_phone(phone: &str) -> ValidationResult<()> {
    let allowed = |c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | '.' | ' ');
    if !phone.chars().all(allowed) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "may only contain digits, spaces and + - ( ) .".to_string(),
        });
    }

    let digits = phone.chars().filter(char::is_ascii_digit).count();
    if digits < 7 {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain at least 7 digits".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Configuration Values
// =============================================================================

/// Validates a rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_rate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

/// Validates an ISO 4217 currency code (`usd`, `EUR`, ...).
pub fn validate_currency(code: &str) -> ValidationResult<()> {
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: "must be a three-letter ISO 4217 code".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
