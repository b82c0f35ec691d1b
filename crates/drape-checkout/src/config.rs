//! # Checkout Configuration
//!
//! Settings for pricing, the payment processor and order persistence.
//!
//! ## Load Order (later overrides earlier)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. Defaults          25% insurance, no tax, usd, Stripe API            │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  2. checkout.toml     ProjectDirs config dir, or an explicit path       │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  3. DRAPE_* env vars  secrets and per-deployment overrides              │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  4. validate()        bad config fails startup, not the first checkout  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use drape_core::validation::{validate_currency, validate_rate_bps};
use drape_core::{FlatRateTax, PricingEngine, Rate, DEFAULT_CURRENCY, DEFAULT_INSURANCE_RATE_BPS};
use drape_db::DbConfig;

use crate::recorder::RetryPolicy;

/// Configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid checkout configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Pricing Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingSettings {
    /// Insurance deposit as basis points of the subtotal.
    /// Default: 2500 (25%)
    #[serde(default = "default_insurance_rate_bps")]
    pub insurance_rate_bps: u32,

    /// Flat tax rate in basis points; 0 disables tax.
    /// Default: 0
    #[serde(default)]
    pub tax_rate_bps: u32,
}

fn default_insurance_rate_bps() -> u32 {
    DEFAULT_INSURANCE_RATE_BPS
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            insurance_rate_bps: default_insurance_rate_bps(),
            tax_rate_bps: 0,
        }
    }
}

// =============================================================================
// Payment Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSettings {
    /// Processor API root, without the `/v1` suffix.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Processor secret key. Usually set through `DRAPE_PAYMENT_SECRET_KEY`.
    #[serde(default)]
    pub secret_key: Option<String>,

    /// ISO 4217 currency code for every intent.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// HTTP timeout for each processor call (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Longest the checkout waits for a confirmation (seconds).
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}
fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_confirm_timeout() -> u64 {
    60
}

impl Default for PaymentSettings {
    fn default() -> Self {
        PaymentSettings {
            api_base_url: default_api_base_url(),
            secret_key: None,
            currency: default_currency(),
            request_timeout_secs: default_request_timeout(),
            confirm_timeout_secs: default_confirm_timeout(),
        }
    }
}

// =============================================================================
// Persistence Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceSettings {
    /// SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Attempts at writing an order before giving up (at least 1).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Longest retry delay (milliseconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "drape", "checkout")
        .map(|dirs| dirs.data_dir().join("drape.db"))
        .unwrap_or_else(|| PathBuf::from("drape.db"))
}
fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    200
}
fn default_max_backoff() -> u64 {
    2000
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        PersistenceSettings {
            database_path: default_database_path(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

// =============================================================================
// Main Checkout Configuration
// =============================================================================

/// Complete checkout configuration.
///
/// ## Example Config File
/// ```toml
/// [pricing]
/// insurance_rate_bps = 2500
/// tax_rate_bps = 0
///
/// [payment]
/// api_base_url = "https://api.stripe.com"
/// currency = "usd"
/// confirm_timeout_secs = 60
///
/// [persistence]
/// database_path = "/var/lib/drape/drape.db"
/// max_attempts = 3
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutConfig {
    #[serde(default)]
    pub pricing: PricingSettings,

    #[serde(default)]
    pub payment: PaymentSettings,

    #[serde(default)]
    pub persistence: PersistenceSettings,
}

impl CheckoutConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// A missing file is not an error; a file that fails to parse is.
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading checkout config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document and validates it, without env overrides.
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |e: drape_core::ValidationError| ConfigError::Invalid(e.to_string());

        validate_rate_bps("pricing.insurance_rate_bps", self.pricing.insurance_rate_bps)
            .map_err(invalid)?;
        validate_rate_bps("pricing.tax_rate_bps", self.pricing.tax_rate_bps).map_err(invalid)?;
        validate_currency(&self.payment.currency).map_err(invalid)?;

        let url = &self.payment.api_base_url;
        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(ConfigError::Invalid(format!(
                "payment.api_base_url must start with http:// or https://, got: {url}"
            )));
        }

        if matches!(self.payment.secret_key.as_deref(), Some(key) if key.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "payment.secret_key is set but empty".into(),
            ));
        }

        if self.payment.request_timeout_secs == 0 || self.payment.confirm_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "payment timeouts must be greater than 0".into(),
            ));
        }

        if self.persistence.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "persistence.max_attempts must be at least 1".into(),
            ));
        }

        if self.persistence.initial_backoff_ms > self.persistence.max_backoff_ms {
            return Err(ConfigError::Invalid(
                "persistence.initial_backoff_ms cannot exceed max_backoff_ms".into(),
            ));
        }

        Ok(())
    }

    /// Applies `DRAPE_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn parsed<T: std::str::FromStr>(key: &str, value: Option<String>) -> Option<T> {
            let value = value?;
            match value.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(key, value = %value, "Ignoring unparsable environment override");
                    None
                }
            }
        }

        if let Some(bps) = parsed::<u32>("DRAPE_INSURANCE_RATE_BPS", lookup("DRAPE_INSURANCE_RATE_BPS")) {
            debug!(bps, "Overriding insurance rate from environment");
            self.pricing.insurance_rate_bps = bps;
        }

        if let Some(bps) = parsed::<u32>("DRAPE_TAX_RATE_BPS", lookup("DRAPE_TAX_RATE_BPS")) {
            self.pricing.tax_rate_bps = bps;
        }

        if let Some(url) = lookup("DRAPE_PAYMENT_API_BASE_URL") {
            debug!(url = %url, "Overriding payment API URL from environment");
            self.payment.api_base_url = url;
        }

        if let Some(key) = lookup("DRAPE_PAYMENT_SECRET_KEY") {
            self.payment.secret_key = Some(key);
        }

        if let Some(currency) = lookup("DRAPE_CURRENCY") {
            self.payment.currency = currency.to_lowercase();
        }

        if let Some(secs) = parsed::<u64>("DRAPE_CONFIRM_TIMEOUT_SECS", lookup("DRAPE_CONFIRM_TIMEOUT_SECS")) {
            self.payment.confirm_timeout_secs = secs;
        }

        if let Some(path) = lookup("DRAPE_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.persistence.database_path = PathBuf::from(path);
        }

        if let Some(attempts) = parsed::<u32>("DRAPE_PERSIST_MAX_ATTEMPTS", lookup("DRAPE_PERSIST_MAX_ATTEMPTS")) {
            self.persistence.max_attempts = attempts;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "drape", "checkout")
            .map(|dirs| dirs.config_dir().join("checkout.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// A pricing engine with the configured insurance and tax rates.
    pub fn pricing_engine(&self) -> PricingEngine {
        let engine = PricingEngine::new(Rate::from_bps(self.pricing.insurance_rate_bps));
        if self.pricing.tax_rate_bps == 0 {
            engine
        } else {
            engine.with_tax_policy(FlatRateTax::new(Rate::from_bps(self.pricing.tax_rate_bps)))
        }
    }

    pub fn currency(&self) -> &str {
        &self.payment.currency
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.payment.request_timeout_secs)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.payment.confirm_timeout_secs)
    }

    /// Retry policy for order writes.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.persistence.max_attempts,
            initial_backoff: Duration::from_millis(self.persistence.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.persistence.max_backoff_ms),
        }
    }

    /// Database settings for [`drape_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.persistence.database_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = CheckoutConfig::default();
        assert_eq!(config.pricing.insurance_rate_bps, 2500);
        assert_eq!(config.pricing.tax_rate_bps, 0);
        assert_eq!(config.currency(), "usd");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CheckoutConfig::from_toml_str(
            r#"
            [pricing]
            tax_rate_bps = 825

            [persistence]
            database_path = "/tmp/drape.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.pricing.insurance_rate_bps, 2500);
        assert_eq!(config.pricing.tax_rate_bps, 825);
        assert_eq!(config.persistence.max_attempts, 3);
        assert_eq!(config.payment.api_base_url, "https://api.stripe.com");
        assert_eq!(config.persistence.database_path, PathBuf::from("/tmp/drape.db"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = CheckoutConfig::default();
        config.pricing.insurance_rate_bps = 10_001;
        assert!(config.validate().is_err());

        let mut config = CheckoutConfig::default();
        config.payment.currency = "dollars".into();
        assert!(config.validate().is_err());

        let mut config = CheckoutConfig::default();
        config.payment.api_base_url = "ftp://pay".into();
        assert!(config.validate().is_err());

        let mut config = CheckoutConfig::default();
        config.persistence.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = CheckoutConfig::default();
        config.payment.secret_key = Some("  ".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DRAPE_INSURANCE_RATE_BPS", "1000"),
            ("DRAPE_PAYMENT_SECRET_KEY", "sk_test_123"),
            ("DRAPE_CURRENCY", "EUR"),
            ("DRAPE_PERSIST_MAX_ATTEMPTS", "not-a-number"),
        ]);

        let mut config = CheckoutConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.pricing.insurance_rate_bps, 1000);
        assert_eq!(config.payment.secret_key.as_deref(), Some("sk_test_123"));
        assert_eq!(config.currency(), "eur");
        assert_eq!(config.persistence.max_attempts, 3);
    }

    #[test]
    fn test_pricing_engine_from_config() {
        let mut config = CheckoutConfig::default();
        config.pricing.tax_rate_bps = 1000;

        let item = drape_core::CartLineItem::new("dress-1", "Silk Dress", 45.into(), 2);
        let breakdown = config.pricing_engine().price(&[item]).unwrap();
        assert_eq!(breakdown.tax.cents(), 900);
        assert_eq!(breakdown.total.cents(), 9000 + 2250 + 900);
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = CheckoutConfig::from_toml_str("[pricing\ninsurance_rate_bps = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
