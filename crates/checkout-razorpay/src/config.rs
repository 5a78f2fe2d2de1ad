//! # Razorpay Configuration
//!
//! Configuration management for the Razorpay integration.
//! All secrets are loaded from environment variables.

use checkout_core::{CheckoutError, CheckoutResult, Currency};
use std::env;
use std::time::Duration;

/// Default bound on a single Razorpay API call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Razorpay API configuration
#[derive(Clone)]
pub struct RazorpayConfig {
    /// Public key id (rzp_test_... or rzp_live_...), handed to the client SDK
    pub key_id: String,

    /// Secret key, used for basic auth and payment signatures
    pub key_secret: String,

    /// Webhook signing secret
    pub webhook_secret: String,

    /// API base URL (for testing/mocking)
    pub api_base_url: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Settlement currency
    pub currency: Currency,
}

impl std::fmt::Debug for RazorpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayConfig")
            .field("key_id", &self.key_id)
            .field("api_base_url", &self.api_base_url)
            .field("timeout", &self.timeout)
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

impl RazorpayConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `RAZORPAY_KEY_ID`
    /// - `RAZORPAY_KEY_SECRET`
    /// - `RAZORPAY_WEBHOOK_SECRET`
    ///
    /// Optional env vars:
    /// - `RAZORPAY_API_BASE_URL`
    /// - `RAZORPAY_TIMEOUT_SECONDS` (default 10)
    /// - `RAZORPAY_CURRENCY` (default INR)
    pub fn from_env() -> CheckoutResult<Self> {
        dotenvy::dotenv().ok();

        let key_id = required("RAZORPAY_KEY_ID")?;
        let key_secret = required("RAZORPAY_KEY_SECRET")?;
        let webhook_secret = required("RAZORPAY_WEBHOOK_SECRET")?;

        if !key_id.starts_with("rzp_") {
            return Err(CheckoutError::Configuration(
                "RAZORPAY_KEY_ID must start with rzp_".to_string(),
            ));
        }

        let mut config = Self::new(key_id, key_secret, webhook_secret);

        if let Ok(url) = env::var("RAZORPAY_API_BASE_URL") {
            config.api_base_url = url;
        }

        if let Ok(raw) = env::var("RAZORPAY_TIMEOUT_SECONDS") {
            let secs = raw.parse::<u64>().map_err(|_| {
                CheckoutError::Configuration(
                    "RAZORPAY_TIMEOUT_SECONDS must be a whole number".to_string(),
                )
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Ok(code) = env::var("RAZORPAY_CURRENCY") {
            config.currency = Currency::parse(&code).ok_or_else(|| {
                CheckoutError::Configuration(format!("Unsupported RAZORPAY_CURRENCY: {}", code))
            })?;
        }

        Ok(config)
    }

    /// Create config with explicit values (for testing)
    pub fn new(
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            key_secret: key_secret.into(),
            webhook_secret: webhook_secret.into(),
            api_base_url: "https://api.razorpay.com".to_string(),
            timeout: DEFAULT_TIMEOUT,
            currency: Currency::INR,
        }
    }

    /// Check if using test keys
    pub fn is_test_mode(&self) -> bool {
        self.key_id.starts_with("rzp_test_")
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Builder: set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn required(name: &str) -> CheckoutResult<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| CheckoutError::Configuration(format!("{} not set", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RazorpayConfig::new("rzp_test_abc123", "secret", "whsec");
        assert!(config.is_test_mode());
        assert_eq!(config.api_base_url, "https://api.razorpay.com");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.currency, Currency::INR);

        let live = RazorpayConfig::new("rzp_live_abc123", "secret", "whsec");
        assert!(!live.is_test_mode());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = RazorpayConfig::new("rzp_test_abc123", "very-secret", "hook-secret");
        let printed = format!("{:?}", config);
        assert!(printed.contains("rzp_test_abc123"));
        assert!(!printed.contains("very-secret"));
        assert!(!printed.contains("hook-secret"));
    }

    #[test]
    fn test_from_env_missing_key() {
        env::remove_var("RAZORPAY_KEY_ID");

        let result = RazorpayConfig::from_env();
        assert!(result.is_err());
    }
}
