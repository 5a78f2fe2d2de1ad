//! # Checkout Error Types
//!
//! Typed error handling for the checkout lifecycle.
//! All state-machine, payment and exit-pass operations return
//! `Result<T, CheckoutError>`. Transport translation happens at the API boundary.

use thiserror::Error;
use uuid::Uuid;

/// Core error type for all checkout operations
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Order creation attempted with no cart lines
    #[error("Cart is empty")]
    EmptyCart,

    /// Requested quantity exceeds live stock
    #[error("Insufficient stock for {product_name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_name: String,
        requested: u32,
        available: u32,
    },

    /// Product not found in the inventory ledger
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: Uuid },

    /// Order missing, or not visible to the caller
    #[error("Order not found")]
    OrderNotFound,

    /// Payment missing, or not visible to the caller
    #[error("Payment not found")]
    PaymentNotFound,

    /// Caller is not the owner of the order
    #[error("Not authorized")]
    NotAuthorized,

    /// Order already settled
    #[error("Order already paid")]
    AlreadyPaid,

    /// Exit pass requested before settlement
    #[error("Order must be paid to generate exit QR. Current status: {status}")]
    OrderNotPaid { status: String },

    /// Pending window elapsed before payment
    #[error("Order expired before payment")]
    OrderExpired,

    /// Demo-only operation called in live mode
    #[error("Demo mode is not enabled")]
    DemoModeDisabled,

    /// Payment provider API error
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Payment provider did not answer in time
    #[error("Provider timeout [{provider}]")]
    ProviderTimeout { provider: String },

    /// Network/HTTP error communicating with provider
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Rate limited by provider
    #[error("Rate limited by {provider}, retry after {retry_after_secs} seconds")]
    RateLimited {
        provider: String,
        retry_after_secs: u64,
    },

    /// Webhook or payment signature verification failed
    #[error("Signature verification failed: {0}")]
    InvalidSignature(String),

    /// Webhook payload parsing error
    #[error("Webhook parse error: {0}")]
    WebhookParseError(String),

    /// Store could not be reached in time
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CheckoutError {
    /// Returns true if the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::NetworkError(_)
                | CheckoutError::ProviderTimeout { .. }
                | CheckoutError::RateLimited { .. }
                | CheckoutError::StorageUnavailable(_)
        )
    }

    /// Returns true for errors raised by (or about) an external payment provider
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            CheckoutError::ProviderError { .. }
                | CheckoutError::ProviderTimeout { .. }
                | CheckoutError::NetworkError(_)
                | CheckoutError::RateLimited { .. }
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CheckoutError::Configuration(_) => 500,
            CheckoutError::InvalidRequest(_) => 400,
            CheckoutError::EmptyCart => 400,
            CheckoutError::InsufficientStock { .. } => 409,
            CheckoutError::ProductNotFound { .. } => 404,
            CheckoutError::OrderNotFound => 404,
            CheckoutError::PaymentNotFound => 404,
            CheckoutError::NotAuthorized => 403,
            CheckoutError::AlreadyPaid => 409,
            CheckoutError::OrderNotPaid { .. } => 409,
            CheckoutError::OrderExpired => 409,
            CheckoutError::DemoModeDisabled => 400,
            CheckoutError::ProviderError { .. } => 502,
            CheckoutError::ProviderTimeout { .. } => 504,
            CheckoutError::NetworkError(_) => 503,
            CheckoutError::RateLimited { .. } => 429,
            CheckoutError::InvalidSignature(_) => 401,
            CheckoutError::WebhookParseError(_) => 400,
            CheckoutError::StorageUnavailable(_) => 503,
            CheckoutError::Serialization(_) => 500,
            CheckoutError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for API clients
    pub fn error_code(&self) -> &'static str {
        match self {
            CheckoutError::Configuration(_) => "provider_misconfigured",
            CheckoutError::InvalidRequest(_) => "invalid_request",
            CheckoutError::EmptyCart => "empty_cart",
            CheckoutError::InsufficientStock { .. } => "insufficient_stock",
            CheckoutError::ProductNotFound { .. } => "not_found",
            CheckoutError::OrderNotFound => "not_found",
            CheckoutError::PaymentNotFound => "not_found",
            CheckoutError::NotAuthorized => "not_authorized",
            CheckoutError::AlreadyPaid => "already_paid",
            CheckoutError::OrderNotPaid { .. } => "order_not_paid",
            CheckoutError::OrderExpired => "order_expired",
            CheckoutError::DemoModeDisabled => "demo_mode_disabled",
            CheckoutError::ProviderError { .. } => "provider_error",
            CheckoutError::ProviderTimeout { .. } => "provider_timeout",
            CheckoutError::NetworkError(_) => "provider_unreachable",
            CheckoutError::RateLimited { .. } => "rate_limited",
            CheckoutError::InvalidSignature(_) => "invalid_signature",
            CheckoutError::WebhookParseError(_) => "invalid_payload",
            CheckoutError::StorageUnavailable(_) => "storage_unavailable",
            CheckoutError::Serialization(_) => "internal_error",
            CheckoutError::Internal(_) => "internal_error",
        }
    }
}

/// Result type alias for checkout operations
pub type CheckoutResult<T> = Result<T, CheckoutError>;
