//! # checkout-razorpay
//!
//! Razorpay payment backend for the smart checkout platform.
//!
//! This crate provides:
//!
//! 1. **RazorpayStrategy** - `PaymentStrategy` over the Orders API
//!    - Gateway order creation (amount in paise, order metadata in notes)
//!    - Client signature verification
//!    - Reconciliation by listing an order's payments
//!
//! 2. **Webhook normalization** - both webhook shapes to `SettlementEvent`
//!    - Razorpay envelopes, verified against `X-Razorpay-Signature`
//!    - Demo notifications, passed through unsigned in demo mode only
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use checkout_razorpay::RazorpayStrategy;
//! use checkout_core::PaymentStrategy;
//!
//! let strategy = RazorpayStrategy::from_env()?;
//! let intent = strategy.initiate(&request).await?;
//!
//! // Hand intent.provider_order_id and intent.client_key to the checkout SDK
//! ```
//!
//! ## Webhook Handling
//!
//! ```rust,ignore
//! use checkout_razorpay::webhook::normalize_webhook;
//!
//! if let Some(event) = normalize_webhook(&body, signature, Some(&secret), is_demo)? {
//!     settlement.apply(event).await?;
//! }
//! ```

pub mod config;
pub mod gateway;
pub mod signature;
pub mod webhook;

// Re-exports
pub use config::RazorpayConfig;
pub use gateway::RazorpayStrategy;
pub use signature::{verify_payment_signature, verify_webhook_signature};
pub use webhook::{
    classify, normalize_webhook, WebhookShape, REQUIRED_WEBHOOK_EVENTS, SIGNATURE_HEADER,
};
