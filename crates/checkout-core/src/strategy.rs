//! # Payment Strategy Trait
//!
//! Capability interface over the payment backends.
//!
//! ## Design Pattern
//!
//! The backend is chosen once from `PAYMENT_MODE` at startup and handed to the
//! services as a `BoxedPaymentStrategy`; no call site re-checks the mode.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PaymentStrategy (trait)                  │
//! │  ├── initiate()                                             │
//! │  ├── confirm()                                              │
//! │  ├── verify_signature()                                     │
//! │  └── provider()                                             │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                 ┌──────────┴──────────┐
//!                 │                     │
//!         ┌───────┴───────┐     ┌───────┴────────┐
//!         │ DemoPayment   │     │ Razorpay       │
//!         │   Strategy    │     │   Strategy     │
//!         └───────────────┘     └────────────────┘
//! ```

use crate::error::CheckoutResult;
use crate::payment::{PaymentIntent, PaymentProvider, PaymentRequest};
use async_trait::async_trait;
use std::sync::Arc;

/// Core trait for payment backend implementations.
#[async_trait]
pub trait PaymentStrategy: Send + Sync {
    /// Create a payable intent for an order.
    ///
    /// Transport failures and timeouts must surface as retryable errors,
    /// distinct from a definitive provider rejection.
    async fn initiate(&self, request: &PaymentRequest) -> CheckoutResult<PaymentIntent>;

    /// Ask the backend whether the intent identified by `provider_order_id`
    /// has settled. Returns the settled payment reference, if any.
    async fn confirm(&self, provider_order_id: &str) -> CheckoutResult<Option<String>>;

    /// Verify a client-side payment signature.
    ///
    /// Returns `Ok(false)` for a bad signature; errors only for
    /// configuration or transport problems.
    fn verify_signature(
        &self,
        provider_order_id: &str,
        provider_payment_id: &str,
        signature: &str,
    ) -> CheckoutResult<bool>;

    /// Backend tag (for records and logging).
    fn provider(&self) -> PaymentProvider;

    /// Whether operator-only demo shortcuts are allowed.
    fn is_demo(&self) -> bool {
        self.provider() == PaymentProvider::Demo
    }
}

/// Type alias for a shared payment strategy (dynamic dispatch)
pub type BoxedPaymentStrategy = Arc<dyn PaymentStrategy>;
