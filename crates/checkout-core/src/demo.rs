//! # Demo Payment Backend
//!
//! Simulated gateway for showcases and tests. No network calls: after a
//! configurable delay it reports success or failure and fabricates a
//! transaction id, a payment URL and a UPI payload.

use crate::error::{CheckoutError, CheckoutResult};
use crate::payment::{
    PaymentIntent, PaymentProvider, PaymentRequest, PaymentStatus, SettlementEvent, SettlementKind,
};
use crate::strategy::PaymentStrategy;
use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Prefix of every fabricated transaction id
pub const DEMO_TXN_PREFIX: &str = "DEMO_TXN_";

/// Demo backend configuration
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Simulated processing delay
    pub delay: Duration,
    /// Probability of a simulated failure, percent (0-100)
    pub failure_rate: u8,
    /// Base of the fabricated payment URL
    pub payment_base_url: String,
}

impl DemoConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional env vars:
    /// - `DEMO_PAYMENT_DELAY_SECONDS` (default 3)
    /// - `DEMO_FAILURE_RATE` (default 0)
    pub fn from_env() -> CheckoutResult<Self> {
        let delay_secs = match env::var("DEMO_PAYMENT_DELAY_SECONDS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                CheckoutError::Configuration(
                    "DEMO_PAYMENT_DELAY_SECONDS must be a whole number of seconds".to_string(),
                )
            })?,
            Err(_) => 3,
        };

        let failure_rate = match env::var("DEMO_FAILURE_RATE") {
            Ok(raw) => raw.parse::<u8>().map_err(|_| {
                CheckoutError::Configuration("DEMO_FAILURE_RATE must be 0-100".to_string())
            })?,
            Err(_) => 0,
        };

        Self::new(Duration::from_secs(delay_secs), failure_rate)
    }

    pub fn new(delay: Duration, failure_rate: u8) -> CheckoutResult<Self> {
        if failure_rate > 100 {
            return Err(CheckoutError::Configuration(
                "DEMO_FAILURE_RATE must be 0-100".to_string(),
            ));
        }
        Ok(Self {
            delay,
            failure_rate,
            payment_base_url: "https://demo-payment.smartcheckout.com/pay".to_string(),
        })
    }

    /// No delay, never fails
    pub fn instant() -> Self {
        Self {
            delay: Duration::ZERO,
            failure_rate: 0,
            payment_base_url: "https://demo-payment.smartcheckout.com/pay".to_string(),
        }
    }
}

/// Simulated payment strategy
pub struct DemoPaymentStrategy {
    config: DemoConfig,
}

impl DemoPaymentStrategy {
    pub fn new(config: DemoConfig) -> Self {
        Self { config }
    }

    fn should_fail(&self, forced: bool) -> bool {
        forced || rand::thread_rng().gen_range(1..=100u8) <= self.config.failure_rate
    }

    fn upi_payload(amount: f64, transaction_id: &str) -> String {
        format!(
            "upi://pay?pa=merchant@upi&pn=SmartCheckout&am={:.2}&cu=INR&tn={}",
            amount, transaction_id
        )
    }
}

#[async_trait]
impl PaymentStrategy for DemoPaymentStrategy {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn initiate(&self, request: &PaymentRequest) -> CheckoutResult<PaymentIntent> {
        let transaction_id = format!(
            "{}{}",
            DEMO_TXN_PREFIX,
            rand::thread_rng().gen_range(1_000_000_000u64..10_000_000_000u64)
        );

        if !self.config.delay.is_zero() {
            debug!("Simulating gateway delay of {:?}", self.config.delay);
            tokio::time::sleep(self.config.delay).await;
        }

        if self.should_fail(request.simulate_failure) {
            info!("Demo payment simulated failure: txn={}", transaction_id);
            return Ok(PaymentIntent {
                provider: PaymentProvider::Demo,
                provider_order_id: transaction_id,
                currency: request.amount.currency,
                payment_url: None,
                qr_payload: None,
                client_key: None,
                simulated_status: Some(PaymentStatus::Failed),
                raw: None,
            });
        }

        info!(
            "Demo payment created: txn={}, amount={}",
            transaction_id,
            request.amount.display()
        );

        Ok(PaymentIntent {
            provider: PaymentProvider::Demo,
            payment_url: Some(format!("{}/{}", self.config.payment_base_url, transaction_id)),
            qr_payload: Some(Self::upi_payload(request.amount.as_decimal(), &transaction_id)),
            provider_order_id: transaction_id,
            currency: request.amount.currency,
            client_key: None,
            simulated_status: Some(PaymentStatus::Success),
            raw: None,
        })
    }

    async fn confirm(&self, provider_order_id: &str) -> CheckoutResult<Option<String>> {
        Ok(provider_order_id
            .starts_with(DEMO_TXN_PREFIX)
            .then(|| provider_order_id.to_string()))
    }

    fn verify_signature(
        &self,
        _provider_order_id: &str,
        _provider_payment_id: &str,
        _signature: &str,
    ) -> CheckoutResult<bool> {
        Err(CheckoutError::Configuration(
            "Payment signature verification requires PAYMENT_MODE=razorpay".to_string(),
        ))
    }

    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Demo
    }
}

/// Demo-mode settlement notification body
#[derive(Debug, Deserialize)]
struct DemoNotification {
    #[serde(default, alias = "order_uuid")]
    order_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    provider_reference: Option<String>,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    payment_method: Option<String>,
    #[serde(default)]
    amount: Option<f64>,
}

/// Normalize a demo notification. `status == "success"` settles; anything else fails.
pub fn parse_demo_notification(payload: &serde_json::Value) -> CheckoutResult<SettlementEvent> {
    let notification: DemoNotification = serde_json::from_value(payload.clone())
        .map_err(|e| CheckoutError::WebhookParseError(format!("Invalid demo webhook: {}", e)))?;

    let order_ref = notification
        .order_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| CheckoutError::WebhookParseError("Missing order_uuid".to_string()))?;

    let kind = match notification.status.as_deref() {
        Some("success") => SettlementKind::Succeeded,
        _ => SettlementKind::Failed,
    };

    let reference = notification.provider_reference.or(notification.transaction_id);
    let amount_minor = notification.amount.map(|a| (a * 100.0).round() as i64);

    Ok(SettlementEvent::new(PaymentProvider::Demo, order_ref, kind)
        .with_reference(reference)
        .with_method(notification.payment_method)
        .with_amount(amount_minor)
        .with_raw(payload.clone()))
}
