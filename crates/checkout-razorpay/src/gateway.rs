//! # Razorpay Orders
//!
//! Live payment backend over the Razorpay Orders API.
//! The client SDK completes payment using the returned order id and key id;
//! settlement arrives by webhook, client signature or reconciliation.

use crate::config::RazorpayConfig;
use crate::signature::verify_payment_signature;
use async_trait::async_trait;
use checkout_core::{
    CheckoutError, CheckoutResult, Currency, PaymentIntent, PaymentProvider, PaymentRequest,
    PaymentStrategy,
};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

const PROVIDER: &str = "razorpay";

/// Razorpay orders strategy
pub struct RazorpayStrategy {
    config: RazorpayConfig,
    client: Client,
}

impl RazorpayStrategy {
    /// Create a new Razorpay strategy
    pub fn new(config: RazorpayConfig) -> CheckoutResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                CheckoutError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> CheckoutResult<Self> {
        Self::new(RazorpayConfig::from_env()?)
    }

    pub fn config(&self) -> &RazorpayConfig {
        &self.config
    }

    fn transport_error(e: reqwest::Error) -> CheckoutError {
        if e.is_timeout() {
            warn!("Razorpay request timed out");
            CheckoutError::ProviderTimeout {
                provider: PROVIDER.to_string(),
            }
        } else {
            CheckoutError::NetworkError(e.to_string())
        }
    }

    /// Read a response body, mapping non-2xx statuses to typed errors
    async fn read_body(response: Response) -> CheckoutResult<String> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            return Err(CheckoutError::RateLimited {
                provider: PROVIDER.to_string(),
                retry_after_secs,
            });
        }

        let body = response.text().await.map_err(Self::transport_error)?;

        if !status.is_success() {
            error!("Razorpay API error: status={}, body={}", status, body);

            // Parse Razorpay error
            if let Ok(error_response) = serde_json::from_str::<RazorpayErrorResponse>(&body) {
                return Err(CheckoutError::ProviderError {
                    provider: PROVIDER.to_string(),
                    message: error_response.error.description,
                });
            }

            return Err(CheckoutError::ProviderError {
                provider: PROVIDER.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl PaymentStrategy for RazorpayStrategy {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn initiate(&self, request: &PaymentRequest) -> CheckoutResult<PaymentIntent> {
        if request.amount.amount <= 0 {
            return Err(CheckoutError::InvalidRequest(
                "Payment amount must be positive".to_string(),
            ));
        }
        if request.amount.currency != self.config.currency {
            warn!(
                "Order currency {} differs from configured {}",
                request.amount.currency, self.config.currency
            );
        }

        let body = CreateOrderRequest {
            amount: request.amount.amount,
            currency: request.amount.currency.as_str(),
            receipt: request.order_id.to_string(),
            notes: OrderNotes {
                order_uuid: request.order_id.to_string(),
                user_uuid: request.user_id.to_string(),
                order_number: request.order_number.clone(),
            },
        };

        debug!(
            "Creating Razorpay order: amount={} {}",
            body.amount, body.currency
        );

        let url = format!("{}/v1/orders", self.config.api_base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let body = Self::read_body(response).await?;
        let raw: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            CheckoutError::Serialization(format!("Failed to parse Razorpay response: {}", e))
        })?;
        let order: RazorpayOrder = serde_json::from_value(raw.clone()).map_err(|e| {
            CheckoutError::Serialization(format!("Failed to parse Razorpay order: {}", e))
        })?;

        info!(
            "Created Razorpay order: id={}, amount={}, status={}",
            order.id, order.amount, order.status
        );

        Ok(PaymentIntent {
            provider: PaymentProvider::Razorpay,
            currency: Currency::parse(&order.currency).unwrap_or(request.amount.currency),
            provider_order_id: order.id,
            payment_url: None,
            qr_payload: None,
            client_key: Some(self.config.key_id.clone()),
            simulated_status: None,
            raw: Some(raw),
        })
    }

    #[instrument(skip(self))]
    async fn confirm(&self, provider_order_id: &str) -> CheckoutResult<Option<String>> {
        let url = format!(
            "{}/v1/orders/{}/payments",
            self.config.api_base_url, provider_order_id
        );
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .send()
            .await
            .map_err(Self::transport_error)?;

        let body = Self::read_body(response).await?;
        let payments: PaymentCollection = serde_json::from_str(&body).map_err(|e| {
            CheckoutError::Serialization(format!("Failed to parse Razorpay payments: {}", e))
        })?;

        let captured = payments
            .items
            .into_iter()
            .find(|p| p.status == "captured")
            .map(|p| p.id);
        debug!("Razorpay order {} captured payment: {:?}", provider_order_id, captured);
        Ok(captured)
    }

    fn verify_signature(
        &self,
        provider_order_id: &str,
        provider_payment_id: &str,
        signature: &str,
    ) -> CheckoutResult<bool> {
        Ok(verify_payment_signature(
            &self.config.key_secret,
            provider_order_id,
            provider_payment_id,
            signature,
        ))
    }

    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Razorpay
    }
}

// =============================================================================
// Razorpay API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct CreateOrderRequest {
    /// Minor units
    amount: i64,
    currency: &'static str,
    receipt: String,
    notes: OrderNotes,
}

#[derive(Debug, Serialize)]
struct OrderNotes {
    order_uuid: String,
    user_uuid: String,
    order_number: String,
}

#[derive(Debug, Deserialize)]
struct RazorpayOrder {
    id: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct PaymentCollection {
    #[serde(default)]
    items: Vec<PaymentEntity>,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct RazorpayErrorResponse {
    error: RazorpayError,
}

#[derive(Debug, Deserialize)]
struct RazorpayError {
    #[serde(default)]
    description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::compute_hmac_sha256;
    use checkout_core::Price;
    use serde_json::json;
    use std::time::Duration;
    use uuid::Uuid;
    use wiremock::matchers::{basic_auth, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn strategy(server: &MockServer) -> RazorpayStrategy {
        let config = RazorpayConfig::new("rzp_test_key", "key_secret", "whsec")
            .with_api_base_url(server.uri())
            .with_timeout(Duration::from_millis(200));
        RazorpayStrategy::new(config).unwrap()
    }

    fn request() -> PaymentRequest {
        PaymentRequest {
            order_id: Uuid::new_v4(),
            order_number: "ORD-20240101-123456".to_string(),
            user_id: Uuid::new_v4(),
            amount: Price::new(126.0, Currency::INR),
            payment_method: "upi".to_string(),
            simulate_failure: false,
        }
    }

    #[tokio::test]
    async fn test_initiate_creates_gateway_order() {
        let server = MockServer::start().await;
        let req = request();

        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .and(basic_auth("rzp_test_key", "key_secret"))
            .and(body_partial_json(json!({
                "amount": 12600,
                "currency": "INR",
                "receipt": req.order_id.to_string(),
                "notes": { "order_uuid": req.order_id.to_string() }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "order_ABC123",
                "amount": 12600,
                "currency": "INR",
                "status": "created",
                "created_at": 1700000000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let intent = strategy(&server).initiate(&req).await.unwrap();
        assert_eq!(intent.provider_order_id, "order_ABC123");
        assert_eq!(intent.client_key.as_deref(), Some("rzp_test_key"));
        assert!(intent.payment_url.is_none());
        assert!(intent.raw.is_some());
    }

    #[tokio::test]
    async fn test_provider_rejection_is_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": "BAD_REQUEST_ERROR",
                    "description": "Authentication failed"
                }
            })))
            .mount(&server)
            .await;

        let err = strategy(&server).initiate(&request()).await.unwrap_err();
        match err {
            CheckoutError::ProviderError { ref message, .. } => {
                assert_eq!(message, "Authentication failed")
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_slow_gateway_surfaces_retryable_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": "order_late", "amount": 1, "currency": "INR" }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = strategy(&server).initiate(&request()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::ProviderTimeout { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let err = strategy(&server).initiate(&request()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::RateLimited { retry_after_secs: 7, .. }));
    }

    #[tokio::test]
    async fn test_confirm_finds_captured_payment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/orders/order_ABC123/payments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entity": "collection",
                "count": 2,
                "items": [
                    { "id": "pay_failed", "status": "failed" },
                    { "id": "pay_ok", "status": "captured" }
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/orders/order_EMPTY/payments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
            .mount(&server)
            .await;

        let strategy = strategy(&server);
        assert_eq!(
            strategy.confirm("order_ABC123").await.unwrap().as_deref(),
            Some("pay_ok")
        );
        assert_eq!(strategy.confirm("order_EMPTY").await.unwrap(), None);
    }

    #[test]
    fn test_verify_signature_uses_key_secret() {
        let config = RazorpayConfig::new("rzp_test_key", "key_secret", "whsec");
        let strategy = RazorpayStrategy::new(config).unwrap();
        let good = compute_hmac_sha256("key_secret", b"order_A|pay_B").unwrap();

        assert!(strategy.verify_signature("order_A", "pay_B", &good).unwrap());
        assert!(!strategy.verify_signature("order_A", "pay_C", &good).unwrap());
        assert!(!strategy.is_demo());
    }
}
