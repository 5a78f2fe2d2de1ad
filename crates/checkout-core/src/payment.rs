//! # Payment Types
//!
//! Payment records, provider initiation payloads and the normalized
//! settlement event that every webhook shape is reduced to.

use crate::product::{Currency, Price};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment backend tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    /// Simulated gateway, no network
    Demo,
    /// Razorpay orders API
    Razorpay,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Demo => "demo",
            PaymentProvider::Razorpay => "razorpay",
        }
    }

    /// Parse the `PAYMENT_MODE` setting
    pub fn from_mode(mode: &str) -> Option<Self> {
        match mode.trim().to_ascii_lowercase().as_str() {
            "demo" => Some(PaymentProvider::Demo),
            "razorpay" => Some(PaymentProvider::Razorpay),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment record status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

/// One payment per order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub provider: PaymentProvider,
    /// Provider-side order or transaction id (`order_...`, `DEMO_TXN_...`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Provider payment reference reported at settlement (`pay_...`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_reference: Option<String>,
    pub payment_method: String,
    pub amount: Price,
    pub status: PaymentStatus,
    /// Last raw gateway payload, kept opaque
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn pending(
        order_id: Uuid,
        provider: PaymentProvider,
        amount: Price,
        payment_method: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            provider,
            transaction_id: None,
            provider_reference: None,
            payment_method: payment_method.into(),
            amount,
            status: PaymentStatus::Pending,
            gateway_response: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
        }
    }
}

/// What a backend needs to create a payable intent
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub amount: Price,
    pub payment_method: String,
    /// Demo backend only: force a failed outcome
    pub simulate_failure: bool,
}

/// Provider-specific initiation payload.
///
/// A redirect-style backend fills `payment_url`/`qr_payload`; an SDK-style
/// backend fills `client_key`. Never both.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
    pub provider: PaymentProvider,
    /// Provider order / transaction id
    pub provider_order_id: String,
    pub currency: Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
    /// Outcome reported synchronously by the simulated gateway
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulated_status: Option<PaymentStatus>,
    #[serde(skip)]
    pub raw: Option<serde_json::Value>,
}

/// Settlement outcome carried by a normalized event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementKind {
    Succeeded,
    Failed,
}

/// Provider-independent settlement notification
#[derive(Debug, Clone, Serialize)]
pub struct SettlementEvent {
    pub provider: PaymentProvider,
    /// Raw order identifier as embedded by the sender
    pub order_ref: String,
    pub kind: SettlementKind,
    /// Provider payment reference (`pay_...`, demo reference)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    /// Amount reported by the sender, minor units
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_minor: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
    pub received_at: DateTime<Utc>,
}

impl SettlementEvent {
    pub fn new(
        provider: PaymentProvider,
        order_ref: impl Into<String>,
        kind: SettlementKind,
    ) -> Self {
        Self {
            provider,
            order_ref: order_ref.into(),
            kind,
            provider_reference: None,
            payment_method: None,
            amount_minor: None,
            raw: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.provider_reference = reference;
        self
    }

    pub fn with_method(mut self, method: Option<String>) -> Self {
        self.payment_method = method;
        self
    }

    pub fn with_amount(mut self, amount_minor: Option<i64>) -> Self {
        self.amount_minor = amount_minor;
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Embedded order id, if it parses
    pub fn order_id(&self) -> Option<Uuid> {
        Uuid::parse_str(self.order_ref.trim()).ok()
    }
}
