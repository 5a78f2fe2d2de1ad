//! # Order Types
//!
//! Orders, their captured line items and the lifecycle status machine.
//!
//! ```text
//! pending ──► paid ──► verified
//!    │          ▲
//!    ├──► payment_failed
//!    └──► expired
//! ```

use crate::product::{Currency, Price, Product};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tax applied to every order, in basis points (5%)
pub const TAX_RATE_BPS: i64 = 500;

/// How long a pending order waits for payment
pub const ORDER_PAYMENT_WINDOW_MINUTES: i64 = 15;

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, awaiting payment
    Pending,
    /// Settlement confirmed
    Paid,
    /// Settlement reported failure
    PaymentFailed,
    /// Exit pass issued
    Verified,
    /// Payment window elapsed
    Expired,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::PaymentFailed => "payment_failed",
            OrderStatus::Verified => "verified",
            OrderStatus::Expired => "expired",
        }
    }

    /// Money has been collected for this order
    pub fn is_settled(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Verified)
    }

    /// Whether the machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Paid)
                | (Pending, PaymentFailed)
                | (Pending, Expired)
                | (PaymentFailed, Pending)
                | (PaymentFailed, Paid)
                | (Expired, Paid)
                | (Paid, Verified)
                | (Verified, Verified)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line item captured at order time (immune to later catalog edits)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_sku: String,
    pub price: Price,
    pub quantity: u32,
    pub subtotal: Price,
}

impl OrderItem {
    /// Snapshot a product at its current price
    pub fn capture(order_id: Uuid, product: &Product, quantity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            product_id: product.id,
            product_name: product.name.clone(),
            product_sku: product.sku.clone(),
            price: product.price,
            quantity,
            subtotal: product.price.times(quantity),
        }
    }
}

/// Subtotal, tax and total for a set of lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Price,
    pub tax: Price,
    pub total: Price,
    pub items_count: u32,
}

impl OrderTotals {
    /// Sum line subtotals and apply the fixed tax rate, rounding half-up to the minor unit
    pub fn from_items<'a>(
        items: impl IntoIterator<Item = &'a OrderItem>,
        currency: Currency,
    ) -> Self {
        let mut subtotal = 0i64;
        let mut items_count = 0u32;
        for item in items {
            subtotal += item.subtotal.amount;
            items_count += item.quantity;
        }
        let tax = tax_on(subtotal);
        Self {
            subtotal: Price::from_minor(subtotal, currency),
            tax: Price::from_minor(tax, currency),
            total: Price::from_minor(subtotal + tax, currency),
            items_count,
        }
    }
}

/// An order converted from a cart snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub subtotal: Price,
    pub tax: Price,
    pub total: Price,
    pub items_count: u32,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Build a pending order; the caller persists the captured items alongside it
    pub fn pending(
        id: Uuid,
        user_id: Uuid,
        order_number: String,
        totals: OrderTotals,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            order_number,
            user_id,
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
            items_count: totals.items_count,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            expires_at: Some(now + Duration::minutes(ORDER_PAYMENT_WINDOW_MINUTES)),
        }
    }

    /// Status as observed at `now`; a pending order past its window reads as expired
    pub fn effective_status(&self, now: DateTime<Utc>) -> OrderStatus {
        match (self.status, self.expires_at) {
            (OrderStatus::Pending, Some(expires_at)) if now > expires_at => OrderStatus::Expired,
            (status, _) => status,
        }
    }

    /// Apply a transition if the machine allows it
    pub fn transition(&mut self, next: OrderStatus, now: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.updated_at = now;
        true
    }

    /// Reopen a failed order for another attempt with a fresh payment window
    pub fn rearm(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != OrderStatus::PaymentFailed
            || !self.transition(OrderStatus::Pending, now)
        {
            return false;
        }
        self.expires_at = Some(now + Duration::minutes(ORDER_PAYMENT_WINDOW_MINUTES));
        true
    }
}

/// Tax on a minor-unit subtotal, rounded half-up to the minor unit
pub fn tax_on(subtotal_minor: i64) -> i64 {
    (subtotal_minor * TAX_RATE_BPS + 5_000) / 10_000
}

/// Generate a candidate order number: `ORD-<YYYYMMDD>-<6 digits>`
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("ORD-{}-{:06}", now.format("%Y%m%d"), suffix)
}

/// Check the `ORD-YYYYMMDD-######` shape
pub fn is_valid_order_number(candidate: &str) -> bool {
    let parts: Vec<&str> = candidate.split('-').collect();
    parts.len() == 3
        && parts[0] == "ORD"
        && parts[1].len() == 8
        && parts[1].bytes().all(|b| b.is_ascii_digit())
        && parts[2].len() == 6
        && parts[2].bytes().all(|b| b.is_ascii_digit())
}
