//! # Settlement Processor
//!
//! Applies normalized settlement events to orders and payments.
//!
//! Idempotence is keyed on the order's status transition: only the move
//! into `paid` decrements stock and schedules a downstream notice, so a
//! replayed event finds the order settled and becomes a no-op. The stock
//! decrement and the status writes share one unit of work; the notice is
//! sent after the lock is released and its failure is only logged.

use crate::error::CheckoutResult;
use crate::order::OrderStatus;
use crate::payment::{Payment, PaymentStatus, SettlementEvent, SettlementKind};
use crate::store::{StockDecrement, Store, Tables};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Payment method recorded when the sender reports none
const DEFAULT_PAYMENT_METHOD: &str = "upi";

/// Downstream automation payload for a successful settlement
#[derive(Debug, Clone, Serialize)]
pub struct SettlementNotice {
    pub event: &'static str,
    pub order_id: Uuid,
    pub order_number: String,
    /// Major units
    pub amount: f64,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

/// Outbound notification sink (best effort)
#[async_trait]
pub trait SettlementNotifier: Send + Sync {
    async fn notify(&self, notice: &SettlementNotice) -> CheckoutResult<()>;
}

/// Notifier that only writes the notice to the log
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

#[async_trait]
impl SettlementNotifier for LoggingNotifier {
    async fn notify(&self, notice: &SettlementNotice) -> CheckoutResult<()> {
        info!(
            "Settlement notice (not delivered): order={}, amount={:.2}",
            notice.order_number, notice.amount
        );
        Ok(())
    }
}

/// What applying an event did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// Order moved to `status`
    Applied { status: OrderStatus },
    /// Order already in the target state; nothing changed
    Duplicate,
    /// Embedded order unknown; acknowledged so the sender stops retrying
    OrderNotFound,
    /// Event does not apply to the order's current state
    Ignored,
}

/// Settles orders from normalized events
#[derive(Clone)]
pub struct SettlementProcessor {
    store: Arc<Store>,
    notifier: Arc<dyn SettlementNotifier>,
}

impl SettlementProcessor {
    pub fn new(store: Arc<Store>, notifier: Arc<dyn SettlementNotifier>) -> Self {
        Self { store, notifier }
    }

    /// Apply one event. Errors only for transient store failures, which the
    /// sender should retry.
    #[instrument(skip(self, event), fields(order_ref = %event.order_ref, kind = ?event.kind))]
    pub async fn apply(&self, event: SettlementEvent) -> CheckoutResult<SettlementOutcome> {
        let Some(order_id) = event.order_id() else {
            warn!("Settlement for unparseable order reference {:?}", event.order_ref);
            return Ok(SettlementOutcome::OrderNotFound);
        };

        let now = Utc::now();
        let (outcome, notice) = {
            let mut tables = self.store.write().await?;
            match event.kind {
                SettlementKind::Succeeded => settle_success(&mut tables, order_id, &event, now),
                SettlementKind::Failed => {
                    (settle_failure(&mut tables, order_id, &event, now), None)
                }
            }
        };

        if let Some(notice) = notice {
            if let Err(e) = self.notifier.notify(&notice).await {
                error!("Settlement notice for {} failed: {}", notice.order_number, e);
            }
        }

        Ok(outcome)
    }
}

fn settle_success(
    tables: &mut Tables,
    order_id: Uuid,
    event: &SettlementEvent,
    now: DateTime<Utc>,
) -> (SettlementOutcome, Option<SettlementNotice>) {
    let Some(order) = tables.order(order_id) else {
        warn!("Settlement for unknown order {}", order_id);
        return (SettlementOutcome::OrderNotFound, None);
    };

    if order.status.is_settled() {
        debug!("Order {} already settled, skipping replay", order.order_number);
        return (SettlementOutcome::Duplicate, None);
    }

    if let Some(amount) = event.amount_minor {
        if amount != order.total.amount {
            warn!(
                "Settlement amount {} differs from order total {} for {}",
                amount, order.total.amount, order.order_number
            );
        }
    }

    let items: Vec<(Uuid, u32, String)> = tables
        .order_items(order_id)
        .iter()
        .map(|i| (i.product_id, i.quantity, i.product_sku.clone()))
        .collect();
    for (product_id, quantity, sku) in items {
        match tables.decrement_stock(product_id, quantity) {
            StockDecrement::Applied { remaining } => {
                debug!("Stock for {} now {}", sku, remaining);
            }
            StockDecrement::Insufficient { available } => {
                let taken = tables.drain_stock(product_id);
                warn!(
                    "Oversold {}: needed {}, had {} (took {})",
                    sku, quantity, available, taken
                );
            }
            StockDecrement::Missing => {
                warn!("Product {} ({}) missing at settlement", sku, product_id);
            }
        }
    }

    let Some(order) = tables.order_mut(order_id) else {
        return (SettlementOutcome::OrderNotFound, None);
    };
    let from = order.status;
    order.transition(OrderStatus::Paid, now);
    let (order_number, total, user_id) = (order.order_number.clone(), order.total, order.user_id);

    if tables.payment_for_order(order_id).is_none() {
        let method = event
            .payment_method
            .clone()
            .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string());
        tables.upsert_payment(Payment::pending(order_id, event.provider, total, method, now));
    }
    let Some(payment) = tables.payment_for_order_mut(order_id) else {
        return (SettlementOutcome::Applied { status: OrderStatus::Paid }, None);
    };
    payment.status = PaymentStatus::Success;
    if event.provider_reference.is_some() {
        payment.provider_reference = event.provider_reference.clone();
    }
    if let Some(method) = &event.payment_method {
        payment.payment_method = method.clone();
    }
    if event.raw.is_some() {
        payment.gateway_response = event.raw.clone();
    }
    payment.paid_at = Some(now);
    payment.updated_at = now;
    let transaction_id = payment
        .provider_reference
        .clone()
        .or_else(|| payment.transaction_id.clone());

    info!(
        "Order {} settled ({} -> paid) via {}",
        order_number, from, event.provider
    );

    let notice = SettlementNotice {
        event: "payment_success",
        order_id,
        order_number,
        amount: total.as_decimal(),
        user_id,
        transaction_id,
    };
    (SettlementOutcome::Applied { status: OrderStatus::Paid }, Some(notice))
}

fn settle_failure(
    tables: &mut Tables,
    order_id: Uuid,
    event: &SettlementEvent,
    now: DateTime<Utc>,
) -> SettlementOutcome {
    let Some(order) = tables.order_mut(order_id) else {
        warn!("Failure event for unknown order {}", order_id);
        return SettlementOutcome::OrderNotFound;
    };

    match order.status {
        OrderStatus::PaymentFailed => return SettlementOutcome::Duplicate,
        status if status.is_settled() => {
            info!("Ignoring failure event for settled order {}", order.order_number);
            return SettlementOutcome::Ignored;
        }
        _ => {}
    }

    if !order.transition(OrderStatus::PaymentFailed, now) {
        debug!("Failure event does not apply to {} order", order.status);
        return SettlementOutcome::Ignored;
    }
    let order_number = order.order_number.clone();

    if let Some(payment) = tables.payment_for_order_mut(order_id) {
        payment.status = PaymentStatus::Failed;
        if event.raw.is_some() {
            payment.gateway_response = event.raw.clone();
        }
        payment.updated_at = now;
    }

    info!("Order {} payment failed via {}", order_number, event.provider);
    SettlementOutcome::Applied {
        status: OrderStatus::PaymentFailed,
    }
}
