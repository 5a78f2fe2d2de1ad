//! # Payment Service
//!
//! Drives payment initiation against the configured backend and routes every
//! confirmation path (client signature, demo shortcut, reconciliation)
//! through the settlement processor.
//!
//! The backend call happens outside the store lock. The order is checked
//! before the call and re-checked when the payment row is written, so a
//! request abandoned mid-call leaves no half-created payment behind.

use crate::error::{CheckoutError, CheckoutResult};
use crate::order::OrderStatus;
use crate::payment::{
    Payment, PaymentIntent, PaymentProvider, PaymentRequest, PaymentStatus, SettlementEvent,
    SettlementKind,
};
use crate::product::Price;
use crate::settlement::{SettlementOutcome, SettlementProcessor};
use crate::store::{Store, Tables};
use crate::strategy::BoxedPaymentStrategy;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Response to a successful initiation
#[derive(Debug, Clone, Serialize)]
pub struct InitiatedPayment {
    pub payment_id: Uuid,
    pub order_id: Uuid,
    pub order_number: String,
    pub amount: Price,
    pub status: PaymentStatus,
    #[serde(flatten)]
    pub intent: PaymentIntent,
}

/// Owner-facing view of a payment record
#[derive(Debug, Clone, Serialize)]
pub struct PaymentView {
    pub payment_id: Uuid,
    pub order_id: Uuid,
    pub provider: PaymentProvider,
    pub status: PaymentStatus,
    pub amount: Price,
    pub payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentView {
    fn from(payment: &Payment) -> Self {
        Self {
            payment_id: payment.id,
            order_id: payment.order_id,
            provider: payment.provider,
            status: payment.status,
            amount: payment.amount,
            payment_method: payment.payment_method.clone(),
            provider_order_id: payment.transaction_id.clone(),
            reference: payment.provider_reference.clone(),
            paid_at: payment.paid_at,
            created_at: payment.created_at,
        }
    }
}

/// Result of a confirmation that settled (or had already settled) an order
#[derive(Debug, Clone, Serialize)]
pub struct SettledOrder {
    pub verified: bool,
    pub order_id: Uuid,
    pub order_number: String,
    pub order_status: OrderStatus,
    pub outcome: SettlementOutcome,
}

/// Payment entry points
#[derive(Clone)]
pub struct PaymentService {
    store: Arc<Store>,
    strategy: BoxedPaymentStrategy,
    settlement: SettlementProcessor,
}

impl PaymentService {
    pub fn new(
        store: Arc<Store>,
        strategy: BoxedPaymentStrategy,
        settlement: SettlementProcessor,
    ) -> Self {
        Self {
            store,
            strategy,
            settlement,
        }
    }

    pub fn provider(&self) -> PaymentProvider {
        self.strategy.provider()
    }

    /// Start (or restart) payment for an order
    #[instrument(skip(self), fields(provider = %self.strategy.provider()))]
    pub async fn initiate_payment(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        payment_method: &str,
        simulate_failure: bool,
    ) -> CheckoutResult<InitiatedPayment> {
        let request = {
            let now = Utc::now();
            let mut tables = self.store.write().await?;
            let order = tables.order(order_id).ok_or(CheckoutError::OrderNotFound)?;
            if order.user_id != user_id {
                return Err(CheckoutError::NotAuthorized);
            }
            match order.effective_status(now) {
                status if status.is_settled() => return Err(CheckoutError::AlreadyPaid),
                OrderStatus::Expired => {
                    if let Some(order) = tables.order_mut(order_id) {
                        order.transition(OrderStatus::Expired, now);
                    }
                    return Err(CheckoutError::OrderExpired);
                }
                _ => {}
            }
            PaymentRequest {
                order_id,
                order_number: order.order_number.clone(),
                user_id,
                amount: order.total,
                payment_method: payment_method.to_string(),
                simulate_failure,
            }
        };

        let intent = self.strategy.initiate(&request).await?;

        let now = Utc::now();
        let mut tables = self.store.write().await?;
        let order = tables.order(order_id).ok_or(CheckoutError::OrderNotFound)?;
        if order.status.is_settled() {
            return Err(CheckoutError::AlreadyPaid);
        }
        let order_number = order.order_number.clone();

        let payment_id = record_pending_payment(&mut tables, &request, &intent, now);
        if let Some(order) = tables.order_mut(order_id) {
            order.rearm(now);
        }

        info!(
            "Payment initiated for {}: provider_order_id={}, amount={}",
            order_number,
            intent.provider_order_id,
            request.amount.display()
        );

        Ok(InitiatedPayment {
            payment_id,
            order_id,
            order_number,
            amount: request.amount,
            status: PaymentStatus::Pending,
            intent,
        })
    }

    /// Read one of the caller's payments. A foreign payment reads as not found.
    pub async fn payment_status(
        &self,
        user_id: Uuid,
        payment_id: Uuid,
    ) -> CheckoutResult<PaymentView> {
        let tables = self.store.read().await?;
        owned_payment(&tables, user_id, payment_id).map(PaymentView::from)
    }

    /// Settle an order from a client-side signed payment confirmation
    #[instrument(skip(self, signature))]
    pub async fn verify_live_payment(
        &self,
        user_id: Uuid,
        provider_order_id: &str,
        provider_payment_id: &str,
        signature: &str,
    ) -> CheckoutResult<SettledOrder> {
        if !self
            .strategy
            .verify_signature(provider_order_id, provider_payment_id, signature)?
        {
            warn!("Payment signature mismatch for {}", provider_order_id);
            return Err(CheckoutError::InvalidSignature(
                "payment signature mismatch".to_string(),
            ));
        }

        let (order_id, method) = {
            let tables = self.store.read().await?;
            let payment = tables
                .payment_by_transaction(provider_order_id)
                .ok_or(CheckoutError::PaymentNotFound)?;
            let order = tables
                .order(payment.order_id)
                .ok_or(CheckoutError::OrderNotFound)?;
            if order.user_id != user_id {
                return Err(CheckoutError::NotAuthorized);
            }
            (order.id, payment.payment_method.clone())
        };

        let event = SettlementEvent::new(
            self.strategy.provider(),
            order_id.to_string(),
            SettlementKind::Succeeded,
        )
        .with_reference(Some(provider_payment_id.to_string()))
        .with_method(Some(method));
        let outcome = self.settlement.apply(event).await?;
        self.settled(order_id, outcome).await
    }

    /// Operator shortcut: settle a demo order synchronously
    #[instrument(skip(self))]
    pub async fn demo_complete(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> CheckoutResult<SettledOrder> {
        if !self.strategy.is_demo() {
            return Err(CheckoutError::DemoModeDisabled);
        }

        let (reference, method) = {
            let tables = self.store.read().await?;
            let order = tables.order(order_id).ok_or(CheckoutError::OrderNotFound)?;
            if order.user_id != user_id {
                return Err(CheckoutError::NotAuthorized);
            }
            if order.status.is_settled() {
                return Err(CheckoutError::AlreadyPaid);
            }
            let payment = tables.payment_for_order(order_id);
            (
                payment.and_then(|p| p.transaction_id.clone()),
                payment.map(|p| p.payment_method.clone()),
            )
        };

        let event = SettlementEvent::new(
            PaymentProvider::Demo,
            order_id.to_string(),
            SettlementKind::Succeeded,
        )
        .with_reference(reference)
        .with_method(method);
        match self.settlement.apply(event).await? {
            SettlementOutcome::Duplicate => Err(CheckoutError::AlreadyPaid),
            SettlementOutcome::OrderNotFound => Err(CheckoutError::OrderNotFound),
            outcome => self.settled(order_id, outcome).await,
        }
    }

    /// Ask the backend whether a pending payment has settled, applying the
    /// settlement if it has
    #[instrument(skip(self))]
    pub async fn reconcile(&self, user_id: Uuid, payment_id: Uuid) -> CheckoutResult<PaymentView> {
        let (order_id, provider, transaction_id, method) = {
            let tables = self.store.read().await?;
            let payment = owned_payment(&tables, user_id, payment_id)?;
            if payment.status == PaymentStatus::Success {
                return Ok(PaymentView::from(payment));
            }
            (
                payment.order_id,
                payment.provider,
                payment.transaction_id.clone(),
                payment.payment_method.clone(),
            )
        };

        let Some(transaction_id) = transaction_id else {
            return self.payment_status(user_id, payment_id).await;
        };
        if provider != self.strategy.provider() {
            warn!(
                "Payment {} was made with {}, current backend is {}",
                payment_id,
                provider,
                self.strategy.provider()
            );
            return self.payment_status(user_id, payment_id).await;
        }

        if let Some(reference) = self.strategy.confirm(&transaction_id).await? {
            let event =
                SettlementEvent::new(provider, order_id.to_string(), SettlementKind::Succeeded)
                    .with_reference(Some(reference))
                    .with_method(Some(method));
            let outcome = self.settlement.apply(event).await?;
            info!("Reconciled payment {}: {:?}", payment_id, outcome);
        }

        self.payment_status(user_id, payment_id).await
    }

    async fn settled(
        &self,
        order_id: Uuid,
        outcome: SettlementOutcome,
    ) -> CheckoutResult<SettledOrder> {
        let tables = self.store.read().await?;
        let order = tables.order(order_id).ok_or(CheckoutError::OrderNotFound)?;
        Ok(SettledOrder {
            verified: order.status.is_settled(),
            order_id,
            order_number: order.order_number.clone(),
            order_status: order.status,
            outcome,
        })
    }
}

/// Update the order's payment row for a new intent, or create it.
/// A settled payment is never overwritten.
fn record_pending_payment(
    tables: &mut Tables,
    request: &PaymentRequest,
    intent: &PaymentIntent,
    now: DateTime<Utc>,
) -> Uuid {
    if let Some(payment) = tables
        .payment_for_order_mut(request.order_id)
        .filter(|p| p.status != PaymentStatus::Success)
    {
        payment.provider = intent.provider;
        payment.transaction_id = Some(intent.provider_order_id.clone());
        payment.provider_reference = None;
        payment.payment_method = request.payment_method.clone();
        payment.amount = request.amount;
        payment.status = PaymentStatus::Pending;
        payment.gateway_response = intent.raw.clone();
        payment.updated_at = now;
        return payment.id;
    }

    let mut payment = Payment::pending(
        request.order_id,
        intent.provider,
        request.amount,
        request.payment_method.clone(),
        now,
    );
    payment.transaction_id = Some(intent.provider_order_id.clone());
    payment.gateway_response = intent.raw.clone();
    let id = payment.id;
    tables.upsert_payment(payment);
    id
}

fn owned_payment(tables: &Tables, user_id: Uuid, payment_id: Uuid) -> CheckoutResult<&Payment> {
    let payment = tables.payment(payment_id).ok_or(CheckoutError::PaymentNotFound)?;
    match tables.order(payment.order_id) {
        Some(order) if order.user_id == user_id => Ok(payment),
        _ => Err(CheckoutError::PaymentNotFound),
    }
}
