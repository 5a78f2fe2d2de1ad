//! # Settlement Webhooks
//!
//! One entry point for both webhook shapes. A payload whose `event` field
//! starts with `payment` is a Razorpay envelope and must carry a valid
//! `X-Razorpay-Signature`; anything else is a demo notification from inside
//! the trusted boundary, accepted unsigned only while the demo backend is
//! the configured one. Both are reduced to a `SettlementEvent` here so the
//! settlement logic never sees provider shapes.

use crate::signature::verify_webhook_signature;
use checkout_core::{
    parse_demo_notification, CheckoutError, CheckoutResult, PaymentProvider, SettlementEvent,
    SettlementKind,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Header carrying the Razorpay webhook signature
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Events to enable on the Razorpay dashboard
pub const REQUIRED_WEBHOOK_EVENTS: &[&str] = &["payment.captured", "payment.failed"];

/// Which sender a payload came from, judged by its shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookShape {
    Razorpay,
    Demo,
}

/// Discriminate on the `event` field
pub fn classify(payload: &serde_json::Value) -> WebhookShape {
    match payload.get("event").and_then(|e| e.as_str()) {
        Some(event) if event.starts_with("payment") => WebhookShape::Razorpay,
        _ => WebhookShape::Demo,
    }
}

/// Verify and normalize a webhook body.
///
/// Returns `Ok(None)` for events that carry nothing to settle (unhandled
/// event types, envelopes without an order reference); those are
/// acknowledged, not retried. Demo notifications are rejected unless
/// `accept_demo` is set.
pub fn normalize_webhook(
    body: &[u8],
    signature: Option<&str>,
    webhook_secret: Option<&str>,
    accept_demo: bool,
) -> CheckoutResult<Option<SettlementEvent>> {
    let payload: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| CheckoutError::WebhookParseError(format!("Invalid JSON: {}", e)))?;

    match classify(&payload) {
        WebhookShape::Demo if !accept_demo => {
            warn!("Unsigned demo notification received while demo payments are disabled");
            Err(CheckoutError::InvalidSignature(
                "demo notifications are not accepted".to_string(),
            ))
        }
        WebhookShape::Demo => {
            debug!("Demo settlement notification");
            parse_demo_notification(&payload).map(Some)
        }
        WebhookShape::Razorpay => {
            let signature = signature.filter(|s| !s.trim().is_empty()).ok_or_else(|| {
                CheckoutError::InvalidSignature("missing signature header".to_string())
            })?;
            let secret = webhook_secret.ok_or_else(|| {
                warn!("Razorpay webhook received but no webhook secret is configured");
                CheckoutError::InvalidSignature("webhook secret not configured".to_string())
            })?;
            if !verify_webhook_signature(secret, body, signature) {
                return Err(CheckoutError::InvalidSignature("signature mismatch".to_string()));
            }
            parse_razorpay_event(payload)
        }
    }
}

fn parse_razorpay_event(payload: serde_json::Value) -> CheckoutResult<Option<SettlementEvent>> {
    let envelope: RazorpayEnvelope = serde_json::from_value(payload.clone())
        .map_err(|e| CheckoutError::WebhookParseError(format!("Invalid Razorpay webhook: {}", e)))?;

    let kind = match envelope.event.as_str() {
        "payment.captured" => SettlementKind::Succeeded,
        "payment.failed" => SettlementKind::Failed,
        other => {
            debug!("Unhandled Razorpay event: {}", other);
            return Ok(None);
        }
    };

    let Some(entity) = envelope.payload.and_then(|p| p.payment).map(|p| p.entity) else {
        warn!("Razorpay {} without payment entity", envelope.event);
        return Ok(None);
    };

    let order_ref = entity
        .notes
        .get("order_uuid")
        .and_then(|v| v.as_str())
        .filter(|id| !id.trim().is_empty())
        .map(String::from);
    let Some(order_ref) = order_ref else {
        warn!("Razorpay {} for {} has no order_uuid note", envelope.event, entity.id);
        return Ok(None);
    };

    info!("Razorpay {} for payment {}", envelope.event, entity.id);

    Ok(Some(
        SettlementEvent::new(PaymentProvider::Razorpay, order_ref, kind)
            .with_reference(Some(entity.id))
            .with_method(entity.method)
            .with_amount(entity.amount)
            .with_raw(payload),
    ))
}

// =============================================================================
// Razorpay Webhook Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct RazorpayEnvelope {
    event: String,
    #[serde(default)]
    payload: Option<EnvelopePayload>,
}

#[derive(Debug, Deserialize)]
struct EnvelopePayload {
    #[serde(default)]
    payment: Option<PaymentWrapper>,
}

#[derive(Debug, Deserialize)]
struct PaymentWrapper {
    entity: PaymentEntity,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    #[serde(default)]
    amount: Option<i64>,
    #[serde(default)]
    method: Option<String>,
    /// Object of string notes; Razorpay sends `[]` when empty
    #[serde(default)]
    notes: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::compute_hmac_sha256;
    use serde_json::json;
    use uuid::Uuid;

    const SECRET: &str = "whsec_test";

    fn captured(order_id: Uuid) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "entity": "event",
            "event": "payment.captured",
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_123",
                        "amount": 12600,
                        "method": "upi",
                        "status": "captured",
                        "notes": { "order_uuid": order_id.to_string() }
                    }
                }
            }
        }))
        .unwrap()
    }

    fn demo_success(order_id: Uuid) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "order_uuid": order_id.to_string(),
            "status": "success",
            "amount": 126.0
        }))
        .unwrap()
    }

    fn live(body: &[u8], signature: Option<&str>) -> CheckoutResult<Option<SettlementEvent>> {
        normalize_webhook(body, signature, Some(SECRET), false)
    }

    #[test]
    fn test_classify_by_shape() {
        assert_eq!(
            classify(&json!({ "event": "payment.captured" })),
            WebhookShape::Razorpay
        );
        assert_eq!(classify(&json!({ "event": "order.paid" })), WebhookShape::Demo);
        assert_eq!(
            classify(&json!({ "order_uuid": "x", "status": "success" })),
            WebhookShape::Demo
        );
    }

    #[test]
    fn test_signed_capture_normalizes() {
        let order_id = Uuid::new_v4();
        let body = captured(order_id);
        let sig = compute_hmac_sha256(SECRET, &body).unwrap();

        let event = live(&body, Some(&sig)).unwrap().unwrap();
        assert_eq!(event.provider, PaymentProvider::Razorpay);
        assert_eq!(event.kind, SettlementKind::Succeeded);
        assert_eq!(event.order_id(), Some(order_id));
        assert_eq!(event.provider_reference.as_deref(), Some("pay_123"));
        assert_eq!(event.amount_minor, Some(12600));
        assert_eq!(event.payment_method.as_deref(), Some("upi"));
    }

    #[test]
    fn test_unsigned_or_forged_envelope_rejected() {
        let body = captured(Uuid::new_v4());

        let err = live(&body, None).unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidSignature(_)));

        let forged = compute_hmac_sha256("other", &body).unwrap();
        let err = live(&body, Some(&forged)).unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidSignature(_)));

        let sig = compute_hmac_sha256(SECRET, &body).unwrap();
        let err = normalize_webhook(&body, Some(&sig), None, true).unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidSignature(_)));
    }

    #[test]
    fn test_failed_and_unhandled_events() {
        let order_id = Uuid::new_v4();
        let failed = serde_json::to_vec(&json!({
            "event": "payment.failed",
            "payload": { "payment": { "entity": {
                "id": "pay_9",
                "notes": { "order_uuid": order_id.to_string() }
            }}}
        }))
        .unwrap();
        let sig = compute_hmac_sha256(SECRET, &failed).unwrap();
        let event = live(&failed, Some(&sig)).unwrap().unwrap();
        assert_eq!(event.kind, SettlementKind::Failed);

        let authorized = serde_json::to_vec(&json!({
            "event": "payment.authorized",
            "payload": { "payment": { "entity": { "id": "pay_9" } } }
        }))
        .unwrap();
        let sig = compute_hmac_sha256(SECRET, &authorized).unwrap();
        assert!(live(&authorized, Some(&sig)).unwrap().is_none());
    }

    #[test]
    fn test_capture_without_order_note_is_acknowledged() {
        let body = serde_json::to_vec(&json!({
            "event": "payment.captured",
            "payload": { "payment": { "entity": { "id": "pay_1", "notes": [] } } }
        }))
        .unwrap();
        let sig = compute_hmac_sha256(SECRET, &body).unwrap();
        assert!(live(&body, Some(&sig)).unwrap().is_none());
    }

    #[test]
    fn test_demo_notification_needs_no_signature() {
        let order_id = Uuid::new_v4();
        let body = demo_success(order_id);

        let event = normalize_webhook(&body, None, None, true).unwrap().unwrap();
        assert_eq!(event.provider, PaymentProvider::Demo);
        assert_eq!(event.kind, SettlementKind::Succeeded);
        assert_eq!(event.order_id(), Some(order_id));
    }

    #[test]
    fn test_demo_notification_rejected_when_demo_disabled() {
        let body = demo_success(Uuid::new_v4());

        let err = live(&body, None).unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidSignature(_)));

        let sig = compute_hmac_sha256(SECRET, &body).unwrap();
        let err = live(&body, Some(&sig)).unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidSignature(_)));
    }

    #[test]
    fn test_garbage_body() {
        let err = normalize_webhook(b"not json", None, None, true).unwrap_err();
        assert!(matches!(err, CheckoutError::WebhookParseError(_)));
    }
}
