//! HMAC-SHA256 signatures used by Razorpay.
//!
//! - Payment signature: `hex(hmac(key_secret, "<order_id>|<payment_id>"))`
//! - Webhook signature: `hex(hmac(webhook_secret, raw_body))`
//!
//! Comparisons go through `Mac::verify_slice`, which is constant-time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of `message`
pub fn compute_hmac_sha256(secret: &str, message: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(message);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Check a hex signature over `message`. Malformed hex is a mismatch.
pub fn verify_hmac_sha256(secret: &str, message: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(message);
    mac.verify_slice(&signature).is_ok()
}

/// Verify the signature the checkout SDK returns after payment
pub fn verify_payment_signature(
    key_secret: &str,
    provider_order_id: &str,
    provider_payment_id: &str,
    signature: &str,
) -> bool {
    let message = format!("{}|{}", provider_order_id, provider_payment_id);
    verify_hmac_sha256(key_secret, message.as_bytes(), signature)
}

/// Verify the `X-Razorpay-Signature` header against the raw webhook body
pub fn verify_webhook_signature(webhook_secret: &str, body: &[u8], signature: &str) -> bool {
    verify_hmac_sha256(webhook_secret, body, signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_sha256_shape() {
        let sig = compute_hmac_sha256("secret", b"order_1|pay_1").unwrap();
        // 64-character hex string
        assert_eq!(sig.len(), 64);
        assert!(sig.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_payment_signature_round() {
        let sig = compute_hmac_sha256("key_secret", b"order_ABC|pay_XYZ").unwrap();
        assert!(verify_payment_signature("key_secret", "order_ABC", "pay_XYZ", &sig));
        assert!(!verify_payment_signature("key_secret", "order_ABC", "pay_OTHER", &sig));
        assert!(!verify_payment_signature("wrong", "order_ABC", "pay_XYZ", &sig));
    }

    #[test]
    fn test_webhook_signature_rejects_tampering() {
        let body = br#"{"event":"payment.captured"}"#;
        let sig = compute_hmac_sha256("whsec", body).unwrap();
        assert!(verify_webhook_signature("whsec", body, &sig));
        assert!(!verify_webhook_signature("whsec", br#"{"event":"payment.failed"}"#, &sig));
        assert!(!verify_webhook_signature("whsec", body, "not-hex"));
        assert!(!verify_webhook_signature("whsec", body, ""));
    }
}
