//! Payment gateway adapter.
//!
//! Everything that talks to the external payment provider lives behind this
//! module: the lifecycle services never construct provider request shapes or
//! see provider error bodies. Signature verification is pure and synchronous;
//! the remote calls live on the [`PaymentGateway`] trait so tests can swap in
//! a mock.

pub mod http;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use utoipa::ToSchema;

use crate::errors::ServiceError;

pub use http::HttpPaymentGateway;

type HmacSha256 = Hmac<Sha256>;

/// Remote order created at the provider before capture.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RemoteOrder {
    pub gateway_order_ref: String,
    pub amount_minor: i64,
    pub currency: String,
}

/// Provider-side view of an order's payment progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RemoteOrderStatus {
    Created,
    Attempted,
    Paid,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates an order at the provider. `amount_minor` is the total in the
    /// provider's minor unit. `metadata` must carry enough to rebuild the
    /// local order from a webhook alone (owner, line items, address), since a
    /// webhook may be the only capture signal we ever receive. `receipt` is
    /// the idempotent request identifier; retries after an indeterminate
    /// outcome must reuse it.
    async fn create_remote_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
        metadata: Value,
    ) -> Result<RemoteOrder, ServiceError>;

    /// Fetches the provider's view of an order, for reconciliation after an
    /// indeterminate outcome.
    async fn fetch_order_status(
        &self,
        gateway_order_ref: &str,
    ) -> Result<RemoteOrderStatus, ServiceError>;

    /// Refunds the full captured amount of a payment. Returns the provider's
    /// refund identifier.
    async fn refund(&self, payment_ref: &str, amount_minor: i64) -> Result<String, ServiceError>;
}

/// Computes the hex HMAC-SHA256 signature the provider attaches to a
/// completed checkout: the message is `"{order_ref}|{payment_ref}"`.
pub fn payment_signature(gateway_order_ref: &str, payment_ref: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(gateway_order_ref.as_bytes());
    mac.update(b"|");
    mac.update(payment_ref.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a per-request payment signature in constant time.
pub fn verify_payment_signature(
    gateway_order_ref: &str,
    payment_ref: &str,
    signature: &str,
    secret: &str,
) -> bool {
    let expected = payment_signature(gateway_order_ref, payment_ref, secret);
    constant_time_eq(&expected, signature)
}

/// Verifies a webhook signature over the raw, unparsed body bytes. Parsing
/// and re-serializing JSON can reorder keys and change the byte sequence, so
/// this must run before any deserialization.
pub fn verify_webhook_signature(raw_body: &[u8], signature_header: &str, secret: &str) -> bool {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(raw_body);
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, signature_header)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_key_secret";

    #[test]
    fn payment_signature_round_trip() {
        let sig = payment_signature("order_abc", "pay_xyz", SECRET);
        assert!(verify_payment_signature("order_abc", "pay_xyz", &sig, SECRET));
    }

    #[test]
    fn payment_signature_rejects_mutation() {
        let sig = payment_signature("order_abc", "pay_xyz", SECRET);

        // Flip one byte of the signature
        let mut bytes = sig.into_bytes();
        bytes[0] = if bytes[0] == b'0' { b'1' } else { b'0' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert!(!verify_payment_signature(
            "order_abc",
            "pay_xyz",
            &tampered,
            SECRET
        ));
    }

    #[test]
    fn payment_signature_rejects_swapped_refs() {
        let sig = payment_signature("order_abc", "pay_xyz", SECRET);
        assert!(!verify_payment_signature("pay_xyz", "order_abc", &sig, SECRET));
    }

    #[test]
    fn payment_signature_rejects_wrong_secret() {
        let sig = payment_signature("order_abc", "pay_xyz", SECRET);
        assert!(!verify_payment_signature(
            "order_abc",
            "pay_xyz",
            &sig,
            "another_secret"
        ));
    }

    #[test]
    fn webhook_signature_covers_raw_bytes() {
        let body = br#"{"event":"payment.captured","payload":{}}"#;
        let mut mac = HmacSha256::new_from_slice(b"webhook_secret").unwrap();
        mac.update(body);
        let sig = hex::encode(mac.finalize().into_bytes());

        assert!(verify_webhook_signature(body, &sig, "webhook_secret"));

        // Reformatted body (one extra space) no longer verifies
        let reformatted = br#"{"event": "payment.captured","payload":{}}"#;
        assert!(!verify_webhook_signature(reformatted, &sig, "webhook_secret"));
    }

    #[test]
    fn webhook_signature_rejects_wrong_secret() {
        let body = br#"{"event":"payment.captured"}"#;
        let mut mac = HmacSha256::new_from_slice(b"webhook_secret").unwrap();
        mac.update(body);
        let sig = hex::encode(mac.finalize().into_bytes());

        assert!(!verify_webhook_signature(body, &sig, "key_secret"));
    }

    #[test]
    fn constant_time_eq_requires_equal_length() {
        assert!(!constant_time_eq("abcd", "abc"));
        assert!(constant_time_eq("abcd", "abcd"));
        assert!(!constant_time_eq("abcd", "abce"));
    }
}
