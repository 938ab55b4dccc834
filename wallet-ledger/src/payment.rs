//! Payment signature verification
//!
//! The payment gateway signs completed payments with
//! HMAC-SHA256(secret, order_id + "|" + payment_id), hex-encoded.
//! Verification recomputes the digest and compares it byte-for-byte
//! against the supplied signature. This is a pure function and the
//! required gate before any credit is applied.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify a payment signature
///
/// Returns `true` only when `signature` is the hex HMAC-SHA256 digest
/// of `order_id + "|" + payment_id` under `shared_secret`.
pub fn verify_payment_signature(
    order_id: &str,
    payment_id: &str,
    signature: &str,
    shared_secret: &str,
) -> bool {
    let expected = compute_payment_signature(order_id, payment_id, shared_secret);
    expected.as_bytes() == signature.as_bytes()
}

/// Compute the expected hex signature for a payment event
pub fn compute_payment_signature(order_id: &str, payment_id: &str, shared_secret: &str) -> String {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(shared_secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());

    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_signature_verifies() {
        let sig = compute_payment_signature("order_1", "pay_1", "secret");
        assert!(verify_payment_signature("order_1", "pay_1", &sig, "secret"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let sig = compute_payment_signature("order_1", "pay_1", "secret");
        assert!(!verify_payment_signature("order_1", "pay_1", &sig, "other"));
    }

    #[test]
    fn test_tampered_order_rejected() {
        let sig = compute_payment_signature("order_1", "pay_1", "secret");
        assert!(!verify_payment_signature("order_2", "pay_1", &sig, "secret"));
    }

    #[test]
    fn test_tampered_payment_rejected() {
        let sig = compute_payment_signature("order_1", "pay_1", "secret");
        assert!(!verify_payment_signature("order_1", "pay_2", &sig, "secret"));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let mut sig = compute_payment_signature("order_1", "pay_1", "secret");
        // Flip one hex digit
        let last = sig.pop().unwrap();
        sig.push(if last == '0' { '1' } else { '0' });
        assert!(!verify_payment_signature("order_1", "pay_1", &sig, "secret"));
    }

    #[test]
    fn test_signature_is_hex_sha256() {
        let sig = compute_payment_signature("order_1", "pay_1", "secret");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
