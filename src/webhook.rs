//! HMAC-SHA256 verification of inbound payment-provider webhooks.
//! Grounded on `original_source/app/core/security.py`'s constant-time
//! signature comparison, reimplemented with `hmac`+`sha2` the way the
//! teacher verifies exchange webhook signatures in `signing/`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("malformed signature header")]
    MalformedSignature,

    #[error("signature verification failed")]
    InvalidSignature,
}

/// Verifies `signature_header` (expected as lowercase hex-encoded
/// HMAC-SHA256 over `body`, optionally prefixed with `sha256=`) against
/// `secret`. Comparison is constant-time via `hmac`'s `verify_slice`.
pub fn verify_signature(
    secret: &str,
    body: &[u8],
    signature_header: &str,
) -> Result<(), WebhookError> {
    let hex_sig = signature_header
        .strip_prefix("sha256=")
        .unwrap_or(signature_header);

    let expected = hex::decode(hex_sig).map_err(|_| WebhookError::MalformedSignature)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_matching_signature() {
        let body = br#"{"order_id":"abc","status":"success"}"#;
        let sig = sign("topsecret", body);
        assert!(verify_signature("topsecret", body, &sig).is_ok());
    }

    #[test]
    fn accepts_sha256_prefixed_signature() {
        let body = br#"{"order_id":"abc"}"#;
        let sig = format!("sha256={}", sign("topsecret", body));
        assert!(verify_signature("topsecret", body, &sig).is_ok());
    }

    #[test]
    fn rejects_wrong_secret() {
        let body = br#"{"order_id":"abc"}"#;
        let sig = sign("topsecret", body);
        assert!(matches!(
            verify_signature("wrongsecret", body, &sig),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_tampered_body() {
        let body = br#"{"order_id":"abc"}"#;
        let sig = sign("topsecret", body);
        assert!(matches!(
            verify_signature("topsecret", br#"{"order_id":"xyz"}"#, &sig),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_malformed_hex() {
        let body = b"payload";
        assert!(matches!(
            verify_signature("topsecret", body, "not-hex!!"),
            Err(WebhookError::MalformedSignature)
        ));
    }
}
