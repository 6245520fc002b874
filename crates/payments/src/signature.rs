//! Webhook signature verification (Stripe signing scheme).
//!
//! The `Stripe-Signature` header looks like `t=1700000000,v1=<hex>,v1=<hex>`.
//! Each `v1` entry is `HMAC-SHA256(secret, "{t}.{payload}")`; the payload is
//! authentic if any entry matches and `t` is within the tolerance.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::SignatureError;

type HmacSha256 = Hmac<Sha256>;

/// Default accepted clock skew between signing and verification.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Verifies webhook deliveries against the shared endpoint secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    /// Checks `header` against `payload` at time `now` (unix seconds).
    pub fn verify(&self, payload: &[u8], header: &str, now: i64) -> Result<(), SignatureError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or(SignatureError::MalformedHeader)?;
            match key {
                "t" => {
                    timestamp = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_| SignatureError::MalformedHeader)?,
                    )
                }
                // Other schemes (e.g. v0) are not accepted.
                "v1" => {
                    if let Ok(bytes) = hex::decode(value) {
                        signatures.push(bytes);
                    }
                }
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
        if signatures.is_empty() {
            return Err(SignatureError::Mismatch);
        }
        if now.abs_diff(timestamp) > self.tolerance_secs.unsigned_abs() {
            return Err(SignatureError::TimestampOutOfTolerance);
        }

        let mac = self.mac(timestamp, payload)?;
        if signatures
            .iter()
            .any(|candidate| mac.clone().verify_slice(candidate).is_ok())
        {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }

    /// Builds a valid header for `payload` signed at `timestamp`.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, SignatureError> {
        let signature = hex::encode(self.mac(timestamp, payload)?.finalize().into_bytes());
        Ok(format!("t={timestamp},v1={signature}"))
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| SignatureError::Mismatch)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_780_000_000;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new("whsec_test_secret", DEFAULT_TOLERANCE_SECS)
    }

    #[test]
    fn accepts_own_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = verifier().sign(payload, NOW).unwrap();
        assert!(verifier().verify(payload, &header, NOW + 10).is_ok());
    }

    #[test]
    fn matches_reference_vector() {
        // Reference: HMAC-SHA256("secret", "1.payload")
        let verifier = WebhookVerifier::new("secret", i64::MAX);
        let header = verifier.sign(b"payload", 1).unwrap();
        let mac = HmacSha256::new_from_slice(b"secret")
            .map(|mut m| {
                m.update(b"1.payload");
                hex::encode(m.finalize().into_bytes())
            })
            .unwrap();
        assert_eq!(header, format!("t=1,v1={mac}"));
    }

    #[test]
    fn rejects_tampered_payload() {
        let header = verifier().sign(b"original", NOW).unwrap();
        assert_eq!(
            verifier().verify(b"tampered", &header, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_wrong_secret() {
        let header = WebhookVerifier::new("other", DEFAULT_TOLERANCE_SECS)
            .sign(b"payload", NOW)
            .unwrap();
        assert_eq!(
            verifier().verify(b"payload", &header, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_timestamp() {
        let header = verifier().sign(b"payload", NOW).unwrap();
        assert_eq!(
            verifier().verify(b"payload", &header, NOW + DEFAULT_TOLERANCE_SECS + 1),
            Err(SignatureError::TimestampOutOfTolerance)
        );
    }

    #[test]
    fn rejects_extreme_timestamps() {
        let header = |t: i64| format!("t={t},v1={}", "ab".repeat(32));
        for t in [i64::MIN, i64::MAX] {
            assert_eq!(
                verifier().verify(b"{}", &header(t), NOW),
                Err(SignatureError::TimestampOutOfTolerance),
                "timestamp {t}"
            );
        }
    }

    #[test]
    fn accepts_any_matching_entry() {
        let valid = verifier().sign(b"payload", NOW).unwrap();
        let signature = valid.split_once(",v1=").unwrap().1;
        let header = format!("t={NOW},v1={},v0=ignored,v1={signature}", "ab".repeat(32));
        assert!(verifier().verify(b"payload", &header, NOW).is_ok());
    }

    #[test]
    fn rejects_malformed_headers() {
        for header in ["", "garbage", "v1=abcd", "t=notanumber,v1=abcd"] {
            assert_eq!(
                verifier().verify(b"payload", header, NOW),
                Err(SignatureError::MalformedHeader),
                "header {header:?}"
            );
        }
        assert_eq!(
            verifier().verify(b"payload", &format!("t={NOW}"), NOW),
            Err(SignatureError::Mismatch)
        );
    }
}
