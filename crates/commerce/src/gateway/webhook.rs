//! Stripe webhook signature verification and event parsing.
//!
//! Stripe signs each delivery with `Stripe-Signature: t=<unix>,v1=<hex>`, where
//! the signature is HMAC-SHA256 over `"{t}.{raw body}"` keyed with the
//! endpoint's signing secret. Deliveries older than five minutes are rejected.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

/// Maximum age of a signed delivery, in seconds.
pub const TOLERANCE_SECS: i64 = 300;

/// Event types that mean a checkout session may now be paid.
const RECONCILE_EVENTS: &[&str] = &[
    "checkout.session.completed",
    "checkout.session.async_payment_succeeded",
];

/// Errors from verifying or parsing a webhook delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The signature header is missing or malformed.
    #[error("malformed signature header: {0}")]
    MalformedHeader(String),

    /// The delivery is outside the tolerance window.
    #[error("webhook timestamp outside tolerance")]
    Expired,

    /// No `v1` signature matched.
    #[error("webhook signature mismatch")]
    SignatureMismatch,

    /// The body is not a Stripe event.
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),
}

/// Verifies deliveries against the endpoint signing secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: SecretString,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl WebhookVerifier {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Verify a delivery against the current time.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError` if the header is malformed, the timestamp is stale,
    /// or no signature matches.
    pub fn verify(&self, header: &str, body: &[u8]) -> Result<(), WebhookError> {
        self.verify_at(header, body, chrono::Utc::now().timestamp())
    }

    /// Verify a delivery as if the current time were `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// See [`WebhookVerifier::verify`].
    pub fn verify_at(&self, header: &str, body: &[u8], now: i64) -> Result<(), WebhookError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| WebhookError::MalformedHeader("missing t".to_owned()))?;
        if signatures.is_empty() {
            return Err(WebhookError::MalformedHeader("missing v1".to_owned()));
        }
        let ts: i64 = timestamp
            .parse()
            .map_err(|_| WebhookError::MalformedHeader("invalid timestamp".to_owned()))?;

        if (now - ts).abs() > TOLERANCE_SECS {
            return Err(WebhookError::Expired);
        }

        let expected = self.sign(timestamp, body)?;
        if signatures
            .iter()
            .any(|candidate| constant_time_compare(&expected, candidate))
        {
            debug!("Stripe webhook signature verified");
            Ok(())
        } else {
            Err(WebhookError::SignatureMismatch)
        }
    }

    /// Hex HMAC-SHA256 of `"{timestamp}.{body}"`.
    fn sign(&self, timestamp: &str, body: &[u8]) -> Result<String, WebhookError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| WebhookError::MalformedHeader(e.to_string()))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Build a `Stripe-Signature` header for `body` at `timestamp`.
    ///
    /// Used by tests and local tooling that replays deliveries.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError` only if the secret cannot key an HMAC.
    pub fn signature_header(&self, body: &[u8], timestamp: i64) -> Result<String, WebhookError> {
        let ts = timestamp.to_string();
        Ok(format!("t={ts},v1={}", self.sign(&ts, body)?))
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

/// A Stripe event, reduced to what reconciliation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub id: String,
    pub kind: String,
    /// `data.object.id` when the object is a checkout session.
    pub session_id: Option<String>,
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: RawObject,
}

#[derive(Deserialize)]
struct RawObject {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    object: Option<String>,
}

impl WebhookEvent {
    /// Parse a verified delivery body.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::InvalidPayload` if the body is not an event.
    pub fn parse(body: &[u8]) -> Result<Self, WebhookError> {
        let raw: RawEvent = serde_json::from_slice(body)
            .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

        let session_id = match raw.data.object.object.as_deref() {
            Some("checkout.session") => raw.data.object.id,
            _ => None,
        };

        Ok(Self {
            id: raw.id,
            kind: raw.kind,
            session_id,
        })
    }

    /// The session to reconcile, if this event is one we act on.
    #[must_use]
    pub fn session_to_reconcile(&self) -> Option<&str> {
        if RECONCILE_EVENTS.contains(&self.kind.as_str()) {
            self.session_id.as_deref()
        } else {
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(SecretString::from("whsec_9fJ2kQ7xLm3Rv8Tn4Wb6Zc1Yd5Ge0Ha"))
    }

    #[test]
    fn test_valid_signature() {
        let body = br#"{"id":"evt_1"}"#;
        let header = verifier().signature_header(body, NOW).unwrap();
        assert!(verifier().verify_at(&header, body, NOW + 10).is_ok());
    }

    #[test]
    fn test_any_v1_may_match() {
        let body = br#"{"id":"evt_1"}"#;
        let good = verifier().signature_header(body, NOW).unwrap();
        let good_sig = good.split_once(",v1=").unwrap().1;
        let header = format!("t={NOW},v1={},v1={good_sig},v0=legacy", "0".repeat(64));
        assert!(verifier().verify_at(&header, body, NOW).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = verifier().signature_header(b"original", NOW).unwrap();
        assert!(matches!(
            verifier().verify_at(&header, b"tampered", NOW),
            Err(WebhookError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let body = b"{}";
        let header = verifier().signature_header(body, NOW).unwrap();
        assert!(matches!(
            verifier().verify_at(&header, body, NOW + TOLERANCE_SECS + 1),
            Err(WebhookError::Expired)
        ));
    }

    #[test]
    fn test_malformed_headers() {
        let no_signature = format!("t={NOW}");
        for header in ["", "t=abc,v1=00", "v1=00", no_signature.as_str()] {
            assert!(matches!(
                verifier().verify_at(header, b"{}", NOW),
                Err(WebhookError::MalformedHeader(_))
            ));
        }
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(!constant_time_compare("hello", "hellp"));
        assert!(!constant_time_compare("hello", "hell"));
    }

    #[test]
    fn test_parse_completed_event() {
        let body = br#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_test_1", "object": "checkout.session"}}
        }"#;
        let event = WebhookEvent::parse(body).unwrap();
        assert_eq!(event.session_to_reconcile(), Some("cs_test_1"));
    }

    #[test]
    fn test_other_events_are_ignored() {
        let body = br#"{
            "id": "evt_2",
            "type": "checkout.session.expired",
            "data": {"object": {"id": "cs_test_2", "object": "checkout.session"}}
        }"#;
        assert_eq!(WebhookEvent::parse(body).unwrap().session_to_reconcile(), None);

        let body = br#"{
            "id": "evt_3",
            "type": "charge.succeeded",
            "data": {"object": {"id": "ch_1", "object": "charge"}}
        }"#;
        let event = WebhookEvent::parse(body).unwrap();
        assert_eq!(event.session_id, None);
    }

    #[test]
    fn test_invalid_payload() {
        assert!(matches!(
            WebhookEvent::parse(b"not json"),
            Err(WebhookError::InvalidPayload(_))
        ));
    }
}
