//! Stripe webhook verification and the minimal API surface we consume.
//!
//! Signature scheme (the `stripe-signature` header):
//! - header carries `t={unix seconds},v1={hex hmac},...`
//! - the signature is hex-encoded HMAC-SHA256 over `{t}.{payload}` keyed
//!   with the endpoint's signing secret
//! - events older than the tolerance window are rejected to blunt replay
//!
//! Event payloads are deserialized into the few fields reconciliation
//! needs; everything else in the event is ignored.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::errors::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of a signed event, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Event type granting credits.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// A verified webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// The checkout session fields reconciliation consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub line_items: Option<LineItemList>,
}

impl CheckoutSession {
    /// Payer email, preferring the top-level field the way the gateway
    /// populates hosted-checkout sessions.
    pub fn payer_email(&self) -> Option<&str> {
        self.customer_email
            .as_deref()
            .or_else(|| self.customer_details.as_ref().and_then(|d| d.email.as_deref()))
    }

    /// Price id of the first embedded line item, when the event carried them.
    pub fn first_price_id(&self) -> Option<&str> {
        self.line_items
            .as_ref()
            .and_then(|list| list.data.first())
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItemList {
    #[serde(default)]
    pub data: Vec<LineItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub price: Option<Price>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    pub id: String,
}

/// Sign a payload the way the gateway does: HMAC-SHA256 over
/// `{timestamp}.{payload}` with the endpoint secret, hex-encoded.
pub fn sign_payload(timestamp: i64, payload: &str, secret: &str) -> String {
    let signed_content = format!("{timestamp}.{payload}");

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(signed_content.as_bytes());

    hex::encode(mac.finalize().into_bytes())
}

/// Render a complete `stripe-signature` header value for `payload`.
pub fn signature_header(timestamp: i64, payload: &str, secret: &str) -> String {
    format!("t={timestamp},v1={}", sign_payload(timestamp, payload, secret))
}

/// Verify a `stripe-signature` header against the raw payload.
///
/// Accepts when any `v1` entry matches and the timestamp is within the
/// tolerance window around `now`.
pub fn verify_signature(payload: &str, header: &str, secret: &str, now: i64) -> bool {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };
    if candidates.is_empty() {
        return false;
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return false;
    }

    let expected = sign_payload(timestamp, payload, secret);
    candidates
        .iter()
        .any(|candidate| constant_time_eq(candidate.as_bytes(), expected.as_bytes()))
}

/// Verify the signature and parse the event, failing closed on either.
pub fn construct_event(payload: &str, header: &str, secret: &str) -> Result<Event> {
    if !verify_signature(payload, header, secret, chrono::Utc::now().timestamp()) {
        return Err(Error::Validation {
            message: "Invalid signature".to_string(),
        });
    }

    serde_json::from_str(payload).map_err(|e| Error::Validation {
        message: format!("Unreadable webhook payload: {e}"),
    })
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Minimal client for the one API call reconciliation needs: fetching a
/// checkout session's line items when the event did not embed them.
#[derive(Debug, Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(secret_key: &str, api_base: Option<&str>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.unwrap_or("https://api.stripe.com").trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    /// Fetch a checkout session's line items.
    pub async fn list_line_items(&self, session_id: &str) -> Result<Vec<LineItem>> {
        let url = format!("{}/v1/checkout/sessions/{session_id}/line_items", self.api_base);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| Error::Webhook {
                message: format!("Line item lookup failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Webhook {
                message: format!("Line item lookup returned {status}"),
            });
        }

        let list: LineItemList = response.json().await.map_err(|e| Error::Webhook {
            message: format!("Unreadable line item response: {e}"),
        })?;

        Ok(list.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    #[test]
    fn test_sign_and_verify() {
        let payload = r#"{"type":"checkout.session.completed","data":{}}"#;
        let timestamp = 1704067200;

        let header = signature_header(timestamp, payload, SECRET);
        assert!(verify_signature(payload, &header, SECRET, timestamp));
        assert!(verify_signature(payload, &header, SECRET, timestamp + 60));

        // Wrong payload, wrong secret, tampered timestamp all fail
        assert!(!verify_signature("other", &header, SECRET, timestamp));
        assert!(!verify_signature(payload, &header, "whsec_other", timestamp));
        let tampered = signature_header(timestamp + 1, payload, SECRET);
        assert_ne!(header, tampered);
    }

    #[test]
    fn test_verify_rejects_stale_timestamp() {
        let payload = "{}";
        let timestamp = 1704067200;
        let header = signature_header(timestamp, payload, SECRET);

        assert!(!verify_signature(payload, &header, SECRET, timestamp + SIGNATURE_TOLERANCE_SECS + 1));
        assert!(verify_signature(payload, &header, SECRET, timestamp + SIGNATURE_TOLERANCE_SECS));
    }

    #[test]
    fn test_verify_rejects_malformed_headers() {
        let payload = "{}";
        assert!(!verify_signature(payload, "", SECRET, 0));
        assert!(!verify_signature(payload, "t=notanumber,v1=abc", SECRET, 0));
        assert!(!verify_signature(payload, "v1=deadbeef", SECRET, 0));
        assert!(!verify_signature(payload, "t=100", SECRET, 100));
    }

    #[test]
    fn test_verify_accepts_any_matching_v1_entry() {
        let payload = "{}";
        let timestamp = 1704067200;
        let good = sign_payload(timestamp, payload, SECRET);
        let header = format!("t={timestamp},v1=deadbeef,v1={good}");

        assert!(verify_signature(payload, &header, SECRET, timestamp));
    }

    #[test]
    fn test_session_helpers() {
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_test_1",
            "customer_details": { "email": "payer@example.com" },
            "line_items": { "data": [{ "price": { "id": "price_123" } }] }
        }))
        .unwrap();

        assert_eq!(session.payer_email(), Some("payer@example.com"));
        assert_eq!(session.first_price_id(), Some("price_123"));

        let bare: CheckoutSession = serde_json::from_value(serde_json::json!({ "id": "cs_test_2" })).unwrap();
        assert_eq!(bare.payer_email(), None);
        assert_eq!(bare.first_price_id(), None);
    }
}
