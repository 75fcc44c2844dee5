use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use super::{CheckoutRequest, CheckoutSession, PaymentProvider};
use crate::models::PaymentKind;

type HmacSha256 = Hmac<Sha256>;

const API_BASE: &str = "https://api.stripe.com";
/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub struct StripeClient {
    secret_key: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: String) -> Self {
        Self {
            secret_key,
            base_url: API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

fn line_item_name(request: &CheckoutRequest<'_>) -> String {
    let b = request.booking;
    let what = match request.kind {
        PaymentKind::Deposit => "Deposit",
        PaymentKind::Balance => "Balance",
    };
    format!(
        "Casa Vistas {what}: {} to {} ({} nights)",
        b.check_in.format("%Y-%m-%d"),
        b.check_out.format("%Y-%m-%d"),
        b.nights
    )
}

fn checkout_form(request: &CheckoutRequest<'_>) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "payment".to_string()),
        ("success_url", request.success_url.clone()),
        ("cancel_url", request.cancel_url.clone()),
        ("customer_email", request.booking.guest_email.clone()),
        ("client_reference_id", request.booking.id.clone()),
        ("line_items[0][quantity]", "1".to_string()),
        ("line_items[0][price_data][currency]", "eur".to_string()),
        (
            "line_items[0][price_data][unit_amount]",
            request.amount_cents.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]",
            line_item_name(request),
        ),
        ("metadata[booking_id]", request.booking.id.clone()),
        ("metadata[payment_type]", request.kind.as_str().to_string()),
        (
            "payment_intent_data[metadata][booking_id]",
            request.booking.id.clone(),
        ),
    ]
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest<'_>,
    ) -> anyhow::Result<CheckoutSession> {
        anyhow::ensure!(!self.secret_key.is_empty(), "Stripe is not configured");
        anyhow::ensure!(request.amount_cents > 0, "checkout amount must be positive");

        let resp = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&checkout_form(&request))
            .send()
            .await
            .context("failed to call Stripe")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Stripe checkout session failed ({status}): {body}");
        }

        let session: SessionResponse = resp
            .json()
            .await
            .context("failed to parse Stripe checkout session")?;
        let url = session
            .url
            .ok_or_else(|| anyhow::anyhow!("Stripe session {} has no URL", session.id))?;

        tracing::info!(
            booking_id = %request.booking.id,
            session_id = %session.id,
            kind = request.kind.as_str(),
            "created checkout session"
        );
        Ok(CheckoutSession { id: session.id, url })
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("malformed Stripe-Signature header")]
    Malformed,
    #[error("signature timestamp outside tolerance")]
    Expired,
    #[error("no matching signature")]
    Mismatch,
}

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`) against
/// the raw request body.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse::<i64>().ok(),
            Some(("v1", v)) => signatures.push(v),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if now.abs_diff(timestamp) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(SignatureError::Expired);
    }

    let mac = signed_mac(secret, timestamp, payload).ok_or(SignatureError::Malformed)?;
    let matched = signatures.iter().any(|sig| match hex::decode(sig) {
        Ok(bytes) => mac.clone().verify_slice(&bytes).is_ok(),
        Err(_) => false,
    });
    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

fn signed_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Some(mac)
}

/// Builds a valid header for `payload`; used by tests and local tooling.
pub fn sign_payload(secret: &str, payload: &[u8], timestamp: i64) -> String {
    let sig = signed_mac(secret, timestamp, payload)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default();
    format!("t={timestamp},v1={sig}")
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: String,
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    CheckoutCompleted {
        event_id: String,
        session_id: String,
        booking_id: String,
        kind: PaymentKind,
        payment_intent: Option<String>,
        paid: bool,
    },
    CheckoutExpired {
        event_id: String,
        session_id: String,
        booking_id: Option<String>,
    },
    PaymentFailed {
        event_id: String,
        payment_intent: String,
    },
    Ignored {
        event_id: String,
        event_type: String,
    },
}

pub fn parse_event(payload: &[u8]) -> anyhow::Result<WebhookEvent> {
    let raw: RawEvent = serde_json::from_slice(payload).context("invalid Stripe event")?;

    let event = match raw.event_type.as_str() {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            let session: SessionObject = serde_json::from_value(raw.data.object)
                .context("invalid checkout session object")?;
            let booking_id = session
                .metadata
                .get("booking_id")
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("session {} has no booking_id", session.id))?;
            let kind = session
                .metadata
                .get("payment_type")
                .and_then(|k| PaymentKind::parse(k))
                .ok_or_else(|| anyhow::anyhow!("session {} has no payment_type", session.id))?;
            WebhookEvent::CheckoutCompleted {
                event_id: raw.id,
                paid: session.payment_status.as_deref() != Some("unpaid"),
                session_id: session.id,
                booking_id,
                kind,
                payment_intent: session.payment_intent,
            }
        }
        "checkout.session.expired" => {
            let session: SessionObject = serde_json::from_value(raw.data.object)
                .context("invalid checkout session object")?;
            WebhookEvent::CheckoutExpired {
                event_id: raw.id,
                booking_id: session.metadata.get("booking_id").cloned(),
                session_id: session.id,
            }
        }
        "payment_intent.payment_failed" => {
            let id = raw
                .data
                .object
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            WebhookEvent::PaymentFailed {
                event_id: raw.id,
                payment_intent: id,
            }
        }
        _ => WebhookEvent::Ignored {
            event_id: raw.id,
            event_type: raw.event_type,
        },
    };
    Ok(event)
}
