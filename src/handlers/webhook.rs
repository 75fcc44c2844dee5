use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::services::booking::{self, PaymentConfirmation};
use crate::services::payments::stripe::{self, WebhookEvent};
use crate::state::AppState;

// POST /webhook/stripe
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    // empty secret = skip signature validation (dev mode)
    if !state.config.stripe_webhook_secret.is_empty() {
        let signature = headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::warn!("missing Stripe-Signature header");
                AppError::Validation("missing Stripe-Signature header".to_string())
            })?;

        stripe::verify_signature(
            &state.config.stripe_webhook_secret,
            &body,
            signature,
            Utc::now().timestamp(),
        )
        .map_err(|e| {
            tracing::warn!(error = %e, "rejected Stripe webhook");
            AppError::Validation(format!("invalid signature: {e}"))
        })?;
    }

    let event = stripe::parse_event(&body).map_err(|e| {
        tracing::warn!(error = %e, "unreadable Stripe event");
        AppError::Validation(e.to_string())
    })?;

    match event {
        WebhookEvent::CheckoutCompleted { event_id, paid: false, session_id, .. } => {
            tracing::info!(%event_id, %session_id, "checkout completed, payment still pending");
        }
        WebhookEvent::CheckoutCompleted {
            event_id,
            session_id,
            booking_id,
            kind,
            payment_intent,
            ..
        } => {
            tracing::info!(%event_id, %booking_id, kind = kind.as_str(), "checkout completed");
            let payment = PaymentConfirmation {
                booking_id: booking_id.clone(),
                kind,
                session_id,
                payment_intent,
            };
            match booking::apply_payment(&state, payment).await {
                Ok(b) => {
                    tracing::info!(%booking_id, status = %b.status, "payment applied");
                }
                // redelivery or out-of-order event; acknowledge so it stops
                Err(AppError::Conflict(reason)) => {
                    tracing::info!(%event_id, %booking_id, %reason, "payment event ignored");
                }
                Err(AppError::NotFound(_)) => {
                    tracing::warn!(%event_id, %booking_id, "payment for unknown booking");
                }
                Err(e) => return Err(e),
            }
        }
        WebhookEvent::CheckoutExpired { event_id, session_id, booking_id } => {
            tracing::info!(%event_id, %session_id, booking_id = ?booking_id, "checkout session expired");
        }
        WebhookEvent::PaymentFailed { event_id, payment_intent } => {
            tracing::warn!(%event_id, %payment_intent, "payment failed");
        }
        WebhookEvent::Ignored { event_id, event_type } => {
            tracing::debug!(%event_id, %event_type, "ignoring Stripe event");
        }
    }

    Ok(Json(json!({ "received": true })))
}
