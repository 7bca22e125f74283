//! Stripe webhook endpoint.
//!
//! Verified deliveries for completed checkout sessions trigger the same
//! reconciliation as the success redirect. A non-2xx answer makes Stripe retry,
//! which is what we want while the gateway or the store is unavailable.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use tracing::{Span, debug, info, instrument};

use modesta_commerce::gateway::WebhookEvent;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Handle a Stripe event delivery.
#[instrument(skip_all, fields(event_id = tracing::field::Empty, event_type = tracing::field::Empty))]
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let verifier = state
        .webhooks()
        .ok_or_else(|| AppError::NotFound("webhook not configured".to_string()))?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing Stripe-Signature header".to_string()))?;
    verifier.verify(signature, &body)?;

    let event = WebhookEvent::parse(&body)?;
    let span = Span::current();
    span.record("event_id", event.id.as_str());
    span.record("event_type", event.kind.as_str());

    let Some(session_id) = event.session_to_reconcile() else {
        debug!("Ignoring webhook event");
        return Ok(StatusCode::OK);
    };

    let result = state
        .commerce()
        .reconciliation()
        .reconcile(session_id)
        .await?;
    info!(
        order_id = %result.order.id,
        transitioned = result.transitioned,
        "Webhook reconciled order"
    );
    Ok(StatusCode::OK)
}
