//! Inbound event hook
//!
//! Receives `auth.identity.created` deliveries from an external auth
//! subsystem. Delivery is at-least-once: terminal outcomes are acknowledged
//! with 204, transient failures return an error status so the sender retries.

use crate::cache::CacheOperations;
use crate::domain::{EventEnvelope, IdentityCreatedEvent, IDENTITY_CREATED_EVENT};
use crate::error::AppError;
use crate::state::{HasCache, HasServices};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use hmac::{Hmac, Mac};
use metrics::counter;
use sha2::Sha256;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying `sha256=<hex>` over the raw body
pub const SIGNATURE_HEADER: &str = "x-event-signature";

/// Verify an HMAC-SHA256 signature in constant time
fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let expected_hex = signature.strip_prefix("sha256=").unwrap_or(signature);

    let Ok(expected_bytes) = hex::decode(expected_hex) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };

    mac.update(body);
    mac.verify_slice(&expected_bytes).is_ok()
}

/// Compute the `sha256=<hex>` signature header value for a body
pub fn sign_body(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

fn record(name: &str, result: &'static str) {
    counter!("storefront_events_received_total", "name" => name.to_string(), "result" => result)
        .increment(1);
}

/// POST /hooks/events
pub async fn receive<S: HasServices + HasCache>(
    State(state): State<S>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    // 1. Signature
    let events_config = &state.config().events;
    if let Some(secret) = events_config.webhook_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if signature.is_empty() {
            warn!("Event received without signature header");
            return Err(AppError::Unauthorized(
                "Missing event signature".to_string(),
            ));
        }

        if !verify_signature(secret, &body, signature) {
            warn!("Event signature verification failed");
            return Err(AppError::Unauthorized(
                "Invalid event signature".to_string(),
            ));
        }
    } else {
        debug!("Event signature verification skipped (no secret configured)");
    }

    // 2. Envelope
    let envelope: EventEnvelope = serde_json::from_slice(&body).map_err(|e| {
        let preview = String::from_utf8_lossy(&body[..body.len().min(200)]);
        warn!(error = %e, body_preview = %preview, "Failed to parse event envelope");
        AppError::BadRequest(format!("Invalid event payload: {}", e))
    })?;

    if envelope.name != IDENTITY_CREATED_EVENT {
        debug!(name = %envelope.name, "Ignoring unhandled event");
        record(&envelope.name, "ignored");
        return Ok(StatusCode::NO_CONTENT);
    }

    // 3. Payload
    let event = IdentityCreatedEvent::from_value(&envelope.data).inspect_err(|e| {
        warn!(error = %e, "Rejected identity event payload");
        record(&envelope.name, "invalid");
    })?;

    // 4. Dedup
    let dedup_key = envelope.dedup_key();
    let mut marked = false;
    if let Some(key) = dedup_key.as_deref() {
        match state
            .cache()
            .check_and_mark_event(key, events_config.dedup_ttl_secs)
            .await
        {
            Ok(true) => {
                debug!(dedup_key = %key, "Duplicate event delivery, skipping");
                record(&envelope.name, "duplicate");
                return Ok(StatusCode::NO_CONTENT);
            }
            Ok(false) => marked = true,
            Err(e) => {
                // Reconciliation is idempotent, so processing twice is safe
                warn!(error = %e, "Event dedup check failed, processing anyway");
            }
        }
    }

    // 5. Reconcile
    match state.identity_reconciler().handle(&event).await {
        Ok(outcome) => {
            info!(
                auth_identity_id = %event.id,
                outcome = outcome.label(),
                "Identity event handled"
            );
            record(&envelope.name, "processed");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => {
            if let (true, Some(key)) = (marked, dedup_key.as_deref()) {
                if let Err(clear_err) = state.cache().clear_event_mark(key).await {
                    warn!(error = %clear_err, dedup_key = %key, "Failed to clear event mark");
                }
            }
            record(&envelope.name, "failed");
            // Anything short of success must reach the sender as retryable
            if e.is_server_error() {
                Err(e)
            } else {
                warn!(auth_identity_id = %event.id, error = %e, "Identity event will be redelivered");
                Err(AppError::ServiceUnavailable(
                    "Identity event could not be processed, retry later".to_string(),
                ))
            }
        }
    }
}
