use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::models::prediction::{PredictionEnvelope, StatusUpdate};
use crate::services::events::PredictionEvent;
use crate::services::projection;
use crate::services::store::{ApplyOutcome, StoreError};

/// Acknowledgment returned to the provider after a delivery is handled.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    pub prediction_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("missing webhook headers")]
    MissingHeaders,

    #[error("invalid webhook")]
    InvalidSignature,

    #[error("malformed webhook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeaders => StatusCode::BAD_REQUEST,
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::MalformedPayload(_) | WebhookError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Webhook processing failed");
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// POST /api/webhooks/replicate — authenticated status callback.
///
/// Verification happens over the raw body before any parsing; nothing is
/// written to the store until the payload has been authenticated and fully
/// parsed.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookAck>, WebhookError> {
    metrics::counter!("webhooks_received_total").increment(1);

    let (webhook_id, webhook_timestamp, webhook_signature) = match (
        header_str(&headers, "webhook-id"),
        header_str(&headers, "webhook-timestamp"),
        header_str(&headers, "webhook-signature"),
    ) {
        (Some(id), Some(ts), Some(sig)) => (id, ts, sig),
        (id, ts, sig) => {
            tracing::warn!(
                has_id = id.is_some(),
                has_timestamp = ts.is_some(),
                has_signature = sig.is_some(),
                "Webhook rejected: missing headers"
            );
            metrics::counter!("webhooks_rejected_total").increment(1);
            return Err(WebhookError::MissingHeaders);
        }
    };

    if !state
        .verifier
        .verify(&body, webhook_id, webhook_timestamp, webhook_signature)
    {
        tracing::warn!(
            webhook_id,
            webhook_timestamp,
            "Webhook rejected: signature verification failed"
        );
        metrics::counter!("webhooks_rejected_total").increment(1);
        return Err(WebhookError::InvalidSignature);
    }

    let envelope: PredictionEnvelope = serde_json::from_str(&body)?;
    let prediction_id = envelope.id.clone();
    let status = envelope.status;
    let update = StatusUpdate::from_envelope(envelope, true);

    match state.store.apply_update(&update).await? {
        ApplyOutcome::Applied { record, .. } => {
            tracing::info!(
                prediction_id = %record.id,
                status = %record.status,
                "Webhook processed"
            );
            state.events.publish(PredictionEvent::from_record(&record));
        }
        ApplyOutcome::Stale {
            stored, incoming, ..
        } => {
            tracing::info!(
                prediction_id = %prediction_id,
                stored = %stored,
                incoming = %incoming,
                "Webhook discarded: stale status update"
            );
        }
        ApplyOutcome::Unknown { .. } => {
            tracing::warn!(
                prediction_id = %prediction_id,
                "Webhook for untracked prediction ignored"
            );
        }
    }

    // Deliveries that carried no new information are still acked with 200 so
    // the provider stops retrying them.
    Ok(Json(WebhookAck {
        success: true,
        prediction_id,
        status: status.to_string(),
        message: projection::status_label(&status.to_string()),
    }))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
