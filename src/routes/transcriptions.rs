use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::prediction::{PredictionRecord, PredictionStatus};
use crate::models::transcription::{
    CreateTranscriptionRequest, TranscriptionDetail, TranscriptionResponse, TranscriptionSummary,
};
use crate::services::events::PredictionEvent;
use crate::services::projection;
use crate::services::replicate::ReplicateError;
use crate::services::store::{ApplyOutcome, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("transcription not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Replicate(#[from] ReplicateError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Replicate(ReplicateError::NotConfigured(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Replicate(ReplicateError::Api { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Replicate(ReplicateError::Http(e)) if e.is_timeout() => {
                StatusCode::GATEWAY_TIMEOUT
            }
            ApiError::Replicate(ReplicateError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Replicate(_) => StatusCode::BAD_GATEWAY,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Transcription API error");
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// POST /api/v1/transcriptions — submit an audio URL for async transcription.
pub async fn create_transcription(
    State(state): State<AppState>,
    Json(req): Json<CreateTranscriptionRequest>,
) -> Result<(StatusCode, Json<TranscriptionResponse>), ApiError> {
    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let record = state
        .replicate
        .create_prediction(&req.audio_url, &req.options)
        .await?;
    metrics::counter!("transcriptions_created_total").increment(1);
    tracing::info!(
        prediction_id = %record.id,
        audio_url = %record.audio_url,
        "Transcription submitted"
    );

    Ok((StatusCode::ACCEPTED, Json(respond(&record))))
}

/// GET /api/v1/transcriptions — all tracked transcriptions, newest first.
pub async fn list_transcriptions(
    State(state): State<AppState>,
) -> Result<Json<Vec<TranscriptionSummary>>, ApiError> {
    let records = state.store.list().await?;
    Ok(Json(records.iter().map(summarize).collect()))
}

/// GET /api/v1/transcriptions/{id} — full status and transcript projection.
pub async fn get_transcription(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TranscriptionDetail>, ApiError> {
    let record = state
        .store
        .get(&id)
        .await?
        .ok_or(ApiError::NotFound(id))?;
    Ok(Json(detail(&record)))
}

/// POST /api/v1/transcriptions/{id}/cancel — provider-confirmed cancel.
pub async fn cancel_transcription(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    match state.replicate.cancel(&id).await? {
        ApplyOutcome::Applied {
            record,
            status_changed,
        } => {
            if status_changed {
                state.events.publish(PredictionEvent::from_record(&record));
            }
            tracing::info!(prediction_id = %record.id, status = %record.status, "Cancel requested");
            Ok(Json(respond(&record)))
        }
        // The prediction finished before the cancel landed; report the state
        // it actually reached.
        ApplyOutcome::Stale { stored, .. } => {
            let record = state
                .store
                .get(&id)
                .await?
                .ok_or(ApiError::NotFound(id))?;
            tracing::info!(
                prediction_id = %record.id,
                status = %stored,
                "Cancel raced a terminal state"
            );
            Ok(Json(respond(&record)))
        }
        ApplyOutcome::Unknown { id } => Err(ApiError::NotFound(id)),
    }
}

/// DELETE /api/v1/transcriptions/{id} — remove a prediction from history.
pub async fn delete_transcription(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.store.remove(&id).await? {
        tracing::info!(prediction_id = %id, "Transcription removed");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(id))
    }
}

fn respond(record: &PredictionRecord) -> TranscriptionResponse {
    let status = record.status.to_string();
    TranscriptionResponse {
        id: record.id.clone(),
        message: projection::status_label(&status),
        status,
    }
}

fn summarize(record: &PredictionRecord) -> TranscriptionSummary {
    let status = record.status.to_string();
    TranscriptionSummary {
        id: record.id.clone(),
        status_label: projection::status_label(&status),
        status,
        audio_url: record.audio_url.clone(),
        elapsed: projection::format_elapsed(record.created_at, Some(record.updated_at)),
        webhook_confirmed: record.webhook_confirmed,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

fn detail(record: &PredictionRecord) -> TranscriptionDetail {
    let status = record.status.to_string();
    let succeeded = record.status == PredictionStatus::Succeeded;
    let text = record
        .output
        .as_ref()
        .filter(|_| succeeded)
        .map(projection::extract_text);
    let details = record
        .output
        .as_ref()
        .filter(|_| succeeded)
        .map(projection::transcript_details);

    TranscriptionDetail {
        id: record.id.clone(),
        status_label: projection::status_label(&status),
        status,
        audio_url: record.audio_url.clone(),
        model: record.model.clone(),
        options: record.options.clone(),
        text,
        details,
        error: record.error.clone(),
        logs: record.logs.clone(),
        elapsed: projection::format_elapsed(record.created_at, Some(record.updated_at)),
        webhook_confirmed: record.webhook_confirmed,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}
