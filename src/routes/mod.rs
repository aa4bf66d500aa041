pub mod health;
pub mod metrics;
pub mod transcriptions;
pub mod webhook;

use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

/// API routes shared by the server binary and the integration tests.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/webhooks/replicate", post(webhook::receive_webhook))
        .route(
            "/api/v1/transcriptions",
            post(transcriptions::create_transcription).get(transcriptions::list_transcriptions),
        )
        .route(
            "/api/v1/transcriptions/{id}",
            get(transcriptions::get_transcription).delete(transcriptions::delete_transcription),
        )
        .route(
            "/api/v1/transcriptions/{id}/cancel",
            post(transcriptions::cancel_transcription),
        )
        .with_state(state)
}
