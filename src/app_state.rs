use sqlx::SqlitePool;
use std::sync::Arc;

use crate::services::{
    events::EventBus, replicate::ReplicateClient, signature::WebhookVerifier,
    store::PredictionStore,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub store: Arc<PredictionStore>,
    pub replicate: Arc<ReplicateClient>,
    pub verifier: Arc<WebhookVerifier>,
    pub events: EventBus,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        store: Arc<PredictionStore>,
        replicate: Arc<ReplicateClient>,
        verifier: WebhookVerifier,
        events: EventBus,
    ) -> Self {
        Self {
            db,
            store,
            replicate,
            verifier: Arc::new(verifier),
            events,
        }
    }
}
