//! Shared helpers for integration tests: an app instance on an ephemeral
//! port, a fake Replicate API, and webhook signing utilities.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::Mutex;

use transkripta::app_state::AppState;
use transkripta::config::AppConfig;
use transkripta::db;
use transkripta::models::prediction::{PredictionRecord, PredictionStatus, StatusUpdate};
use transkripta::models::transcription::TranscriptionOptions;
use transkripta::routes;
use transkripta::services::events::EventBus;
use transkripta::services::replicate::ReplicateClient;
use transkripta::services::signature::WebhookVerifier;
use transkripta::services::store::PredictionStore;

/// Base64 of a fixed 32-byte key, prefixed the way Replicate issues secrets.
pub fn test_secret() -> String {
    format!(
        "whsec_{}",
        base64::engine::general_purpose::STANDARD.encode(b"0123456789abcdef0123456789abcdef")
    )
}

/// A different, equally valid secret for forgery tests.
pub fn other_secret() -> String {
    format!(
        "whsec_{}",
        base64::engine::general_purpose::STANDARD.encode(b"ffffffffffffffffffffffffffffffff")
    )
}

/// Compute the `v1,<sig>` header value for a webhook delivery.
pub fn sign_webhook(secret: &str, webhook_id: &str, timestamp: &str, payload: &str) -> String {
    let key_b64 = secret.strip_prefix("whsec_").unwrap_or(secret);
    let key = base64::engine::general_purpose::STANDARD
        .decode(key_b64)
        .expect("valid base64 secret");
    let mut mac = Hmac::<Sha256>::new_from_slice(&key).expect("hmac accepts any key length");
    mac.update(format!("{webhook_id}.{timestamp}.{payload}").as_bytes());
    format!(
        "v1,{}",
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    )
}

/// SQLite URL for a throwaway database file.
pub fn temp_database_url() -> String {
    let path = std::env::temp_dir().join(format!("transkripta-test-{}.db", uuid::Uuid::new_v4()));
    format!("sqlite://{}", path.display())
}

/// Fully configured test config pointing at the given provider base URL.
pub fn test_config(replicate_base_url: &str, database_url: &str) -> AppConfig {
    AppConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        database_url: database_url.to_string(),
        replicate_api_token: Some("test-token".to_string()),
        replicate_webhook_secret: Some(test_secret()),
        replicate_webhook_url: Some("https://example.com/api/webhooks/replicate".to_string()),
        whisper_model: Some("openai/whisper:4d50797290df275329f202e48c76360b3f22b08d".to_string()),
        replicate_base_url: replicate_base_url.to_string(),
        poll_interval_secs: 1,
        retention_days: 7,
        create_timeout_secs: 5,
        status_timeout_secs: 5,
        webhook_tolerance_secs: 300,
    }
}

/// A migrated store over a fresh database.
pub async fn temp_store(database_url: &str) -> Arc<PredictionStore> {
    let pool = db::init_pool(database_url).await.expect("init pool");
    db::run_migrations(&pool).await.expect("run migrations");
    Arc::new(PredictionStore::new(pool))
}

pub struct TestApp {
    pub base_url: String,
    pub state: AppState,
    pub config: AppConfig,
}

/// Spawn the API on an ephemeral port, backed by a throwaway SQLite file.
pub async fn spawn_app(config: AppConfig) -> TestApp {
    let pool = db::init_pool(&config.database_url).await.expect("init pool");
    db::run_migrations(&pool).await.expect("run migrations");

    let store = Arc::new(PredictionStore::new(pool.clone()));
    let replicate = Arc::new(ReplicateClient::new(&config, Arc::clone(&store)));
    let verifier = WebhookVerifier::new(
        config.replicate_webhook_secret.clone(),
        config.webhook_tolerance_secs,
    );
    let events = EventBus::new(16);
    let state = AppState::new(pool, store, replicate, verifier, events);

    let app = routes::api_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    TestApp {
        base_url: format!("http://{addr}"),
        state,
        config,
    }
}

/// In-memory stand-in for Replicate's predictions API.
///
/// Seed `predictions` with the envelope each id should currently report;
/// `POST /predictions` mints a fresh id in `starting` state, and cancel
/// flips the stored envelope to `canceled`.
#[derive(Clone, Default)]
pub struct FakeReplicate {
    pub predictions: Arc<Mutex<HashMap<String, serde_json::Value>>>,
}

pub async fn spawn_fake_replicate(fake: FakeReplicate) -> String {
    async fn create(
        State(fake): State<FakeReplicate>,
        Json(body): Json<serde_json::Value>,
    ) -> Json<serde_json::Value> {
        let id = uuid::Uuid::new_v4().to_string();
        let envelope = serde_json::json!({
            "id": id,
            "status": "starting",
            "input": body.get("input"),
        });
        fake.predictions
            .lock()
            .await
            .insert(id.clone(), envelope.clone());
        Json(envelope)
    }

    async fn get_one(
        State(fake): State<FakeReplicate>,
        Path(id): Path<String>,
    ) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
        match fake.predictions.lock().await.get(&id) {
            Some(envelope) => Ok(Json(envelope.clone())),
            None => Err((
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "detail": "prediction not found" })),
            )),
        }
    }

    async fn cancel(
        State(fake): State<FakeReplicate>,
        Path(id): Path<String>,
    ) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
        let mut predictions = fake.predictions.lock().await;
        match predictions.get_mut(&id) {
            Some(envelope) => {
                envelope["status"] = serde_json::Value::String("canceled".to_string());
                Ok(Json(envelope.clone()))
            }
            None => Err((
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "detail": "prediction not found" })),
            )),
        }
    }

    let app = Router::new()
        .route("/predictions", post(create))
        .route("/predictions/{id}", get(get_one))
        .route("/predictions/{id}/cancel", post(cancel))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

/// A record as the create call would have stored it.
pub fn sample_record(id: &str, status: PredictionStatus) -> PredictionRecord {
    let now = Utc::now();
    PredictionRecord {
        id: id.to_string(),
        status,
        audio_url: "https://example.com/audio/a.mp3".to_string(),
        model: Some("openai/whisper:4d50797290df275329f202e48c76360b3f22b08d".to_string()),
        options: TranscriptionOptions::default(),
        output: None,
        error: None,
        logs: None,
        webhook_confirmed: false,
        created_at: now,
        updated_at: now,
    }
}

/// A bare status update with no output/error payload.
pub fn status_update(id: &str, status: PredictionStatus, webhook_confirmed: bool) -> StatusUpdate {
    StatusUpdate {
        id: id.to_string(),
        status,
        output: None,
        error: None,
        logs: None,
        webhook_confirmed,
    }
}
