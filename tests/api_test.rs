mod helpers;

use serde_json::json;

use helpers::{
    sample_record, spawn_app, spawn_fake_replicate, temp_database_url, test_config, FakeReplicate,
};
use transkripta::models::prediction::PredictionStatus;

const NO_PROVIDER: &str = "http://127.0.0.1:9";

#[tokio::test]
async fn create_submits_to_provider_and_tracks_the_prediction() {
    let fake = FakeReplicate::default();
    let provider = spawn_fake_replicate(fake.clone()).await;
    let app = spawn_app(test_config(&provider, &temp_database_url())).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/transcriptions", app.base_url))
        .json(&json!({"audio_url": "https://example.com/audio/interview.mp3"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], json!("starting"));
    assert_eq!(body["message"], json!("Starting transcription..."));
    let id = body["id"].as_str().expect("id in response").to_string();

    let record = app.state.store.get(&id).await.unwrap().expect("tracked");
    assert_eq!(record.status, PredictionStatus::Starting);
    assert_eq!(record.audio_url, "https://example.com/audio/interview.mp3");
    assert!(!record.webhook_confirmed);

    // The provider received the submission under the same id.
    assert!(fake.predictions.lock().await.contains_key(&id));

    let list: Vec<serde_json::Value> = reqwest::Client::new()
        .get(format!("{}/api/v1/transcriptions", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], json!(id));
}

#[tokio::test]
async fn create_without_provider_credentials_is_service_unavailable() {
    let mut config = test_config(NO_PROVIDER, &temp_database_url());
    config.replicate_api_token = None;
    let app = spawn_app(config).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/transcriptions", app.base_url))
        .json(&json!({"audio_url": "https://example.com/audio/a.mp3"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("REPLICATE_API_TOKEN"));
}

#[tokio::test]
async fn create_rejects_invalid_options() {
    let app = spawn_app(test_config(NO_PROVIDER, &temp_database_url())).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/v1/transcriptions", app.base_url))
        .json(&json!({
            "audio_url": "https://example.com/audio/a.mp3",
            "options": {"temperature": 5.0},
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = client
        .post(format!("{}/api/v1/transcriptions", app.base_url))
        .json(&json!({"audio_url": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn detail_projects_transcript_once_succeeded() {
    let app = spawn_app(test_config(NO_PROVIDER, &temp_database_url())).await;

    let mut record = sample_record("pred-1", PredictionStatus::Succeeded);
    record.output = Some(json!({
        "segments": [{"text": "first part"}, {"text": "second part"}],
        "language": "en",
    }));
    app.state.store.insert(&record).await.unwrap();

    let body: serde_json::Value = reqwest::Client::new()
        .get(format!("{}/api/v1/transcriptions/pred-1", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], json!("succeeded"));
    assert_eq!(
        body["status_label"],
        json!("Transcription completed successfully")
    );
    assert_eq!(body["text"], json!("first part second part"));
    assert_eq!(body["details"]["word_count"], json!(4));
    assert_eq!(body["details"]["language"], json!("en"));
}

#[tokio::test]
async fn detail_omits_transcript_while_still_running() {
    let app = spawn_app(test_config(NO_PROVIDER, &temp_database_url())).await;
    app.state
        .store
        .insert(&sample_record("pred-1", PredictionStatus::Processing))
        .await
        .unwrap();

    let body: serde_json::Value = reqwest::Client::new()
        .get(format!("{}/api/v1/transcriptions/pred-1", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], json!("processing"));
    assert_eq!(body["text"], json!(null));
    assert_eq!(body["details"], json!(null));
}

#[tokio::test]
async fn get_unknown_transcription_is_not_found() {
    let app = spawn_app(test_config(NO_PROVIDER, &temp_database_url())).await;

    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/transcriptions/nope", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn cancel_takes_effect_only_after_provider_confirms() {
    let fake = FakeReplicate::default();
    fake.predictions.lock().await.insert(
        "pred-9".to_string(),
        json!({"id": "pred-9", "status": "processing"}),
    );
    let provider = spawn_fake_replicate(fake).await;
    let app = spawn_app(test_config(&provider, &temp_database_url())).await;
    app.state
        .store
        .insert(&sample_record("pred-9", PredictionStatus::Processing))
        .await
        .unwrap();

    let response = reqwest::Client::new()
        .post(format!(
            "{}/api/v1/transcriptions/pred-9/cancel",
            app.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], json!("canceled"));

    let record = app.state.store.get("pred-9").await.unwrap().unwrap();
    assert_eq!(record.status, PredictionStatus::Canceled);
}

#[tokio::test]
async fn cancel_that_races_completion_reports_the_terminal_state() {
    let fake = FakeReplicate::default();
    fake.predictions.lock().await.insert(
        "pred-9".to_string(),
        json!({"id": "pred-9", "status": "succeeded", "output": {"text": "done"}}),
    );
    let provider = spawn_fake_replicate(fake).await;
    let app = spawn_app(test_config(&provider, &temp_database_url())).await;

    // A webhook already landed the terminal state; the late cancel must not
    // overwrite it.
    let mut record = sample_record("pred-9", PredictionStatus::Succeeded);
    record.output = Some(json!({"text": "done"}));
    record.webhook_confirmed = true;
    app.state.store.insert(&record).await.unwrap();

    let response = reqwest::Client::new()
        .post(format!(
            "{}/api/v1/transcriptions/pred-9/cancel",
            app.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], json!("succeeded"));

    let stored = app.state.store.get("pred-9").await.unwrap().unwrap();
    assert_eq!(stored.status, PredictionStatus::Succeeded);
    assert_eq!(stored.output, Some(json!({"text": "done"})));
}

#[tokio::test]
async fn delete_removes_the_record_exactly_once() {
    let app = spawn_app(test_config(NO_PROVIDER, &temp_database_url())).await;
    app.state
        .store
        .insert(&sample_record("pred-1", PredictionStatus::Succeeded))
        .await
        .unwrap();
    let client = reqwest::Client::new();

    let response = client
        .delete(format!("{}/api/v1/transcriptions/pred-1", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = client
        .get(format!("{}/api/v1/transcriptions/pred-1", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = client
        .delete(format!("{}/api/v1/transcriptions/pred-1", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn health_reports_component_status() {
    let app = spawn_app(test_config(NO_PROVIDER, &temp_database_url())).await;

    let response = reqwest::Client::new()
        .get(format!("{}/health", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["checks"]["database"]["status"], json!("ok"));
    assert_eq!(body["checks"]["replicate"]["status"], json!("ok"));
    assert_eq!(
        body["checks"]["webhook_verification"]["status"],
        json!("ok")
    );
}
