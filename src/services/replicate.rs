use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::json;

use crate::config::AppConfig;
use crate::models::prediction::{PredictionEnvelope, PredictionRecord, StatusUpdate};
use crate::models::transcription::TranscriptionOptions;
use crate::services::store::{ApplyOutcome, PredictionStore, StoreError};

const WEBHOOK_EVENTS: [&str; 4] = ["start", "output", "logs", "completed"];

/// Client for Replicate's predictions API.
///
/// Every successful call upserts the returned prediction state into the
/// store, so callers read job state from the store instead of merging
/// responses themselves.
pub struct ReplicateClient {
    http: Client,
    base_url: String,
    api_token: Option<String>,
    webhook_url: Option<String>,
    model: Option<String>,
    create_timeout: Duration,
    status_timeout: Duration,
    store: Arc<PredictionStore>,
}

impl ReplicateClient {
    pub fn new(config: &AppConfig, store: Arc<PredictionStore>) -> Self {
        Self {
            http: Client::new(),
            base_url: config.replicate_base_url.trim_end_matches('/').to_string(),
            api_token: config.replicate_api_token.clone(),
            webhook_url: config.replicate_webhook_url.clone(),
            model: config.whisper_model.clone(),
            create_timeout: Duration::from_secs(config.create_timeout_secs),
            status_timeout: Duration::from_secs(config.status_timeout_secs),
            store,
        }
    }

    /// True when token, webhook URL and model are all present.
    pub fn is_configured(&self) -> bool {
        self.require().is_ok()
    }

    fn require(&self) -> Result<(&str, &str, &str), ReplicateError> {
        let token = self
            .api_token
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ReplicateError::NotConfigured("REPLICATE_API_TOKEN"))?;
        let webhook = self
            .webhook_url
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ReplicateError::NotConfigured("REPLICATE_WEBHOOK_URL"))?;
        let model = self
            .model
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ReplicateError::NotConfigured("WHISPER_MODEL"))?;
        Ok((token, webhook, model))
    }

    /// Create a remote transcription prediction and track it in the store.
    pub async fn create_prediction(
        &self,
        audio_url: &str,
        options: &TranscriptionOptions,
    ) -> Result<PredictionRecord, ReplicateError> {
        let (token, webhook, model) = self.require()?;
        // "owner/name:version" carries the version after the colon; a bare
        // version id is sent as-is.
        let version = model.split_once(':').map(|(_, v)| v).unwrap_or(model);

        let body = json!({
            "version": version,
            "input": {
                "audio": audio_url,
                "model": "large-v3",
                "translate": options.translate,
                "language": options.language,
                "temperature": options.temperature,
                "transcription": options.transcription,
                "suppress_tokens": options.suppress_tokens,
                "logprob_threshold": options.logprob_threshold,
                "no_speech_threshold": options.no_speech_threshold,
                "condition_on_previous_text": options.condition_on_previous_text,
                "compression_ratio_threshold": options.compression_ratio_threshold,
                "temperature_increment_on_fallback": options.temperature_increment_on_fallback,
            },
            "webhook": webhook,
            "webhook_events_filter": WEBHOOK_EVENTS,
        });

        let response = self
            .http
            .post(format!("{}/predictions", self.base_url))
            .bearer_auth(token)
            .timeout(self.create_timeout)
            .json(&body)
            .send()
            .await?;
        let envelope = read_envelope(response).await?;

        let record = PredictionRecord::from_envelope(&envelope, audio_url, model, options.clone());
        self.store.insert(&record).await?;
        Ok(record)
    }

    /// Fetch current prediction state and merge it into the store.
    ///
    /// Poll-derived updates never set `webhook_confirmed`.
    pub async fn get_status(&self, id: &str) -> Result<ApplyOutcome, ReplicateError> {
        let (token, _, _) = self.require()?;
        let response = self
            .http
            .get(format!("{}/predictions/{}", self.base_url, id))
            .bearer_auth(token)
            .timeout(self.status_timeout)
            .send()
            .await?;
        let envelope = read_envelope(response).await?;

        let update = StatusUpdate::from_envelope(envelope, false);
        Ok(self.store.apply_update(&update).await?)
    }

    /// Request cancellation. The store only moves to `canceled` once the
    /// provider's confirming response says so; a prediction that completed in
    /// the race window keeps its terminal state.
    pub async fn cancel(&self, id: &str) -> Result<ApplyOutcome, ReplicateError> {
        let (token, _, _) = self.require()?;
        let response = self
            .http
            .post(format!("{}/predictions/{}/cancel", self.base_url, id))
            .bearer_auth(token)
            .timeout(self.status_timeout)
            .send()
            .await?;
        let envelope = read_envelope(response).await?;

        let update = StatusUpdate::from_envelope(envelope, false);
        Ok(self.store.apply_update(&update).await?)
    }
}

async fn read_envelope(response: reqwest::Response) -> Result<PredictionEnvelope, ReplicateError> {
    let status = response.status();
    if !status.is_success() {
        let detail = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            });
        return Err(ReplicateError::Api {
            status: status.as_u16(),
            detail,
        });
    }
    response.json().await.map_err(ReplicateError::Http)
}

#[derive(Debug, thiserror::Error)]
pub enum ReplicateError {
    #[error("replicate is not configured: missing {0}")]
    NotConfigured(&'static str),

    #[error("replicate api error: {status} - {detail}")]
    Api { status: u16, detail: String },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReplicateError {
    /// Timeouts and connection failures; retried on the next poll tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, ReplicateError::Http(e) if e.is_timeout() || e.is_connect())
    }
}
