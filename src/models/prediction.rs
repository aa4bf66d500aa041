use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::models::transcription::TranscriptionOptions;

/// Lifecycle states of a Replicate prediction.
///
/// `Succeeded`, `Failed` and `Canceled` are terminal; once a prediction
/// reaches one of them no further transition is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl PredictionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    /// Position in the state machine; an update may never lower it.
    pub fn rank(self) -> u8 {
        match self {
            Self::Starting => 0,
            Self::Processing => 1,
            Self::Succeeded | Self::Failed | Self::Canceled => 2,
        }
    }
}

/// A tracked transcription prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Opaque id issued by Replicate.
    pub id: String,
    pub status: PredictionStatus,
    /// Resolved audio URL submitted for transcription.
    pub audio_url: String,
    pub model: Option<String>,
    /// Requested transcription parameters; immutable after creation.
    pub options: TranscriptionOptions,
    /// Provider output payload; present only when `status` is `Succeeded`.
    pub output: Option<serde_json::Value>,
    /// Provider error detail; present only when `status` is `Failed`.
    pub error: Option<String>,
    pub logs: Option<String>,
    /// True once a verified webhook has updated this prediction. Sticky.
    pub webhook_confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PredictionRecord {
    /// Build the initial record from the creation response.
    pub fn from_envelope(
        envelope: &PredictionEnvelope,
        audio_url: &str,
        model: &str,
        options: TranscriptionOptions,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: envelope.id.clone(),
            status: envelope.status,
            audio_url: audio_url.to_string(),
            model: Some(model.to_string()),
            options,
            output: envelope.output.clone(),
            error: envelope.error_detail(),
            logs: envelope.logs.clone(),
            webhook_confirmed: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Status payload Replicate sends in webhooks and returns from the
/// predictions API.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionEnvelope {
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub logs: Option<String>,
}

impl PredictionEnvelope {
    /// Provider error detail as text. Replicate sends either a plain string
    /// or a structured object depending on the failure.
    pub fn error_detail(&self) -> Option<String> {
        self.error.as_ref().map(|e| match e.as_str() {
            Some(s) => s.to_string(),
            None => e.to_string(),
        })
    }
}

/// A candidate mutation funneled through `PredictionStore::apply_update`.
///
/// Both update paths produce one of these; `webhook_confirmed` records which
/// path it came from.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub id: String,
    pub status: PredictionStatus,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub logs: Option<String>,
    pub webhook_confirmed: bool,
}

impl StatusUpdate {
    pub fn from_envelope(envelope: PredictionEnvelope, webhook_confirmed: bool) -> Self {
        let error = envelope.error_detail();
        Self {
            id: envelope.id,
            status: envelope.status,
            output: envelope.output,
            error,
            logs: envelope.logs,
            webhook_confirmed,
        }
    }
}
