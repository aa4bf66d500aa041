use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

/// Whisper parameters forwarded to Replicate. Defaults mirror the model's
/// published defaults; fields are validated at request time, not call time.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TranscriptionOptions {
    /// Source language hint; autodetected when unset.
    #[garde(length(min = 2, max = 16))]
    pub language: Option<String>,

    /// Translate the transcript to English instead of transcribing verbatim.
    #[garde(skip)]
    pub translate: bool,

    #[garde(range(min = 0.0, max = 1.0))]
    pub temperature: f64,

    /// Output format hint ("plain text", "srt", "vtt").
    #[garde(length(min = 1, max = 32))]
    pub transcription: String,

    #[garde(skip)]
    pub suppress_tokens: String,

    #[garde(range(min = -20.0, max = 0.0))]
    pub logprob_threshold: f64,

    #[garde(range(min = 0.0, max = 1.0))]
    pub no_speech_threshold: f64,

    #[garde(skip)]
    pub condition_on_previous_text: bool,

    #[garde(range(min = 1.0, max = 10.0))]
    pub compression_ratio_threshold: f64,

    #[garde(range(min = 0.0, max = 1.0))]
    pub temperature_increment_on_fallback: f64,
}

impl Default for TranscriptionOptions {
    fn default() -> Self {
        Self {
            language: None,
            translate: false,
            temperature: 0.0,
            transcription: "plain text".to_string(),
            suppress_tokens: "-1".to_string(),
            logprob_threshold: -1.0,
            no_speech_threshold: 0.6,
            condition_on_previous_text: true,
            compression_ratio_threshold: 2.4,
            temperature_increment_on_fallback: 0.2,
        }
    }
}

/// Request to submit an audio URL for asynchronous transcription.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTranscriptionRequest {
    #[garde(length(min = 1, max = 2048))]
    pub audio_url: String,

    #[garde(dive)]
    #[serde(default)]
    pub options: TranscriptionOptions,
}

/// Response after submitting or canceling a transcription.
#[derive(Debug, Serialize)]
pub struct TranscriptionResponse {
    pub id: String,
    pub status: String,
    pub message: String,
}

/// List-view projection of a tracked prediction.
#[derive(Debug, Serialize)]
pub struct TranscriptionSummary {
    pub id: String,
    pub status: String,
    pub status_label: String,
    pub audio_url: String,
    pub elapsed: String,
    pub webhook_confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full projection of a tracked prediction, transcript included.
#[derive(Debug, Serialize)]
pub struct TranscriptionDetail {
    pub id: String,
    pub status: String,
    pub status_label: String,
    pub audio_url: String,
    pub model: Option<String>,
    pub options: TranscriptionOptions,
    /// Extracted transcript text, present once the prediction succeeded.
    pub text: Option<String>,
    pub details: Option<TranscriptDetails>,
    pub error: Option<String>,
    pub logs: Option<String>,
    pub elapsed: String,
    pub webhook_confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Normalized view of Whisper's heterogeneous output payloads.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptDetails {
    pub text: String,
    pub segments: Vec<serde_json::Value>,
    pub language: Option<String>,
    pub duration: Option<f64>,
    pub word_count: usize,
}
