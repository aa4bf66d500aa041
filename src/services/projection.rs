use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::transcription::TranscriptDetails;

/// Pull the transcript text out of a prediction output, whatever shape it
/// took.
///
/// Whisper variants return a bare string, `{text}`, `{transcription}` or
/// `{segments: [{text, ...}]}` depending on version and requested format.
/// Segment entries without a `text` field contribute an empty string;
/// unrecognized shapes normalize to `""` rather than an error.
pub fn extract_text(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            if let Some(text) = map.get("text").and_then(Value::as_str) {
                return text.to_string();
            }
            if let Some(text) = map.get("transcription").and_then(Value::as_str) {
                return text.to_string();
            }
            if let Some(segments) = map.get("segments").and_then(Value::as_array) {
                return segments
                    .iter()
                    .map(|s| s.get("text").and_then(Value::as_str).unwrap_or(""))
                    .collect::<Vec<_>>()
                    .join(" ");
            }
            String::new()
        }
        _ => String::new(),
    }
}

/// Normalized transcript view with the metadata the UI displays.
pub fn transcript_details(output: &Value) -> TranscriptDetails {
    let text = extract_text(output);
    let word_count = text.split_whitespace().count();
    TranscriptDetails {
        segments: output
            .get("segments")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        language: output
            .get("language")
            .and_then(Value::as_str)
            .map(str::to_string),
        duration: output.get("duration").and_then(Value::as_f64),
        word_count,
        text,
    }
}

/// Human-readable label for a prediction status. Total over arbitrary
/// strings: unrecognized statuses get a generic label instead of an error.
pub fn status_label(status: &str) -> String {
    match status {
        "starting" => "Starting transcription...".to_string(),
        "processing" => "Processing transcription...".to_string(),
        "succeeded" => "Transcription completed successfully".to_string(),
        "failed" => "Transcription processing failed".to_string(),
        "canceled" => "Transcription canceled".to_string(),
        other => format!("Status: {other}"),
    }
}

/// Elapsed time between creation and the last update (or now), rendered as
/// `Ns`, `Nm Ms` or `Nh Mm`.
pub fn format_elapsed(created_at: DateTime<Utc>, updated_at: Option<DateTime<Utc>>) -> String {
    let end = updated_at.unwrap_or_else(Utc::now);
    let secs = (end - created_at).num_seconds().max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}
