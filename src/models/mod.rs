pub mod prediction;
pub mod transcription;
