//! Transkripta — asynchronous transcription relay.
//!
//! Submits audio URLs to Replicate's hosted Whisper models, tracks each
//! prediction in a durable store, and reconciles job state from two
//! independent paths: HMAC-signed webhooks pushed by the provider and a
//! fallback status poller that covers lost webhook deliveries.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
