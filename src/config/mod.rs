use serde::Deserialize;

/// Service configuration, loaded once from the environment and handed to
/// components at construction time.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// SQLite connection string for the prediction store.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Replicate API token (bearer auth).
    pub replicate_api_token: Option<String>,

    /// Webhook signing secret issued by Replicate ("whsec_..." form).
    pub replicate_webhook_secret: Option<String>,

    /// Public callback URL Replicate POSTs status updates to.
    pub replicate_webhook_url: Option<String>,

    /// Whisper model identifier, "owner/name:version" or a bare version id.
    pub whisper_model: Option<String>,

    /// Replicate API base URL.
    #[serde(default = "default_replicate_base_url")]
    pub replicate_base_url: String,

    /// Seconds between reconciliation poll ticks.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Days a finished prediction is kept before the retention sweep removes it.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Timeout for prediction creation calls, in seconds.
    #[serde(default = "default_create_timeout_secs")]
    pub create_timeout_secs: u64,

    /// Timeout for status and cancel calls, in seconds.
    #[serde(default = "default_status_timeout_secs")]
    pub status_timeout_secs: u64,

    /// Allowed webhook timestamp skew in seconds (replay window).
    #[serde(default = "default_webhook_tolerance_secs")]
    pub webhook_tolerance_secs: i64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_database_url() -> String {
    "sqlite://transkripta.db".to_string()
}

fn default_replicate_base_url() -> String {
    "https://api.replicate.com/v1".to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_retention_days() -> i64 {
    7
}

fn default_create_timeout_secs() -> u64 {
    60
}

fn default_status_timeout_secs() -> u64 {
    15
}

fn default_webhook_tolerance_secs() -> i64 {
    300
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
