use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use transkripta::app_state::AppState;
use transkripta::config::AppConfig;
use transkripta::db;
use transkripta::models::prediction::PredictionStatus;
use transkripta::routes;
use transkripta::services::{
    events::EventBus, poller::ReconciliationPoller, replicate::ReplicateClient,
    signature::WebhookVerifier, store::PredictionStore,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing transkripta server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!(
        "transcriptions_created_total",
        "Transcription predictions submitted to Replicate"
    );
    metrics::describe_counter!(
        "transcriptions_completed_total",
        "Predictions that reached the succeeded state"
    );
    metrics::describe_counter!(
        "transcriptions_failed_total",
        "Predictions that reached the failed state"
    );
    metrics::describe_counter!("webhooks_received_total", "Webhook deliveries received");
    metrics::describe_counter!(
        "webhooks_rejected_total",
        "Webhook deliveries rejected before processing"
    );
    metrics::describe_counter!("poll_ticks_total", "Reconciliation poller ticks");
    metrics::describe_gauge!(
        "predictions_pending",
        "Active predictions awaiting webhook confirmation"
    );

    // Initialize the prediction store
    tracing::info!("Opening prediction store at {}", config.database_url);
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to open database");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let store = Arc::new(PredictionStore::new(db_pool.clone()));

    // Opportunistic retention sweep before accepting traffic
    match store
        .prune(chrono::Duration::days(config.retention_days))
        .await
    {
        Ok(0) => {}
        Ok(n) => tracing::info!(pruned = n, "Removed expired predictions at startup"),
        Err(e) => tracing::warn!(error = %e, "Startup retention prune failed"),
    }

    // Initialize the Replicate predictions client
    let replicate = Arc::new(ReplicateClient::new(&config, Arc::clone(&store)));
    if !replicate.is_configured() {
        tracing::warn!(
            "Replicate credentials incomplete; submissions will be rejected until configured"
        );
    }

    let verifier = WebhookVerifier::new(
        config.replicate_webhook_secret.clone(),
        config.webhook_tolerance_secs,
    );
    if !verifier.is_configured() {
        tracing::warn!("Webhook secret not configured; inbound webhooks will be rejected");
    }

    let events = EventBus::new(64);

    // Track terminal transitions regardless of which path resolved the job
    let mut completion_rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match completion_rx.recv().await {
                Ok(event) => {
                    match event.status {
                        PredictionStatus::Succeeded => {
                            metrics::counter!("transcriptions_completed_total").increment(1)
                        }
                        PredictionStatus::Failed => {
                            metrics::counter!("transcriptions_failed_total").increment(1)
                        }
                        _ => {}
                    }
                    if event.status.is_terminal() {
                        tracing::info!(
                            prediction_id = %event.id,
                            status = %event.status,
                            "Transcription reached terminal state"
                        );
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscriber lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Start the reconciliation poller
    let poller = ReconciliationPoller::new(
        Arc::clone(&store),
        Arc::clone(&replicate),
        events.clone(),
        Duration::from_secs(config.poll_interval_secs),
        chrono::Duration::days(config.retention_days),
    );
    tokio::spawn(poller.run());

    // Create shared application state
    let state = AppState::new(db_pool, store, replicate, verifier, events);

    // Build API routes
    let app = routes::api_router(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024)); // 10 MB limit

    tracing::info!("Starting transkripta on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
