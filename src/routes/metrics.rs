use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

/// GET /metrics — render the recorder's registry in Prometheus text format.
///
/// Carries its own state (the recorder handle installed in `main`) instead of
/// the shared [`AppState`](crate::app_state::AppState).
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
