//! Prometheus metrics endpoint handler.
//!
//! Unauthenticated so Prometheus can scrape it. Labels are bounded and
//! carry no room names, identities or tokens.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// ```text
/// # TYPE rc_recording_starts_total counter
/// rc_recording_starts_total{strategy="web",status="success"} 3
/// ```
#[tracing::instrument(skip_all, name = "rc.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
