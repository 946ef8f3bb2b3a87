//! Metrics definitions for the Room Controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `rc_` prefix for Room Controller
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP verbs, or Twirp method names fixed in code
//! - `endpoint`: parameterized paths (room names and egress ids replaced)
//! - `status`: success, error, timeout
//! - `kind`: participant, recorder, service
//! - `strategy`: room_composite, web
//! - `service`: room, egress

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used to render
/// `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("rc_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Starts include a room lookup and an egress call, web capture adds signing
        .set_buckets_for_metric(
            Matcher::Prefix("rc_recording_start".to_string()),
            &[
                0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set recording start buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("rc_livekit_request".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set LiveKit request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `rc_http_requests_total`, `rc_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("rc_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("rc_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path so room names, identities and egress ids never
/// become label values.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/" | "/health" | "/ready" | "/metrics" | "/api/v1/info" | "/api/v1/token"
        | "/api/v1/rooms" | "/api/v1/recordings" | "/api/v1/recordings/start" => {
            path.to_string()
        }
        _ => normalize_dynamic_endpoint(path),
    }
}

fn normalize_dynamic_endpoint(path: &str) -> String {
    let parts: Vec<&str> = path.trim_end_matches('/').split('/').collect();

    let normalized = match parts.as_slice() {
        ["", "api", "v1", "rooms", _] => "/api/v1/rooms/{room}",
        ["", "api", "v1", "rooms", _, "participants"] => "/api/v1/rooms/{room}/participants",
        ["", "api", "v1", "rooms", _, "participants", _] => {
            "/api/v1/rooms/{room}/participants/{identity}"
        }
        ["", "api", "v1", "rooms", _, "participants", _, "mute"] => {
            "/api/v1/rooms/{room}/participants/{identity}/mute"
        }
        ["", "api", "v1", "recordings", _] => "/api/v1/recordings/{egress_id}",
        ["", "api", "v1", "recordings", _, "stop"] => "/api/v1/recordings/{egress_id}/stop",
        _ => "/other",
    };

    normalized.to_string()
}

// ============================================================================
// Grant Metrics
// ============================================================================

/// Record a minted access token.
///
/// Metric: `rc_tokens_minted_total`
/// Labels: `kind` (participant, recorder, service), `status`
pub fn record_token_minted(kind: &str, status: &str) {
    counter!("rc_tokens_minted_total",
        "kind" => kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Recording Metrics
// ============================================================================

/// Record a recording start attempt.
///
/// Metric: `rc_recording_starts_total`, `rc_recording_start_duration_seconds`
/// Labels: `strategy`, `status`
pub fn record_recording_start(strategy: &str, status: &str, duration: Duration) {
    histogram!("rc_recording_start_duration_seconds",
        "strategy" => strategy.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("rc_recording_starts_total",
        "strategy" => strategy.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// LiveKit API Metrics
// ============================================================================

/// Record a Twirp call to the media server.
///
/// Metric: `rc_livekit_requests_total`, `rc_livekit_request_duration_seconds`
/// Labels: `service`, `method`, `status`
pub fn record_livekit_request(service: &str, method: &str, status: &str, duration: Duration) {
    histogram!("rc_livekit_request_duration_seconds",
        "service" => service.to_string(),
        "method" => method.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("rc_livekit_requests_total",
        "service" => service.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
