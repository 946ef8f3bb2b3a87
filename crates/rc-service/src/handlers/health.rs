//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns OK if the process is running
//! - `/ready`: Readiness probe - checks that the media server API answers

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness probe handler.
///
/// Does NOT check any dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Returns 200 if the room directory answers a list call, 503 otherwise.
/// The error message is generic; the cause is logged server-side.
#[tracing::instrument(skip_all, name = "rc.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Err(e) = state.rooms.list_rooms(&[]).await {
        tracing::warn!(target: "rc.handlers.health", error = %e, "Readiness check failed: media server unreachable");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                media_server: Some("unreachable"),
                error: Some("Service dependencies unavailable".to_string()),
            }),
        );
    }

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready",
            media_server: Some("reachable"),
            error: None,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        assert_eq!(health_check().await, "OK");
    }
}
