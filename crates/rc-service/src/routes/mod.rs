//! HTTP routes for the Room Controller.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::grants::GrantBuilder;
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::services::{RecordingOrchestrator, RoomDirectory};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Grant Builder for participant tokens.
    pub grants: Arc<GrantBuilder>,

    /// Room directory for passthrough room operations and readiness.
    pub rooms: Arc<dyn RoomDirectory>,

    /// Recording Orchestrator.
    pub recordings: Arc<RecordingOrchestrator>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health`, `/ready`, `/metrics` - operational, unversioned
/// - `/api/v1/info` - connection details
/// - `/api/v1/token` - mint participant token
/// - `/api/v1/rooms[/:room_name[/participants[/:identity[/mute]]]]` - room passthroughs
/// - `/api/v1/recordings[/start | /:egress_id[/stop]]` - recordings
/// - TraceLayer, 30 second timeout, permissive CORS, HTTP metrics
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/api/v1/info", get(handlers::connection_info))
        .route("/api/v1/token", post(handlers::create_token))
        .route(
            "/api/v1/rooms",
            post(handlers::create_room).get(handlers::list_rooms),
        )
        .route(
            "/api/v1/rooms/:room_name",
            get(handlers::get_room)
                .patch(handlers::update_room)
                .delete(handlers::delete_room),
        )
        .route(
            "/api/v1/rooms/:room_name/participants",
            get(handlers::list_participants),
        )
        .route(
            "/api/v1/rooms/:room_name/participants/:identity",
            axum::routing::delete(handlers::remove_participant),
        )
        .route(
            "/api/v1/rooms/:room_name/participants/:identity/mute",
            post(handlers::mute_track),
        )
        .route("/api/v1/recordings", get(handlers::list_recordings))
        .route("/api/v1/recordings/start", post(handlers::start_recording))
        .route(
            "/api/v1/recordings/:egress_id",
            get(handlers::get_recording),
        )
        .route(
            "/api/v1/recordings/:egress_id/stop",
            post(handlers::stop_recording),
        )
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. CorsLayer
    // 3. TraceLayer
    // 4. http_metrics_middleware (outermost, sees every response)
    api_routes
        .merge(metrics_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
