//! Recording handlers.
//!
//! Thin HTTP front end over the Recording Orchestrator. Status values are
//! whatever the egress API last reported.

use crate::errors::RcError;
use crate::models::{parse_body, ListRecordingsQuery, StartRecordingRequest};
use crate::routes::AppState;
use crate::services::{RecordingRequest, RecordingSession};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /api/v1/recordings/start
///
/// # Request Body
///
/// ```json
/// {
///   "room_name": "r1",
///   "strategy": "WEB",
///   "output_format": "mp4",
///   "audio_only": false,
///   "video_only": false,
///   "preset": "preset-hd-30",
///   "s3_bucket": "recordings",
///   "s3_region": "us-east-1",
///   "s3_endpoint": "https://minio.local",
///   "room_url": "https://app.example.com/rooms/r1"
/// }
/// ```
///
/// Only `room_name` is required. `strategy` defaults to `ROOM_COMPOSITE`.
///
/// # Response
///
/// - 201 Created: `{"egress_id": "...", "status": "STARTING"}`
/// - 400 Bad Request: Malformed body or invalid sink/URL
/// - 404 Not Found: Room unknown to the media server
/// - 503 Service Unavailable: Media server unreachable
#[instrument(skip_all, name = "rc.handlers.start_recording")]
pub async fn start_recording(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Result<(StatusCode, Json<RecordingSession>), RcError> {
    let request: StartRecordingRequest = parse_body(&body)?;
    let request = RecordingRequest::from(request);

    let session = state.recordings.start(&request).await?;

    Ok((StatusCode::CREATED, Json(session)))
}

/// Handler for POST /api/v1/recordings/:egress_id/stop
#[instrument(skip_all, name = "rc.handlers.stop_recording", fields(egress_id = %egress_id))]
pub async fn stop_recording(
    State(state): State<Arc<AppState>>,
    Path(egress_id): Path<String>,
) -> Result<Json<RecordingSession>, RcError> {
    Ok(Json(state.recordings.stop(&egress_id).await?))
}

/// Handler for GET /api/v1/recordings/:egress_id
#[instrument(skip_all, name = "rc.handlers.get_recording", fields(egress_id = %egress_id))]
pub async fn get_recording(
    State(state): State<Arc<AppState>>,
    Path(egress_id): Path<String>,
) -> Result<Json<RecordingSession>, RcError> {
    Ok(Json(state.recordings.get_status(&egress_id).await?))
}

/// Handler for GET /api/v1/recordings?room_name=
///
/// Returns a JSON array in the egress API's order.
#[instrument(skip_all, name = "rc.handlers.list_recordings")]
pub async fn list_recordings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListRecordingsQuery>,
) -> Result<Json<Vec<RecordingSession>>, RcError> {
    let room_name = query.room_name.as_deref().filter(|r| !r.is_empty());
    Ok(Json(state.recordings.list(room_name).await?))
}
