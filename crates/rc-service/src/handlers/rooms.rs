//! Room and participant handlers.
//!
//! Direct passthroughs to the room directory; no local state.

use crate::errors::RcError;
use crate::models::{
    parse_body, CreateRoomRequest, MuteTrackRequest, RoomListResponse, UpdateRoomRequest,
};
use crate::routes::AppState;
use crate::services::room_directory::{CreateRoomOptions, ParticipantInfo, Room, TrackInfo};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::{info, instrument};

/// Handler for POST /api/v1/rooms
///
/// # Response
///
/// - 201 Created: the room as reported by the media server
/// - 400 Bad Request: Malformed body or empty name
#[instrument(skip_all, name = "rc.handlers.create_room")]
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Result<(StatusCode, Json<Room>), RcError> {
    let request: CreateRoomRequest = parse_body(&body)?;
    if request.name.trim().is_empty() {
        return Err(RcError::BadRequest("name must not be empty".to_string()));
    }

    let options = CreateRoomOptions::from(request);
    let room = state.rooms.create_room(&options).await?;

    Ok((StatusCode::CREATED, Json(room)))
}

/// Handler for GET /api/v1/rooms
#[instrument(skip_all, name = "rc.handlers.list_rooms")]
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RoomListResponse>, RcError> {
    let rooms = state.rooms.list_rooms(&[]).await?;
    Ok(Json(RoomListResponse { rooms }))
}

/// Handler for GET /api/v1/rooms/:room_name
#[instrument(skip_all, name = "rc.handlers.get_room", fields(room = %room_name))]
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(room_name): Path<String>,
) -> Result<Json<Room>, RcError> {
    state
        .rooms
        .lookup_room(&room_name)
        .await?
        .map(Json)
        .ok_or(RcError::RoomNotFound(room_name))
}

/// Handler for PATCH /api/v1/rooms/:room_name
///
/// Replaces the room metadata: `{"metadata": "..."}`.
#[instrument(skip_all, name = "rc.handlers.update_room", fields(room = %room_name))]
pub async fn update_room(
    State(state): State<Arc<AppState>>,
    Path(room_name): Path<String>,
    body: axum::body::Bytes,
) -> Result<Json<Room>, RcError> {
    let request: UpdateRoomRequest = parse_body(&body)?;
    let room = state
        .rooms
        .update_room_metadata(&room_name, &request.metadata)
        .await?;
    Ok(Json(room))
}

/// Handler for DELETE /api/v1/rooms/:room_name
#[instrument(skip_all, name = "rc.handlers.delete_room", fields(room = %room_name))]
pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    Path(room_name): Path<String>,
) -> Result<StatusCode, RcError> {
    state.rooms.delete_room(&room_name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /api/v1/rooms/:room_name/participants
#[instrument(skip_all, name = "rc.handlers.list_participants", fields(room = %room_name))]
pub async fn list_participants(
    State(state): State<Arc<AppState>>,
    Path(room_name): Path<String>,
) -> Result<Json<Vec<ParticipantInfo>>, RcError> {
    Ok(Json(state.rooms.list_participants(&room_name).await?))
}

/// Handler for DELETE /api/v1/rooms/:room_name/participants/:identity
#[instrument(skip_all, name = "rc.handlers.remove_participant", fields(room = %room_name))]
pub async fn remove_participant(
    State(state): State<Arc<AppState>>,
    Path((room_name, identity)): Path<(String, String)>,
) -> Result<StatusCode, RcError> {
    state.rooms.remove_participant(&room_name, &identity).await?;

    info!(target: "rc.handlers.rooms", room = %room_name, identity = %identity, "Participant removed");
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /api/v1/rooms/:room_name/participants/:identity/mute
///
/// `{"track_sid": "TR_...", "muted": true}`; `muted` defaults to true.
#[instrument(skip_all, name = "rc.handlers.mute_track", fields(room = %room_name))]
pub async fn mute_track(
    State(state): State<Arc<AppState>>,
    Path((room_name, identity)): Path<(String, String)>,
    body: axum::body::Bytes,
) -> Result<Json<TrackInfo>, RcError> {
    let request: MuteTrackRequest = parse_body(&body)?;

    let track = state
        .rooms
        .mute_published_track(
            &room_name,
            &identity,
            &request.track_sid,
            request.muted.unwrap_or(true),
        )
        .await?;

    Ok(Json(track))
}
