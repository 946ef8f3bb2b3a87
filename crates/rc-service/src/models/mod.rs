//! Room Controller HTTP models.
//!
//! Request and response bodies of the HTTP API. Field names are
//! snake_case. Optional request fields fall back to documented defaults;
//! an absent field never means `false` or `0`.

use crate::errors::RcError;
use crate::grants::{Capabilities, SessionGrant};
use crate::services::egress::{EncodingPreset, OutputFormat};
use crate::services::recording::{CaptureStrategy, RecordingRequest, S3Sink};
use crate::services::room_directory::{CreateRoomOptions, Room};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Parse a JSON body, mapping any failure to 400.
///
/// Handlers take raw bytes instead of `Json<T>` so malformed bodies are
/// `BAD_REQUEST` rather than axum's 422.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, RcError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "rc.handlers", error = %e, "Invalid request body");
        RcError::BadRequest("Invalid request body".to_string())
    })
}

/// Readiness check response.
///
/// Returned by the `/ready` endpoint (readiness probe).
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    /// Media server API reachability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_server: Option<&'static str>,

    /// Error message (generic, no infrastructure details).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Public connection details for clients.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub server_url: String,
    pub api_key: String,
}

// ============================================================================
// Tokens
// ============================================================================

/// Request body of `POST /api/v1/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTokenRequest {
    pub identity: String,
    pub room: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub can_publish: Option<bool>,
    #[serde(default)]
    pub can_subscribe: Option<bool>,
    #[serde(default)]
    pub can_publish_data: Option<bool>,
    #[serde(default)]
    pub hidden: Option<bool>,
}

impl From<CreateTokenRequest> for SessionGrant {
    fn from(request: CreateTokenRequest) -> Self {
        SessionGrant {
            identity: request.identity,
            name: request.name,
            metadata: request.metadata.unwrap_or_default(),
            room: request.room,
            capabilities: Capabilities::resolve(
                request.can_publish,
                request.can_subscribe,
                request.can_publish_data,
                request.hidden,
            ),
        }
    }
}

/// Response body of `POST /api/v1/token`.
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub viewer_url: String,
}

// ============================================================================
// Recordings
// ============================================================================

/// Request body of `POST /api/v1/recordings/start`.
///
/// The sink is flattened: `s3_bucket` turns on upload, `s3_region` and
/// `s3_endpoint` override the configured defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct StartRecordingRequest {
    pub room_name: String,
    #[serde(default)]
    pub strategy: Option<CaptureStrategy>,
    #[serde(default)]
    pub output_format: Option<OutputFormat>,
    #[serde(default)]
    pub audio_only: Option<bool>,
    #[serde(default)]
    pub video_only: Option<bool>,
    #[serde(default)]
    pub preset: Option<EncodingPreset>,
    #[serde(default)]
    pub s3_bucket: Option<String>,
    #[serde(default)]
    pub s3_region: Option<String>,
    #[serde(default)]
    pub s3_endpoint: Option<String>,
    #[serde(default)]
    pub room_url: Option<String>,
}

impl From<StartRecordingRequest> for RecordingRequest {
    fn from(request: StartRecordingRequest) -> Self {
        let sink = request.s3_bucket.map(|bucket| S3Sink {
            bucket,
            region: request.s3_region,
            endpoint: request.s3_endpoint,
        });

        RecordingRequest {
            room_name: request.room_name,
            strategy: request.strategy.unwrap_or_default(),
            output_format: request.output_format.unwrap_or_default(),
            audio_only: request.audio_only.unwrap_or(false),
            video_only: request.video_only.unwrap_or(false),
            preset: request.preset.unwrap_or_default(),
            sink,
            room_url: request.room_url,
        }
    }
}

/// Query of `GET /api/v1/recordings`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListRecordingsQuery {
    #[serde(default)]
    pub room_name: Option<String>,
}

// ============================================================================
// Rooms
// ============================================================================

/// Request body of `POST /api/v1/rooms`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    /// Seconds an empty room stays open (default 300).
    #[serde(default)]
    pub empty_timeout: Option<u32>,
    /// 0 means unlimited (default 0).
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub metadata: Option<String>,
}

impl From<CreateRoomRequest> for CreateRoomOptions {
    fn from(request: CreateRoomRequest) -> Self {
        let defaults = CreateRoomOptions::new(request.name);
        CreateRoomOptions {
            empty_timeout: request.empty_timeout.unwrap_or(defaults.empty_timeout),
            max_participants: request
                .max_participants
                .unwrap_or(defaults.max_participants),
            metadata: request.metadata.unwrap_or_default(),
            ..defaults
        }
    }
}

/// Request body of `PATCH /api/v1/rooms/:room_name`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRoomRequest {
    pub metadata: String,
}

/// Response body of `GET /api/v1/rooms`.
#[derive(Debug, Clone, Serialize)]
pub struct RoomListResponse {
    pub rooms: Vec<Room>,
}

/// Request body of `POST .../participants/:identity/mute`.
#[derive(Debug, Clone, Deserialize)]
pub struct MuteTrackRequest {
    pub track_sid: String,
    /// Mute (default) or unmute.
    #[serde(default)]
    pub muted: Option<bool>,
}
