//! Room Controller error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Messages for server-side failures are generic; the actual cause is
//! logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Room Controller error type.
///
/// Maps to HTTP status codes:
/// - RoomNotFound, RecordingNotFound, ParticipantNotFound: 404 Not Found
/// - BadRequest: 400 Bad Request
/// - CollaboratorUnavailable: 503 Service Unavailable
/// - CredentialSigning, InvalidServerUrl, Internal: 500 Internal Server Error
/// - RecordingStart: status of the wrapped cause
#[derive(Debug, Error)]
pub enum RcError {
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Recording not found: {0}")]
    RecordingNotFound(String),

    #[error("Participant {identity} not found in room {room}")]
    ParticipantNotFound { room: String, identity: String },

    #[error("Credential signing failed: {0}")]
    CredentialSigning(String),

    #[error("Invalid server URL: {0}")]
    InvalidServerUrl(String),

    #[error("Failed to start recording for room {room}: {source}")]
    RecordingStart {
        room: String,
        #[source]
        source: Box<RcError>,
    },

    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RcError {
    /// Wrap a failure from the multi-step start sequence.
    pub fn recording_start(room: &str, source: RcError) -> Self {
        RcError::RecordingStart {
            room: room.to_string(),
            source: Box::new(source),
        }
    }

    /// The innermost error, looking through `RecordingStart` wrappers.
    pub fn root_cause(&self) -> &RcError {
        match self {
            RcError::RecordingStart { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self.root_cause() {
            RcError::RoomNotFound(_)
            | RcError::RecordingNotFound(_)
            | RcError::ParticipantNotFound { .. } => 404,
            RcError::BadRequest(_) => 400,
            RcError::CollaboratorUnavailable(_) => 503,
            _ => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for RcError {
    fn into_response(self) -> Response {
        if let RcError::RecordingStart { room, source } = &self {
            tracing::warn!(target: "rc.errors", room = %room, error = %source, "Recording start failed");
        }

        let (status, code, message) = match self.root_cause() {
            RcError::RoomNotFound(room) => (
                StatusCode::NOT_FOUND,
                "ROOM_NOT_FOUND",
                format!("Room not found: {}", room),
            ),
            RcError::RecordingNotFound(egress_id) => (
                StatusCode::NOT_FOUND,
                "RECORDING_NOT_FOUND",
                format!("Recording not found: {}", egress_id),
            ),
            RcError::ParticipantNotFound { room, identity } => (
                StatusCode::NOT_FOUND,
                "PARTICIPANT_NOT_FOUND",
                format!("Participant {} not found in room {}", identity, room),
            ),
            RcError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            RcError::CollaboratorUnavailable(reason) => {
                // Log actual reason server-side
                tracing::warn!(target: "rc.availability", reason = %reason, "Collaborator unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Media server temporarily unavailable".to_string(),
                )
            }
            RcError::CredentialSigning(reason) => {
                tracing::error!(target: "rc.credentials", reason = %reason, "Credential signing failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CREDENTIAL_SIGNING_ERROR",
                    "Failed to sign access token".to_string(),
                )
            }
            RcError::InvalidServerUrl(url) => {
                tracing::error!(target: "rc.config", url = %url, "Invalid server URL");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INVALID_SERVER_URL",
                    "Server URL is misconfigured".to_string(),
                )
            }
            RcError::Internal(reason) => {
                tracing::error!(target: "rc.internal", reason = %reason, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            // root_cause() never yields a wrapper
            RcError::RecordingStart { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}
