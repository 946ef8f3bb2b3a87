//! Access token claims shared across Room Controller components.
//!
//! Room access tokens are HS256 JWTs in the LiveKit claim layout:
//!
//! ```json
//! {
//!   "iss": "<api key>",
//!   "sub": "<participant identity>",
//!   "nbf": 1700000000,
//!   "exp": 1700021600,
//!   "name": "Alice",
//!   "metadata": "{\"role\":\"host\"}",
//!   "video": { "roomJoin": true, "room": "standup", "canPublish": true, ... }
//! }
//! ```
//!
//! The caller-controlled part ([`AccessClaims`]) carries identity, display name,
//! metadata and the [`VideoGrant`]. The signer owns the time-bound and issuer
//! fields and wraps the caller claims in [`SignedClaims`].
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only HS256 is accepted on verification
//! - Error messages are generic to prevent information leakage

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum accepted access token size in bytes (8KB).
///
/// Typical room tokens are 300-600 bytes. Metadata is caller-defined, so the
/// limit leaves room for it while still rejecting abusive inputs before any
/// base64 decoding or HMAC work happens.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default lifetime of participant tokens (6 hours).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Upper bound for configurable participant token lifetime (7 days).
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Lifetime of the short-lived tokens used to call the server API (10 minutes).
pub const SERVICE_TOKEN_TTL: Duration = Duration::from_secs(10 * 60);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during access token verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token is not a well-formed JWT or claims do not match the layout.
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// HMAC signature does not match.
    #[error("The access token is invalid or expired")]
    InvalidSignature,

    /// Token `exp` is in the past.
    #[error("The access token is invalid or expired")]
    Expired,

    /// Token `iss` does not match the expected API key.
    #[error("The access token is invalid or expired")]
    WrongIssuer,
}

// =============================================================================
// Claims Types
// =============================================================================

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

/// Room permissions embedded in the `video` claim.
///
/// Participant tokens set `room_join`, `room` and all four capability flags.
/// Server API tokens set one of the admin flags instead and leave the
/// capability flags unset, so they are omitted from the serialized claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    /// Permission to create rooms.
    #[serde(default, skip_serializing_if = "is_false")]
    pub room_create: bool,

    /// Permission to list rooms.
    #[serde(default, skip_serializing_if = "is_false")]
    pub room_list: bool,

    /// Permission to start and stop egress.
    #[serde(default, skip_serializing_if = "is_false")]
    pub room_record: bool,

    /// Administrative permission over `room`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub room_admin: bool,

    /// Permission to join `room` as a participant.
    #[serde(default, skip_serializing_if = "is_false")]
    pub room_join: bool,

    /// Room this grant is scoped to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub room: String,

    /// Whether the participant may publish audio/video tracks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_publish: Option<bool>,

    /// Whether the participant may subscribe to other tracks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_subscribe: Option<bool>,

    /// Whether the participant may publish data messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_publish_data: Option<bool>,

    /// Whether the participant is hidden from other participants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

impl VideoGrant {
    /// Grant for `CreateRoom`.
    #[must_use]
    pub fn room_create() -> Self {
        Self {
            room_create: true,
            ..Self::default()
        }
    }

    /// Grant for `ListRooms` and `ListEgress`-style read operations.
    #[must_use]
    pub fn room_list() -> Self {
        Self {
            room_list: true,
            ..Self::default()
        }
    }

    /// Grant for administrative operations on a single room.
    #[must_use]
    pub fn room_admin(room: &str) -> Self {
        Self {
            room_admin: true,
            room: room.to_string(),
            ..Self::default()
        }
    }

    /// Grant for egress control.
    #[must_use]
    pub fn room_record() -> Self {
        Self {
            room_record: true,
            ..Self::default()
        }
    }
}

/// Caller-controlled part of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Participant identity (JWT subject).
    #[serde(rename = "sub", default, skip_serializing_if = "String::is_empty")]
    pub identity: String,

    /// Display name shown to other participants.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Opaque caller-defined metadata.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub metadata: String,

    /// Room permissions.
    pub video: VideoGrant,
}

impl AccessClaims {
    /// Claims for a server API call (no identity, admin grant only).
    #[must_use]
    pub fn service(video: VideoGrant) -> Self {
        Self {
            identity: String::new(),
            name: String::new(),
            metadata: String::new(),
            video,
        }
    }
}

/// Full claim set as it appears inside a signed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedClaims {
    /// Issuer: the API key whose secret signed this token.
    pub iss: String,

    /// Not-before timestamp (Unix epoch seconds).
    pub nbf: i64,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Caller-controlled claims.
    #[serde(flatten)]
    pub claims: AccessClaims,
}

// =============================================================================
// Functions
// =============================================================================

/// Verify an HS256 access token and return its claims.
///
/// Checks size, signature, `exp`, `nbf` and that `iss` equals `api_key`.
///
/// # Errors
///
/// Returns a [`JwtValidationError`] describing why the token was rejected.
/// All variants render the same generic message.
pub fn verify_access_token(
    token: &str,
    api_key: &str,
    api_secret: &str,
) -> Result<SignedClaims, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[api_key]);
    validation.validate_nbf = true;

    let decoded = decode::<SignedClaims>(
        token,
        &DecodingKey::from_secret(api_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Token rejected");
        match e.kind() {
            ErrorKind::InvalidSignature => JwtValidationError::InvalidSignature,
            ErrorKind::ExpiredSignature => JwtValidationError::Expired,
            ErrorKind::InvalidIssuer => JwtValidationError::WrongIssuer,
            _ => JwtValidationError::MalformedToken,
        }
    })?;

    Ok(decoded.claims)
}

// =============================================================================
// Tests
// =============================================================================
