//! Token handlers.
//!
//! - `POST /api/v1/token`: mint a participant token and viewer link
//! - `GET /api/v1/info`: public connection details

use crate::errors::RcError;
use crate::grants::SessionGrant;
use crate::models::{parse_body, ConnectionInfo, CreateTokenRequest, TokenResponse};
use crate::observability::metrics::record_token_minted;
use crate::routes::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::{info, instrument};

/// Handler for POST /api/v1/token
///
/// # Request Body
///
/// ```json
/// {
///   "identity": "alice",
///   "room": "standup",
///   "name": "Alice",
///   "metadata": "{\"role\":\"host\"}",
///   "can_publish": true,
///   "can_subscribe": true,
///   "can_publish_data": true,
///   "hidden": false
/// }
/// ```
///
/// Only `identity` and `room` are required.
///
/// # Response
///
/// - 200 OK: `{"token": "...", "viewer_url": "https://..."}`
/// - 400 Bad Request: Malformed body, empty identity or room
/// - 500 Internal Server Error: Signing failed or server URL misconfigured
#[instrument(skip_all, name = "rc.handlers.create_token")]
pub async fn create_token(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Result<Json<TokenResponse>, RcError> {
    let request: CreateTokenRequest = parse_body(&body)?;
    let grant = SessionGrant::from(request);

    let minted = match state
        .grants
        .mint_token(&grant, &state.config.livekit_url)
        .await
    {
        Ok(minted) => {
            record_token_minted("participant", "success");
            minted
        }
        Err(e) => {
            record_token_minted("participant", "error");
            return Err(e);
        }
    };

    info!(
        target: "rc.handlers.tokens",
        room = %grant.room,
        identity = %grant.identity,
        "Participant token issued"
    );

    Ok(Json(TokenResponse {
        token: minted.token,
        viewer_url: minted.viewer_url,
    }))
}

/// Handler for GET /api/v1/info
///
/// Returns the advertised server URL and API key. Never the secret.
pub async fn connection_info(State(state): State<Arc<AppState>>) -> Json<ConnectionInfo> {
    Json(ConnectionInfo {
        server_url: state.config.livekit_url.clone(),
        api_key: state.config.api_key.clone(),
    })
}
