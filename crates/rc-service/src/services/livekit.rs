//! LiveKit server API transport.
//!
//! The media server exposes its room and egress control APIs as Twirp
//! services: `POST {base}/twirp/<package.Service>/<Method>` with a JSON body,
//! authenticated by a short-lived bearer token carrying an admin grant.
//!
//! # Security
//!
//! - Every call is signed with a fresh 10 minute service token
//! - Tokens are never logged
//! - Timeouts prevent hanging connections
//! - Media server error text is logged server-side; callers get the mapped
//!   error kind

use crate::errors::RcError;
use crate::grants::GrantBuilder;
use crate::observability::metrics::{record_livekit_request, record_token_minted};
use common::jwt::VideoGrant;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

/// Twirp package path of the room service.
pub const ROOM_SERVICE: &str = "livekit.RoomService";

/// Twirp package path of the egress service.
pub const EGRESS_SERVICE: &str = "livekit.Egress";

/// Default timeout for media server requests in seconds.
const LIVEKIT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default connect timeout in seconds.
const LIVEKIT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Failure of a single Twirp call.
#[derive(Debug, Error)]
pub enum TwirpError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a Twirp error body.
    #[error("twirp error {status} ({code}): {msg}")]
    Api { status: u16, code: String, msg: String },

    /// The server answered 2xx with a body we could not decode.
    #[error("invalid response: {0}")]
    Decode(String),

    /// The service token could not be signed.
    #[error("service token signing failed: {0}")]
    Credentials(String),
}

impl TwirpError {
    /// Whether the server reported the addressed entity as unknown.
    ///
    /// Only the Twirp `not_found` code counts. A 404 carrying `bad_route` or
    /// no Twirp body at all means the request never reached a handler.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TwirpError::Api { code, .. } if code == "not_found")
    }

    /// Map onto the service taxonomy; `not_found` decides what an unknown
    /// entity means for the calling operation.
    pub fn into_rc_error(self, not_found: impl FnOnce() -> RcError) -> RcError {
        if self.is_not_found() {
            return not_found();
        }

        match self {
            TwirpError::Transport(reason) => RcError::CollaboratorUnavailable(reason),
            TwirpError::Api { status, code, msg } => {
                if status >= 500 || code == "unavailable" {
                    RcError::CollaboratorUnavailable(format!("{code}: {msg}"))
                } else if status == 404 || code == "bad_route" {
                    RcError::Internal(format!(
                        "media server route not found ({status} {code}): {msg}"
                    ))
                } else if status == 401 || status == 403 {
                    RcError::Internal(format!("media server rejected service credentials: {msg}"))
                } else {
                    RcError::BadRequest(msg)
                }
            }
            TwirpError::Decode(reason) => RcError::Internal(reason),
            TwirpError::Credentials(reason) => RcError::CredentialSigning(reason),
        }
    }

    fn metric_status(&self) -> &'static str {
        match self {
            _ if self.is_not_found() => "not_found",
            TwirpError::Transport(_) => "unavailable",
            TwirpError::Api { status, .. } if *status >= 500 => "unavailable",
            _ => "error",
        }
    }
}

/// Twirp error body, e.g. `{"code":"not_found","msg":"room not found"}`.
#[derive(Debug, Default, Deserialize)]
struct TwirpErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    msg: String,
}

/// Response body of calls that return an empty message.
#[derive(Debug, Default, Deserialize)]
pub struct Empty {}

/// Convert the advertised server address to the HTTP base of its API.
///
/// `ws` becomes `http` and `wss` becomes `https`; http(s) passes through.
///
/// # Errors
///
/// Returns `RcError::InvalidServerUrl` for unparsable URLs or other schemes.
pub fn http_base_url(server_url: &str) -> Result<String, RcError> {
    let mut url =
        Url::parse(server_url).map_err(|_| RcError::InvalidServerUrl(server_url.to_string()))?;

    let scheme = match url.scheme() {
        "ws" | "http" => "http",
        "wss" | "https" => "https",
        _ => return Err(RcError::InvalidServerUrl(server_url.to_string())),
    };
    url.set_scheme(scheme)
        .map_err(|()| RcError::InvalidServerUrl(server_url.to_string()))?;

    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// HTTP client for the media server's Twirp APIs.
#[derive(Clone)]
pub struct TwirpClient {
    client: Client,
    base_url: String,
    grants: Arc<GrantBuilder>,
}

impl TwirpClient {
    /// Create a client for the server at `server_url` (ws, wss, http or https).
    ///
    /// # Errors
    ///
    /// - `RcError::InvalidServerUrl` if `server_url` is malformed
    /// - `RcError::Internal` if the HTTP client cannot be built
    pub fn new(server_url: &str, grants: Arc<GrantBuilder>) -> Result<Self, RcError> {
        let base_url = http_base_url(server_url)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(LIVEKIT_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(LIVEKIT_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                error!(target: "rc.services.livekit", error = %e, "Failed to build HTTP client");
                RcError::Internal(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url,
            grants,
        })
    }

    /// HTTP base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Invoke `service`/`method` with `body`, authenticated by a service
    /// token carrying `grant`.
    pub async fn call<Req, Resp>(
        &self,
        service: &'static str,
        method: &'static str,
        grant: VideoGrant,
        body: &Req,
    ) -> Result<Resp, TwirpError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let start = Instant::now();
        let result = self.send(service, method, grant, body).await;

        let status = match &result {
            Ok(_) => "success",
            Err(e) => e.metric_status(),
        };
        record_livekit_request(service_label(service), method, status, start.elapsed());

        result
    }

    async fn send<Req, Resp>(
        &self,
        service: &'static str,
        method: &'static str,
        grant: VideoGrant,
        body: &Req,
    ) -> Result<Resp, TwirpError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let token = match self.grants.mint_service_token(grant).await {
            Ok(token) => {
                record_token_minted("service", "success");
                token
            }
            Err(e) => {
                record_token_minted("service", "error");
                return Err(TwirpError::Credentials(e.to_string()));
            }
        };

        let url = format!("{}/twirp/{}/{}", self.base_url, service, method);
        debug!(target: "rc.services.livekit", service, method, "Calling media server");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "rc.services.livekit", service, method, error = %e, "Media server request failed");
                TwirpError::Transport(e.to_string())
            })?;

        let status = response.status();

        if status.is_success() {
            return response.json::<Resp>().await.map_err(|e| {
                error!(target: "rc.services.livekit", service, method, error = %e, "Failed to parse media server response");
                TwirpError::Decode(e.to_string())
            });
        }

        let text = response.text().await.unwrap_or_default();
        let body: TwirpErrorBody = serde_json::from_str(&text).unwrap_or_default();

        if status.is_server_error() {
            warn!(target: "rc.services.livekit", service, method, status = %status, code = %body.code, "Media server returned server error");
        } else if status.as_u16() == 404 && body.code != "not_found" {
            error!(target: "rc.services.livekit", service, method, status = %status, code = %body.code, "Media server route not found");
        } else if status.as_u16() == 401 || status.as_u16() == 403 {
            error!(target: "rc.services.livekit", service, method, status = %status, "Service token rejected by media server");
        } else {
            debug!(target: "rc.services.livekit", service, method, status = %status, code = %body.code, msg = %body.msg, "Media server rejected request");
        }

        Err(TwirpError::Api {
            status: status.as_u16(),
            code: body.code,
            msg: body.msg,
        })
    }
}

fn service_label(service: &str) -> &'static str {
    match service {
        ROOM_SERVICE => "room",
        EGRESS_SERVICE => "egress",
        _ => "other",
    }
}

/// Lenient `int64` decoding: protobuf JSON encodes 64-bit integers as
/// strings, but numbers are accepted too.
pub(crate) mod int64 {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(i64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(s) if s.is_empty() => Ok(0),
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
