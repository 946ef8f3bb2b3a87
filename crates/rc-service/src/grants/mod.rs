//! Grant Builder.
//!
//! Turns a requested identity and capability flags into a signed room
//! access token. Used for end-user tokens and for the recorder bot that
//! joins rooms during web capture.
//!
//! The builder is stateless apart from its injected signer: it is safe to
//! call concurrently, and two calls with the same grant produce tokens that
//! differ only in their time-bound claims.

pub mod signer;

use crate::errors::RcError;
use common::jwt::{AccessClaims, VideoGrant, SERVICE_TOKEN_TTL};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

pub use signer::{HmacSigner, TokenSigner};

/// Room capabilities of a participant.
///
/// Every flag defaults to allowed except `hidden`. An absent flag in a
/// request means "default", never "false".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub can_publish: bool,
    pub can_subscribe: bool,
    pub can_publish_data: bool,
    pub hidden: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            can_publish: true,
            can_subscribe: true,
            can_publish_data: true,
            hidden: false,
        }
    }
}

impl Capabilities {
    /// Resolve optional request flags against the documented defaults.
    pub fn resolve(
        can_publish: Option<bool>,
        can_subscribe: Option<bool>,
        can_publish_data: Option<bool>,
        hidden: Option<bool>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            can_publish: can_publish.unwrap_or(defaults.can_publish),
            can_subscribe: can_subscribe.unwrap_or(defaults.can_subscribe),
            can_publish_data: can_publish_data.unwrap_or(defaults.can_publish_data),
            hidden: hidden.unwrap_or(defaults.hidden),
        }
    }

    /// Capabilities of the recorder bot: subscribe-only and invisible.
    pub fn recorder() -> Self {
        Self::resolve(Some(false), Some(true), None, Some(true))
    }
}

/// Request to mint a room access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    /// Participant identity, unique within the room.
    pub identity: String,

    /// Display name; the identity is used when absent.
    pub name: Option<String>,

    /// Opaque caller-defined metadata.
    pub metadata: String,

    /// Room the token is valid for.
    pub room: String,

    pub capabilities: Capabilities,
}

impl SessionGrant {
    /// Grant with default capabilities and no metadata.
    pub fn new(identity: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            name: None,
            metadata: String::new(),
            room: room.into(),
            capabilities: Capabilities::default(),
        }
    }

    /// Claims binding identity, display name, metadata and the room grant.
    pub fn to_claims(&self) -> AccessClaims {
        let name = self
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.identity)
            .to_string();

        AccessClaims {
            identity: self.identity.clone(),
            name,
            metadata: self.metadata.clone(),
            video: VideoGrant {
                room_join: true,
                room: self.room.clone(),
                can_publish: Some(self.capabilities.can_publish),
                can_subscribe: Some(self.capabilities.can_subscribe),
                can_publish_data: Some(self.capabilities.can_publish_data),
                hidden: Some(self.capabilities.hidden),
                ..VideoGrant::default()
            },
        }
    }

    fn validate(&self) -> Result<(), RcError> {
        if self.identity.trim().is_empty() {
            return Err(RcError::BadRequest(
                "Participant identity must not be empty".to_string(),
            ));
        }
        if self.room.trim().is_empty() {
            return Err(RcError::BadRequest("Room name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// A minted token together with a ready-to-open viewer link.
#[derive(Debug, Clone, Serialize)]
pub struct MintedToken {
    pub token: String,
    pub viewer_url: String,
}

/// Builds and signs room access tokens.
pub struct GrantBuilder {
    signer: Arc<dyn TokenSigner>,
    token_ttl: Duration,
    viewer_base_url: String,
}

impl GrantBuilder {
    pub fn new(signer: Arc<dyn TokenSigner>, token_ttl: Duration, viewer_base_url: String) -> Self {
        Self {
            signer,
            token_ttl,
            viewer_base_url,
        }
    }

    /// Mint a participant token.
    ///
    /// # Errors
    ///
    /// - `RcError::BadRequest` if identity or room is empty
    /// - `RcError::CredentialSigning` if the signer fails
    #[instrument(skip_all, name = "rc.grants.mint", fields(room = %grant.room))]
    pub async fn mint(&self, grant: &SessionGrant) -> Result<String, RcError> {
        grant.validate()?;

        let token = self.signer.sign(&grant.to_claims(), self.token_ttl).await?;

        debug!(
            target: "rc.grants",
            room = %grant.room,
            hidden = grant.capabilities.hidden,
            can_publish = grant.capabilities.can_publish,
            "Access token minted"
        );

        Ok(token)
    }

    /// Mint a participant token and the viewer link for `server_url`.
    pub async fn mint_token(
        &self,
        grant: &SessionGrant,
        server_url: &str,
    ) -> Result<MintedToken, RcError> {
        let token = self.mint(grant).await?;
        let viewer_url = self.join_url(server_url, &token)?;
        Ok(MintedToken { token, viewer_url })
    }

    /// Sign a short-lived token for a server API call.
    pub async fn mint_service_token(&self, video: VideoGrant) -> Result<String, RcError> {
        self.signer
            .sign(&AccessClaims::service(video), SERVICE_TOKEN_TTL)
            .await
    }

    /// Viewer link for `server_url` authenticated with `token`.
    pub fn join_url(&self, server_url: &str, token: &str) -> Result<String, RcError> {
        viewer_url(&self.viewer_base_url, server_url, token)
    }
}

/// Build `<viewer>/custom?liveKitUrl=<server>&token=<token>` with both values
/// percent-encoded.
///
/// # Errors
///
/// Returns `RcError::InvalidServerUrl` if either URL does not parse or uses
/// an unexpected scheme.
pub fn viewer_url(viewer_base_url: &str, server_url: &str, token: &str) -> Result<String, RcError> {
    check_url(viewer_base_url, &["http", "https"])?;
    check_url(server_url, &["ws", "wss", "http", "https"])?;

    Ok(format!(
        "{}/custom?liveKitUrl={}&token={}",
        viewer_base_url.trim_end_matches('/'),
        urlencoding::encode(server_url),
        urlencoding::encode(token)
    ))
}

fn check_url(value: &str, schemes: &[&str]) -> Result<(), RcError> {
    let parsed = Url::parse(value).map_err(|_| RcError::InvalidServerUrl(value.to_string()))?;
    if !schemes.contains(&parsed.scheme()) || parsed.host_str().is_none() {
        return Err(RcError::InvalidServerUrl(value.to_string()));
    }
    Ok(())
}
