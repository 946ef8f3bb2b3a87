//! Token signing collaborator.
//!
//! The Grant Builder only decides *what* goes into a token. Turning claims
//! into an opaque bearer string is the signer's job, which also owns the
//! issuer and time-bound claims (`iss`, `nbf`, `exp`).

use crate::errors::RcError;
use common::jwt::{AccessClaims, SignedClaims};
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::time::Duration;
use tracing::{error, instrument};

/// Trait for token signing (enables substituting fakes in tests).
#[async_trait::async_trait]
pub trait TokenSigner: Send + Sync {
    /// Sign `claims` into a bearer token valid for `ttl`.
    async fn sign(&self, claims: &AccessClaims, ttl: Duration) -> Result<String, RcError>;
}

/// HS256 signer keyed by an API key / secret pair.
#[derive(Debug)]
pub struct HmacSigner {
    api_key: String,
    api_secret: SecretString,
}

impl HmacSigner {
    pub fn new(api_key: String, api_secret: SecretString) -> Self {
        Self {
            api_key,
            api_secret,
        }
    }

    /// Sign with an explicit `now` (Unix seconds).
    pub fn sign_at(
        &self,
        claims: &AccessClaims,
        ttl: Duration,
        now: i64,
    ) -> Result<String, RcError> {
        let ttl_secs = i64::try_from(ttl.as_secs()).map_err(|_| {
            RcError::CredentialSigning(format!("token TTL out of range: {:?}", ttl))
        })?;

        let signed = SignedClaims {
            iss: self.api_key.clone(),
            nbf: now,
            exp: now.saturating_add(ttl_secs),
            claims: claims.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &signed,
            &EncodingKey::from_secret(self.api_secret.expose_secret().as_bytes()),
        )
        .map_err(|e| {
            error!(target: "rc.grants.signer", error = %e, "Failed to encode access token");
            RcError::CredentialSigning(e.to_string())
        })
    }
}

#[async_trait::async_trait]
impl TokenSigner for HmacSigner {
    #[instrument(skip_all, name = "rc.grants.sign")]
    async fn sign(&self, claims: &AccessClaims, ttl: Duration) -> Result<String, RcError> {
        self.sign_at(claims, ttl, chrono::Utc::now().timestamp())
    }
}

/// Mock signer module for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};

    /// Signer that records every claim set and returns predictable tokens.
    ///
    /// Tokens have the form `signed.<identity>.<n>` so tests can tell
    /// participant tokens from server API tokens (`signed..<n>`).
    #[derive(Default)]
    pub struct MockSigner {
        signed: Mutex<Vec<AccessClaims>>,
        call_count: AtomicUsize,
        return_error: bool,
    }

    impl MockSigner {
        /// Create a signer that always succeeds.
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a signer that always fails.
        pub fn failing() -> Self {
            Self {
                return_error: true,
                ..Self::default()
            }
        }

        /// Number of sign calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Claims passed to every successful sign call, in order.
        pub fn signed_claims(&self) -> Vec<AccessClaims> {
            self.signed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    #[async_trait::async_trait]
    impl TokenSigner for MockSigner {
        async fn sign(&self, claims: &AccessClaims, _ttl: Duration) -> Result<String, RcError> {
            let count = self.call_count.fetch_add(1, Ordering::SeqCst);

            if self.return_error {
                return Err(RcError::CredentialSigning(
                    "Mock signer error".to_string(),
                ));
            }

            self.signed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(claims.clone());

            Ok(format!("signed.{}.{}", claims.identity, count))
        }
    }

}
