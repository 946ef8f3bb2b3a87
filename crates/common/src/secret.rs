//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Use these types
//! for every sensitive value the Room Controller handles: the LiveKit API
//! secret, S3 credentials, and minted bearer tokens.
//!
//! `SecretString` implements `Debug` with redaction, so any struct that
//! derives `Debug` while holding a secret gets safe logging behavior for
//! free. Secrets are zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct SigningKey {
//!     api_key: String,
//!     api_secret: SecretString,
//! }
//!
//! let key = SigningKey {
//!     api_key: "APIabc123".to_string(),
//!     api_secret: SecretString::from("hmac-secret"),
//! };
//!
//! // The secret is redacted in Debug output.
//! assert!(!format!("{key:?}").contains("hmac-secret"));
//!
//! // Access requires an explicit call.
//! let secret: &str = key.api_secret.expose_secret();
//! assert_eq!(secret, "hmac-secret");
//! ```
//!
//! # Usage Guidelines
//!
//! Use `SecretString` for:
//! - The LiveKit API secret (HMAC signing key)
//! - S3 access keys and secret keys
//! - Bearer tokens held longer than a single request
//!
//! Use `SecretBox<T>` for binary key material.

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("livekit-secret");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("livekit-secret"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("s3-secret-key");
        assert_eq!(secret.expose_secret(), "s3-secret-key");
    }

    #[test]
    fn test_struct_with_secret_is_safe() {
        #[allow(dead_code)]
        #[derive(Debug)]
        struct S3Credentials {
            access_key: String,
            secret_key: SecretString,
        }

        let creds = S3Credentials {
            access_key: "minio".to_string(),
            secret_key: SecretString::from("minio-secret"),
        };

        let debug_str = format!("{creds:?}");

        assert!(debug_str.contains("minio"));
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("minio-secret"));
    }

    #[test]
    fn test_deserialize() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct ApiCredentials {
            api_key: String,
            api_secret: SecretString,
        }

        let json = r#"{"api_key": "devkey", "api_secret": "my-secret-value"}"#;
        let creds: ApiCredentials = serde_json::from_str(json).expect("deserialize");

        assert_eq!(creds.api_secret.expose_secret(), "my-secret-value");

        let debug = format!("{creds:?}");
        assert!(!debug.contains("my-secret-value"));
        assert!(debug.contains("REDACTED"));
    }
}
