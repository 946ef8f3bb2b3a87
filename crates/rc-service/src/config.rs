//! Room Controller configuration.
//!
//! Configuration is loaded from environment variables. The API secret and
//! S3 credentials are held as `SecretString` and redacted in Debug output.

use common::jwt::{DEFAULT_TOKEN_TTL, MAX_TOKEN_TTL};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Default public LiveKit server address.
pub const DEFAULT_LIVEKIT_URL: &str = "ws://localhost:7880";

/// Default viewer application used for join URLs.
pub const DEFAULT_VIEWER_BASE_URL: &str = "https://meet.livekit.io";

/// Default S3 region when a sink is requested without one.
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Default graceful shutdown drain period in seconds.
pub const DEFAULT_DRAIN_SECONDS: u64 = 30;

/// Defaults applied to S3 sinks that do not carry explicit values.
#[derive(Clone)]
pub struct SinkDefaults {
    /// S3 access key.
    pub access_key: SecretString,

    /// S3 secret key.
    pub secret_key: SecretString,

    /// Region used when the request names none.
    pub region: String,

    /// Endpoint used when the request names none (empty means AWS).
    pub endpoint: String,
}

impl fmt::Debug for SinkDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkDefaults")
            .field("access_key", &"[REDACTED]")
            .field("secret_key", &"[REDACTED]")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Room Controller configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:3000").
    pub bind_address: String,

    /// Public LiveKit address handed to clients and used for API calls.
    pub livekit_url: String,

    /// LiveKit address reachable from the egress capture process.
    /// Falls back to `livekit_url` when unset.
    pub livekit_internal_url: String,

    /// API key: token issuer and key id.
    pub api_key: String,

    /// API secret: HMAC signing key.
    pub api_secret: SecretString,

    /// Viewer application base URL for join links.
    pub viewer_base_url: String,

    /// Lifetime of participant tokens in seconds.
    pub token_ttl_seconds: u64,

    /// Defaults for S3 recording sinks.
    pub sink_defaults: SinkDefaults,

    /// Graceful shutdown drain period in seconds.
    pub drain_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("livekit_url", &self.livekit_url)
            .field("livekit_internal_url", &self.livekit_internal_url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("viewer_base_url", &self.viewer_base_url)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("sink_defaults", &self.sink_defaults)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid URL configuration: {0}")]
    InvalidUrl(String),

    #[error("Invalid token TTL configuration: {0}")]
    InvalidTokenTtl(String),

    #[error("Invalid drain period configuration: {0}")]
    InvalidDrainSeconds(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let api_key = required(vars, "LIVEKIT_API_KEY")?;
        let api_secret = SecretString::from(required(vars, "LIVEKIT_API_SECRET")?);

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let livekit_url = vars
            .get("LIVEKIT_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LIVEKIT_URL.to_string());
        validate_url("LIVEKIT_URL", &livekit_url, &["ws", "wss", "http", "https"])?;

        let livekit_internal_url = vars
            .get("LIVEKIT_INTERNAL_URL")
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| livekit_url.clone());
        validate_url(
            "LIVEKIT_INTERNAL_URL",
            &livekit_internal_url,
            &["ws", "wss", "http", "https"],
        )?;

        let viewer_base_url = vars
            .get("VIEWER_BASE_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_VIEWER_BASE_URL.to_string());
        validate_url("VIEWER_BASE_URL", &viewer_base_url, &["http", "https"])?;

        // Parse participant token TTL with validation
        let token_ttl_seconds = if let Some(value_str) = vars.get("TOKEN_TTL_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidTokenTtl(format!(
                    "TOKEN_TTL_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidTokenTtl(
                    "TOKEN_TTL_SECONDS must be greater than 0".to_string(),
                ));
            }

            if value > MAX_TOKEN_TTL.as_secs() {
                return Err(ConfigError::InvalidTokenTtl(format!(
                    "TOKEN_TTL_SECONDS must not exceed {} seconds, got {}",
                    MAX_TOKEN_TTL.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_TOKEN_TTL.as_secs()
        };

        let sink_defaults = SinkDefaults {
            access_key: SecretString::from(vars.get("S3_ACCESS_KEY").cloned().unwrap_or_default()),
            secret_key: SecretString::from(vars.get("S3_SECRET_KEY").cloned().unwrap_or_default()),
            region: vars
                .get("S3_REGION")
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or_else(|| DEFAULT_S3_REGION.to_string()),
            endpoint: vars.get("S3_ENDPOINT").cloned().unwrap_or_default(),
        };

        let drain_seconds = if let Some(value_str) = vars.get("RC_DRAIN_SECONDS") {
            value_str.parse().map_err(|e| {
                ConfigError::InvalidDrainSeconds(format!(
                    "RC_DRAIN_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?
        } else {
            DEFAULT_DRAIN_SECONDS
        };

        Ok(Config {
            bind_address,
            livekit_url,
            livekit_internal_url,
            api_key,
            api_secret,
            viewer_base_url,
            token_ttl_seconds,
            sink_defaults,
            drain_seconds,
        })
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn validate_url(name: &str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let parsed = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("{} is not a valid URL: {}", name, e)))?;

    if !schemes.contains(&parsed.scheme()) {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use one of {:?}, got '{}'",
            name,
            schemes,
            parsed.scheme()
        )));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            ("LIVEKIT_API_KEY".to_string(), "devkey".to_string()),
            ("LIVEKIT_API_SECRET".to_string(), "devsecret".to_string()),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.livekit_url, DEFAULT_LIVEKIT_URL);
        // Internal URL falls back to the public one
        assert_eq!(config.livekit_internal_url, DEFAULT_LIVEKIT_URL);
        assert_eq!(config.api_key, "devkey");
        assert_eq!(config.api_secret.expose_secret(), "devsecret");
        assert_eq!(config.viewer_base_url, DEFAULT_VIEWER_BASE_URL);
        assert_eq!(config.token_ttl_seconds, DEFAULT_TOKEN_TTL.as_secs());
        assert_eq!(config.sink_defaults.region, DEFAULT_S3_REGION);
        assert_eq!(config.sink_defaults.endpoint, "");
        assert_eq!(config.drain_seconds, DEFAULT_DRAIN_SECONDS);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert("LIVEKIT_URL".to_string(), "wss://media.example.com".to_string());
        vars.insert(
            "LIVEKIT_INTERNAL_URL".to_string(),
            "ws://livekit-server:7880".to_string(),
        );
        vars.insert(
            "VIEWER_BASE_URL".to_string(),
            "https://viewer.example.com".to_string(),
        );
        vars.insert("TOKEN_TTL_SECONDS".to_string(), "3600".to_string());
        vars.insert("S3_ACCESS_KEY".to_string(), "minio".to_string());
        vars.insert("S3_SECRET_KEY".to_string(), "minio-secret".to_string());
        vars.insert("S3_REGION".to_string(), "eu-west-1".to_string());
        vars.insert("S3_ENDPOINT".to_string(), "http://minio:9000".to_string());
        vars.insert("RC_DRAIN_SECONDS".to_string(), "0".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.livekit_url, "wss://media.example.com");
        assert_eq!(config.livekit_internal_url, "ws://livekit-server:7880");
        assert_eq!(config.viewer_base_url, "https://viewer.example.com");
        assert_eq!(config.token_ttl_seconds, 3600);
        assert_eq!(config.sink_defaults.access_key.expose_secret(), "minio");
        assert_eq!(config.sink_defaults.secret_key.expose_secret(), "minio-secret");
        assert_eq!(config.sink_defaults.region, "eu-west-1");
        assert_eq!(config.sink_defaults.endpoint, "http://minio:9000");
        assert_eq!(config.drain_seconds, 0);
    }

    #[test]
    fn test_from_vars_missing_api_key() {
        let mut vars = base_vars();
        vars.remove("LIVEKIT_API_KEY");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "LIVEKIT_API_KEY"));
    }

    #[test]
    fn test_from_vars_empty_api_secret_is_missing() {
        let mut vars = base_vars();
        vars.insert("LIVEKIT_API_SECRET".to_string(), String::new());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "LIVEKIT_API_SECRET")
        );
    }

    #[test]
    fn test_livekit_url_rejects_garbage() {
        let mut vars = base_vars();
        vars.insert("LIVEKIT_URL".to_string(), "not a url".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidUrl(msg)) if msg.contains("LIVEKIT_URL"))
        );
    }

    #[test]
    fn test_viewer_url_rejects_websocket_scheme() {
        let mut vars = base_vars();
        vars.insert("VIEWER_BASE_URL".to_string(), "ws://viewer".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidUrl(msg)) if msg.contains("VIEWER_BASE_URL"))
        );
    }

    #[test]
    fn test_token_ttl_rejects_zero() {
        let mut vars = base_vars();
        vars.insert("TOKEN_TTL_SECONDS".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidTokenTtl(msg)) if msg.contains("must be greater than 0"))
        );
    }

    #[test]
    fn test_token_ttl_rejects_too_large() {
        let mut vars = base_vars();
        vars.insert("TOKEN_TTL_SECONDS".to_string(), "604801".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidTokenTtl(msg)) if msg.contains("must not exceed 604800"))
        );
    }

    #[test]
    fn test_token_ttl_rejects_non_numeric() {
        let mut vars = base_vars();
        vars.insert("TOKEN_TTL_SECONDS".to_string(), "six-hours".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidTokenTtl(msg)) if msg.contains("must be a valid positive integer"))
        );
    }

    #[test]
    fn test_drain_seconds_rejects_negative() {
        let mut vars = base_vars();
        vars.insert("RC_DRAIN_SECONDS".to_string(), "-1".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidDrainSeconds(_))));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut vars = base_vars();
        vars.insert("S3_SECRET_KEY".to_string(), "minio-secret".to_string());
        let config = Config::from_vars(&vars).expect("Config should load successfully");

        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("devsecret"));
        assert!(!debug_output.contains("minio-secret"));
        // API key is an identifier, not a secret
        assert!(debug_output.contains("devkey"));
    }
}
