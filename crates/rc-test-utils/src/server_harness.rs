//! Test server harness for E2E testing
//!
//! Provides `TestRcServer` for spawning real RC server instances in tests.
//! The media server is replaced by the in-memory room directory and egress
//! mocks; tokens are signed for real with [`TEST_API_KEY`]/[`TEST_API_SECRET`].

use metrics_exporter_prometheus::PrometheusBuilder;
use rc_service::config::Config;
use rc_service::grants::{GrantBuilder, HmacSigner};
use rc_service::routes::{self, AppState};
use rc_service::services::egress::mock::MockEgressControl;
use rc_service::services::room_directory::mock::MockRoomDirectory;
use rc_service::services::RecordingOrchestrator;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// API key the harness signs tokens with.
pub const TEST_API_KEY: &str = "APItestkey";

/// API secret the harness signs tokens with.
pub const TEST_API_SECRET: &str = "test-secret-that-is-long-enough-for-hs256";

/// Public media server URL handed to clients.
pub const TEST_LIVEKIT_URL: &str = "wss://media.test.example";

/// Internal media server URL used by capture processes.
pub const TEST_LIVEKIT_INTERNAL_URL: &str = "http://livekit.internal:7880";

/// Viewer application base URL.
pub const TEST_VIEWER_BASE_URL: &str = "https://meet.test.example";

/// Test harness for spawning the Room Controller in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_start_recording() -> Result<(), anyhow::Error> {
///     let server = TestRcServer::spawn_with(
///         MockRoomDirectory::with_rooms(&["r1"]),
///         MockEgressControl::new(),
///     )
///     .await?;
///
///     let response = reqwest::Client::new()
///         .post(format!("{}/api/v1/recordings/start", server.url()))
///         .json(&serde_json::json!({"room_name": "r1"}))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 201);
///     assert_eq!(server.egress().start_count(), 1);
///     Ok(())
/// }
/// ```
pub struct TestRcServer {
    addr: SocketAddr,
    config: Config,
    rooms: Arc<MockRoomDirectory>,
    egress: Arc<MockEgressControl>,
    _handle: JoinHandle<()>,
}

impl TestRcServer {
    /// Spawn a server with no rooms and an accepting egress mock.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(MockRoomDirectory::new(), MockEgressControl::new()).await
    }

    /// Spawn a server backed by the given collaborators.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn_with(
        rooms: MockRoomDirectory,
        egress: MockEgressControl,
    ) -> Result<Self, anyhow::Error> {
        let config = Config::from_vars(&test_vars())
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let signer = Arc::new(HmacSigner::new(
            config.api_key.clone(),
            config.api_secret.clone(),
        ));
        let grants = Arc::new(GrantBuilder::new(
            signer,
            Duration::from_secs(config.token_ttl_seconds),
            config.viewer_base_url.clone(),
        ));

        let rooms = Arc::new(rooms);
        let egress = Arc::new(egress);
        let recordings = Arc::new(RecordingOrchestrator::new(
            rooms.clone(),
            egress.clone(),
            grants.clone(),
            config.livekit_internal_url.clone(),
            config.sink_defaults.clone(),
        ));

        let state = Arc::new(AppState {
            config: config.clone(),
            grants,
            rooms: rooms.clone(),
            recordings,
        });

        // The global recorder can only be installed once per process;
        // an uninstalled recorder still renders /metrics.
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        // Build routes using rc-service's real route builder
        let app = routes::build_routes(state, metrics_handle);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            rooms,
            egress,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The room directory the server talks to.
    pub fn rooms(&self) -> &MockRoomDirectory {
        &self.rooms
    }

    /// The egress control the server talks to.
    pub fn egress(&self) -> &MockEgressControl {
        &self.egress
    }
}

impl Drop for TestRcServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

fn test_vars() -> HashMap<String, String> {
    HashMap::from([
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ("LIVEKIT_URL".to_string(), TEST_LIVEKIT_URL.to_string()),
        (
            "LIVEKIT_INTERNAL_URL".to_string(),
            TEST_LIVEKIT_INTERNAL_URL.to_string(),
        ),
        ("LIVEKIT_API_KEY".to_string(), TEST_API_KEY.to_string()),
        ("LIVEKIT_API_SECRET".to_string(), TEST_API_SECRET.to_string()),
        ("VIEWER_BASE_URL".to_string(), TEST_VIEWER_BASE_URL.to_string()),
        ("S3_ACCESS_KEY".to_string(), "test-access-key".to_string()),
        ("S3_SECRET_KEY".to_string(), "test-secret-key".to_string()),
        ("S3_REGION".to_string(), "us-east-1".to_string()),
        ("RC_DRAIN_SECONDS".to_string(), "0".to_string()),
    ])
}
