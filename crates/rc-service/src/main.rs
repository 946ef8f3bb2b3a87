//! Room Controller
//!
//! Issues room access tokens and orchestrates recordings against a
//! LiveKit media server.

use rc_service::config::Config;
use rc_service::grants::{GrantBuilder, HmacSigner};
use rc_service::observability::metrics::init_metrics_recorder;
use rc_service::routes::{self, AppState};
use rc_service::services::{
    LiveKitEgressClient, LiveKitRoomClient, RecordingOrchestrator, TwirpClient,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // LOG_FORMAT=json switches to structured JSON output
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rc_service=debug,room_controller=debug,tower_http=debug".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    info!("Starting Room Controller");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        livekit_url = %config.livekit_url,
        livekit_internal_url = %config.livekit_internal_url,
        token_ttl_seconds = config.token_ttl_seconds,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let signer = Arc::new(HmacSigner::new(
        config.api_key.clone(),
        config.api_secret.clone(),
    ));
    let grants = Arc::new(GrantBuilder::new(
        signer,
        Duration::from_secs(config.token_ttl_seconds),
        config.viewer_base_url.clone(),
    ));

    // Server API calls go to the internal address
    let twirp = TwirpClient::new(&config.livekit_internal_url, grants.clone()).map_err(|e| {
        error!("Failed to create media server client: {}", e);
        e
    })?;
    info!(base_url = %twirp.base_url(), "Media server API client ready");

    let rooms = Arc::new(LiveKitRoomClient::new(twirp.clone()));
    let egress = Arc::new(LiveKitEgressClient::new(twirp));

    let recordings = Arc::new(RecordingOrchestrator::new(
        rooms.clone(),
        egress,
        grants.clone(),
        config.livekit_internal_url.clone(),
        config.sink_defaults.clone(),
    ));

    let bind_address = config.bind_address.clone();
    let drain_seconds = config.drain_seconds;

    let state = Arc::new(AppState {
        config,
        grants,
        rooms,
        recordings,
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Room Controller listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(drain_seconds))
        .await?;

    info!("Room Controller shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and the drain period is over.
async fn shutdown_signal(drain_secs: u64) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (RC_DRAIN_SECONDS=0)");
    }
}
