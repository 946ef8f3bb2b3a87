//! Recording Orchestrator.
//!
//! Decides the capture strategy, builds the output descriptor, issues the
//! start command and fronts status/stop/list. It keeps no session state:
//! every query goes back to the egress control API.
//!
//! # Start sequence
//!
//! 1. Look the room up in the room directory (no egress call if unknown)
//! 2. Resolve the output format and build `<room>-<unix millis>.<ext>`
//! 3. Attach an S3 upload (path-style) when a sink was requested
//! 4. Composite capture: start against the room name.
//!    Web capture: mint a hidden, subscribe-only recorder token and start
//!    a headless browser on the caller's URL or on a viewer link built
//!    against the internal server address
//! 5. Report the egress id and status, `STARTING` when the status is omitted
//!
//! Every step failure aborts the start and is wrapped in
//! `RcError::RecordingStart`. Exactly one start command is issued per call
//! and nothing is retried.

use crate::config::SinkDefaults;
use crate::errors::RcError;
use crate::grants::{Capabilities, GrantBuilder, SessionGrant};
use crate::observability::metrics::{record_recording_start, record_token_minted};
use crate::services::egress::{
    EgressControl, EgressInfo, EgressOptions, EgressStatus, EncodedFileOutput, EncodingPreset,
    OutputFormat, S3Upload,
};
use crate::services::room_directory::RoomDirectory;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use url::Url;

/// Identity of the hidden participant that web capture joins as.
pub const RECORDER_IDENTITY: &str = "egress-recorder-bot";

/// How a room is captured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaptureStrategy {
    /// Record the room's mixed audio/video directly.
    #[default]
    RoomComposite,
    /// Record a headless browser joined to the room.
    Web,
}

impl CaptureStrategy {
    /// Metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RoomComposite => "room_composite",
            Self::Web => "web",
        }
    }
}

/// Requested S3-compatible destination; missing fields come from
/// [`SinkDefaults`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct S3Sink {
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

/// Input to [`RecordingOrchestrator::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingRequest {
    pub room_name: String,
    pub strategy: CaptureStrategy,
    pub output_format: OutputFormat,
    /// Passed through unvalidated, even together with `video_only`.
    pub audio_only: bool,
    pub video_only: bool,
    pub preset: EncodingPreset,
    /// Local file output when absent.
    pub sink: Option<S3Sink>,
    /// Web capture only: page to record instead of the generated viewer link.
    pub room_url: Option<String>,
}

impl RecordingRequest {
    /// Composite MP4 capture to a local file.
    pub fn new(room_name: impl Into<String>) -> Self {
        Self {
            room_name: room_name.into(),
            strategy: CaptureStrategy::default(),
            output_format: OutputFormat::default(),
            audio_only: false,
            video_only: false,
            preset: EncodingPreset::default(),
            sink: None,
            room_url: None,
        }
    }

    fn options(&self) -> EgressOptions {
        EgressOptions {
            audio_only: self.audio_only,
            video_only: self.video_only,
            preset: self.preset,
        }
    }
}

/// Handle of a capture plus its last reported status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordingSession {
    pub egress_id: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub room_name: String,

    pub status: EgressStatus,

    /// Unix nanoseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,

    /// Unix nanoseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<EgressInfo> for RecordingSession {
    fn from(info: EgressInfo) -> Self {
        Self {
            egress_id: info.egress_id,
            room_name: info.room_name,
            status: info.status.unwrap_or(EgressStatus::Starting),
            started_at: (info.started_at > 0).then_some(info.started_at),
            ended_at: (info.ended_at > 0).then_some(info.ended_at),
            error: (!info.error.is_empty()).then_some(info.error),
        }
    }
}

/// Output file name: `<room>-<unix millis>.<extension>`.
pub fn recording_filename(room_name: &str, format: OutputFormat, unix_millis: i64) -> String {
    format!("{}-{}.{}", room_name, unix_millis, format.extension())
}

/// Starts, stops and reports captures.
pub struct RecordingOrchestrator {
    rooms: Arc<dyn RoomDirectory>,
    egress: Arc<dyn EgressControl>,
    grants: Arc<GrantBuilder>,
    internal_url: String,
    sink_defaults: SinkDefaults,
}

impl RecordingOrchestrator {
    /// `internal_url` is the media server address the capture process
    /// reaches; it is only used for web capture viewer links.
    pub fn new(
        rooms: Arc<dyn RoomDirectory>,
        egress: Arc<dyn EgressControl>,
        grants: Arc<GrantBuilder>,
        internal_url: String,
        sink_defaults: SinkDefaults,
    ) -> Self {
        Self {
            rooms,
            egress,
            grants,
            internal_url,
            sink_defaults,
        }
    }

    /// Start a capture of `request.room_name`.
    ///
    /// # Errors
    ///
    /// `RcError::RecordingStart` wrapping the failing step's error
    /// (`RoomNotFound`, `BadRequest`, `CredentialSigning`,
    /// `InvalidServerUrl`, `CollaboratorUnavailable`, ...).
    #[instrument(
        skip_all,
        name = "rc.recording.start",
        fields(room = %request.room_name, strategy = request.strategy.as_str())
    )]
    pub async fn start(&self, request: &RecordingRequest) -> Result<RecordingSession, RcError> {
        let start = Instant::now();
        let strategy = request.strategy.as_str();

        match self.start_inner(request).await {
            Ok(session) => {
                record_recording_start(strategy, "success", start.elapsed());
                info!(
                    target: "rc.services.recording",
                    room = %request.room_name,
                    egress_id = %session.egress_id,
                    status = %session.status,
                    strategy,
                    "Recording started"
                );
                Ok(session)
            }
            Err(e) => {
                record_recording_start(strategy, "error", start.elapsed());
                warn!(
                    target: "rc.services.recording",
                    room = %request.room_name,
                    strategy,
                    error = %e,
                    "Recording start failed"
                );
                Err(RcError::recording_start(&request.room_name, e))
            }
        }
    }

    async fn start_inner(&self, request: &RecordingRequest) -> Result<RecordingSession, RcError> {
        if request.room_name.trim().is_empty() {
            return Err(RcError::BadRequest("room_name must not be empty".to_string()));
        }

        if self.rooms.lookup_room(&request.room_name).await?.is_none() {
            return Err(RcError::RoomNotFound(request.room_name.clone()));
        }

        let filepath = recording_filename(
            &request.room_name,
            request.output_format,
            chrono::Utc::now().timestamp_millis(),
        );
        let output = self.file_output(request, filepath)?;
        let options = request.options();

        let info = match request.strategy {
            CaptureStrategy::RoomComposite => {
                self.egress
                    .start_room_composite(&request.room_name, &output, &options)
                    .await?
            }
            CaptureStrategy::Web => {
                let url = self.web_capture_url(request).await?;
                self.egress.start_web(&url, &output, &options).await?
            }
        };

        Ok(RecordingSession::from(info))
    }

    fn file_output(
        &self,
        request: &RecordingRequest,
        filepath: String,
    ) -> Result<EncodedFileOutput, RcError> {
        let s3 = match &request.sink {
            None => None,
            Some(sink) => {
                if sink.bucket.trim().is_empty() {
                    return Err(RcError::BadRequest("s3_bucket must not be empty".to_string()));
                }
                Some(S3Upload {
                    access_key: self.sink_defaults.access_key.clone(),
                    secret: self.sink_defaults.secret_key.clone(),
                    region: sink
                        .region
                        .clone()
                        .unwrap_or_else(|| self.sink_defaults.region.clone()),
                    endpoint: sink
                        .endpoint
                        .clone()
                        .unwrap_or_else(|| self.sink_defaults.endpoint.clone()),
                    bucket: sink.bucket.clone(),
                    force_path_style: true,
                })
            }
        };

        Ok(EncodedFileOutput {
            file_type: request.output_format.file_type(),
            filepath,
            s3,
        })
    }

    /// Mint the recorder token and pick the page the browser records.
    ///
    /// The token is minted even when the caller supplies `room_url`.
    async fn web_capture_url(&self, request: &RecordingRequest) -> Result<String, RcError> {
        let bot = SessionGrant {
            capabilities: Capabilities::recorder(),
            ..SessionGrant::new(RECORDER_IDENTITY, request.room_name.as_str())
        };

        let token = match self.grants.mint(&bot).await {
            Ok(token) => {
                record_token_minted("recorder", "success");
                token
            }
            Err(e) => {
                record_token_minted("recorder", "error");
                return Err(e);
            }
        };

        match &request.room_url {
            Some(room_url) => {
                let valid = Url::parse(room_url)
                    .map(|u| matches!(u.scheme(), "http" | "https"))
                    .unwrap_or(false);
                if !valid {
                    return Err(RcError::BadRequest(
                        "room_url must be an http(s) URL".to_string(),
                    ));
                }
                Ok(room_url.clone())
            }
            None => self.grants.join_url(&self.internal_url, &token),
        }
    }

    /// Ask the egress API to stop a capture.
    ///
    /// # Errors
    ///
    /// `RcError::RecordingNotFound` if the id is unknown to the egress API.
    #[instrument(skip_all, name = "rc.recording.stop", fields(egress_id = %egress_id))]
    pub async fn stop(&self, egress_id: &str) -> Result<RecordingSession, RcError> {
        let info = self.egress.stop(egress_id).await?;
        let session = RecordingSession::from(info);

        if session.status.is_terminal() {
            warn!(
                target: "rc.services.recording",
                egress_id = %egress_id,
                status = %session.status,
                "Stop requested for a recording that already ended"
            );
        } else {
            info!(
                target: "rc.services.recording",
                egress_id = %egress_id,
                status = %session.status,
                "Recording stop requested"
            );
        }
        Ok(session)
    }

    /// Current status of one capture.
    ///
    /// The egress API has no get-by-id, so this scans the full list.
    ///
    /// # Errors
    ///
    /// `RcError::RecordingNotFound` if the id is not in the list.
    #[instrument(skip_all, name = "rc.recording.status", fields(egress_id = %egress_id))]
    pub async fn get_status(&self, egress_id: &str) -> Result<RecordingSession, RcError> {
        self.egress
            .list(None)
            .await?
            .into_iter()
            .find(|info| info.egress_id == egress_id)
            .map(RecordingSession::from)
            .ok_or_else(|| RcError::RecordingNotFound(egress_id.to_string()))
    }

    /// All captures, optionally for one room, in the egress API's order.
    #[instrument(skip_all, name = "rc.recording.list")]
    pub async fn list(&self, room_name: Option<&str>) -> Result<Vec<RecordingSession>, RcError> {
        Ok(self
            .egress
            .list(room_name)
            .await?
            .into_iter()
            .map(RecordingSession::from)
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::grants::signer::mock::MockSigner;
    use crate::services::egress::mock::{EgressCall, MockEgressControl};
    use crate::services::room_directory::mock::MockRoomDirectory;
    use common::secret::{ExposeSecret, SecretString};
    use std::time::Duration;

    const INTERNAL_URL: &str = "ws://livekit.internal:7880";

    struct Harness {
        rooms: Arc<MockRoomDirectory>,
        egress: Arc<MockEgressControl>,
        signer: Arc<MockSigner>,
        orchestrator: RecordingOrchestrator,
    }

    fn sink_defaults() -> SinkDefaults {
        SinkDefaults {
            access_key: SecretString::from("default-access"),
            secret_key: SecretString::from("default-secret"),
            region: "us-east-1".to_string(),
            endpoint: "https://minio.internal".to_string(),
        }
    }

    fn harness_with(
        rooms: MockRoomDirectory,
        egress: MockEgressControl,
        signer: MockSigner,
    ) -> Harness {
        let rooms = Arc::new(rooms);
        let egress = Arc::new(egress);
        let signer = Arc::new(signer);
        let grants = Arc::new(GrantBuilder::new(
            signer.clone(),
            Duration::from_secs(3600),
            "https://meet.livekit.io".to_string(),
        ));

        let orchestrator = RecordingOrchestrator::new(
            rooms.clone(),
            egress.clone(),
            grants,
            INTERNAL_URL.to_string(),
            sink_defaults(),
        );

        Harness {
            rooms,
            egress,
            signer,
            orchestrator,
        }
    }

    fn harness() -> Harness {
        harness_with(
            MockRoomDirectory::with_rooms(&["r1"]),
            MockEgressControl::new(),
            MockSigner::new(),
        )
    }

    fn only_call(egress: &MockEgressControl) -> EgressCall {
        let calls = egress.calls();
        assert_eq!(calls.len(), 1, "expected exactly one egress call");
        calls.into_iter().next().unwrap()
    }

    #[test]
    fn test_recording_filename() {
        assert_eq!(
            recording_filename("r1", OutputFormat::Mp4, 1_700_000_000_123),
            "r1-1700000000123.mp4"
        );
        assert_eq!(
            recording_filename("standup", OutputFormat::Webm, 5),
            "standup-5.webm"
        );
    }

    #[test]
    fn test_request_defaults() {
        let request = RecordingRequest::new("r1");
        assert_eq!(request.strategy, CaptureStrategy::RoomComposite);
        assert_eq!(request.output_format, OutputFormat::Mp4);
        assert!(!request.audio_only);
        assert!(!request.video_only);
        assert!(request.sink.is_none());
        assert!(request.room_url.is_none());
    }

    #[test]
    fn test_strategy_wire_names() {
        let web: CaptureStrategy = serde_json::from_str("\"WEB\"").unwrap();
        assert_eq!(web, CaptureStrategy::Web);
        let composite: CaptureStrategy = serde_json::from_str("\"ROOM_COMPOSITE\"").unwrap();
        assert_eq!(composite, CaptureStrategy::RoomComposite);
    }

    #[tokio::test]
    async fn test_room_composite_default_request() {
        let h = harness();

        let session = h
            .orchestrator
            .start(&RecordingRequest::new("r1"))
            .await
            .unwrap();

        assert_eq!(session.egress_id, "EG_mock_0");
        assert_eq!(session.status, EgressStatus::Starting);

        match only_call(&h.egress) {
            EgressCall::RoomComposite {
                room_name,
                output,
                options,
            } => {
                assert_eq!(room_name, "r1");
                assert_eq!(output.file_type, 1);
                assert!(output.s3.is_none());
                assert_eq!(options, EgressOptions::default());

                // r1-<unix millis>.mp4
                let millis: i64 = output
                    .filepath
                    .strip_prefix("r1-")
                    .and_then(|rest| rest.strip_suffix(".mp4"))
                    .unwrap()
                    .parse()
                    .unwrap();
                let now = chrono::Utc::now().timestamp_millis();
                assert!((now - 5_000..=now).contains(&millis), "timestamp {millis} not near {now}");
            }
            other => panic!("unexpected call: {other:?}"),
        }

        // No bot grant for composite capture
        assert_eq!(h.signer.call_count(), 0);
        assert_eq!(h.rooms.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_web_capture_mints_hidden_recorder_grant() {
        let h = harness();
        let mut request = RecordingRequest::new("r1");
        request.strategy = CaptureStrategy::Web;
        request.sink = Some(S3Sink {
            bucket: "b1".to_string(),
            ..S3Sink::default()
        });

        h.orchestrator.start(&request).await.unwrap();

        let claims = h.signer.signed_claims();
        assert_eq!(claims.len(), 1);
        let bot = claims.first().unwrap();
        assert_eq!(bot.identity, RECORDER_IDENTITY);
        assert_eq!(bot.video.room, "r1");
        assert_eq!(bot.video.can_publish, Some(false));
        assert_eq!(bot.video.can_subscribe, Some(true));
        assert_eq!(bot.video.hidden, Some(true));

        match only_call(&h.egress) {
            EgressCall::Web { url, output, .. } => {
                assert!(url.contains("liveKitUrl=ws%3A%2F%2Flivekit.internal%3A7880"));
                assert!(url.contains("token=signed.egress-recorder-bot.0"));

                let s3 = output.s3.unwrap();
                assert_eq!(s3.bucket, "b1");
                assert!(s3.force_path_style);
                assert_eq!(s3.region, "us-east-1");
                assert_eq!(s3.endpoint, "https://minio.internal");
                assert_eq!(s3.secret.expose_secret(), "default-secret");
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_web_capture_grant_is_independent_of_format_and_sink() {
        for format in [OutputFormat::Mp4, OutputFormat::Ogg, OutputFormat::Webm] {
            for sink in [None, Some(S3Sink::default())] {
                let h = harness();
                let mut request = RecordingRequest::new("r1");
                request.strategy = CaptureStrategy::Web;
                request.output_format = format;
                request.sink = sink.map(|s| S3Sink {
                    bucket: "b1".to_string(),
                    ..s
                });

                h.orchestrator.start(&request).await.unwrap();

                let claims = h.signer.signed_claims();
                assert_eq!(claims.len(), 1);
                let bot = claims.first().unwrap();
                assert_eq!(bot.identity, RECORDER_IDENTITY);
                assert_eq!(bot.video.can_publish, Some(false));
                assert_eq!(bot.video.can_subscribe, Some(true));
                assert_eq!(bot.video.hidden, Some(true));
                assert_eq!(h.egress.start_count(), 1);
            }
        }
    }

    #[tokio::test]
    async fn test_web_capture_uses_caller_url() {
        let h = harness();
        let mut request = RecordingRequest::new("r1");
        request.strategy = CaptureStrategy::Web;
        request.room_url = Some("https://app.example.com/rooms/r1".to_string());

        h.orchestrator.start(&request).await.unwrap();

        // Bot token is still minted
        assert_eq!(h.signer.call_count(), 1);
        match only_call(&h.egress) {
            EgressCall::Web { url, .. } => assert_eq!(url, "https://app.example.com/rooms/r1"),
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_web_capture_rejects_non_http_room_url() {
        let h = harness();
        let mut request = RecordingRequest::new("r1");
        request.strategy = CaptureStrategy::Web;
        request.room_url = Some("javascript:alert(1)".to_string());

        let result = h.orchestrator.start(&request).await;

        assert!(matches!(result.unwrap_err().root_cause(), RcError::BadRequest(_)));
        assert_eq!(h.egress.start_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_room_never_reaches_egress() {
        let h = harness();

        let result = h.orchestrator.start(&RecordingRequest::new("ghost")).await;

        let error = result.unwrap_err();
        assert!(matches!(error, RcError::RecordingStart { ref room, .. } if room == "ghost"));
        assert!(matches!(error.root_cause(), RcError::RoomNotFound(r) if r == "ghost"));
        assert!(h.egress.calls().is_empty());
        assert_eq!(h.signer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_signing_failure_issues_no_egress_command() {
        let h = harness_with(
            MockRoomDirectory::with_rooms(&["r1"]),
            MockEgressControl::new(),
            MockSigner::failing(),
        );
        let mut request = RecordingRequest::new("r1");
        request.strategy = CaptureStrategy::Web;

        let error = h.orchestrator.start(&request).await.unwrap_err();

        assert!(matches!(error.root_cause(), RcError::CredentialSigning(_)));
        assert_eq!(error.status_code(), 500);
        assert!(h.egress.calls().is_empty());
    }

    #[tokio::test]
    async fn test_directory_outage_is_wrapped() {
        let h = harness_with(
            MockRoomDirectory::unavailable(),
            MockEgressControl::new(),
            MockSigner::new(),
        );

        let error = h
            .orchestrator
            .start(&RecordingRequest::new("r1"))
            .await
            .unwrap_err();

        assert!(matches!(
            error.root_cause(),
            RcError::CollaboratorUnavailable(_)
        ));
        assert_eq!(error.status_code(), 503);
        assert!(h.egress.calls().is_empty());
    }

    #[tokio::test]
    async fn test_egress_failure_is_wrapped() {
        let h = harness_with(
            MockRoomDirectory::with_rooms(&["r1"]),
            MockEgressControl::unavailable(),
            MockSigner::new(),
        );

        let error = h
            .orchestrator
            .start(&RecordingRequest::new("r1"))
            .await
            .unwrap_err();

        assert!(matches!(error, RcError::RecordingStart { .. }));
        assert_eq!(error.status_code(), 503);
        // One attempt, no retry
        assert_eq!(h.egress.start_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_bucket_is_rejected() {
        let h = harness();
        let mut request = RecordingRequest::new("r1");
        request.sink = Some(S3Sink::default());

        let error = h.orchestrator.start(&request).await.unwrap_err();

        assert!(matches!(error.root_cause(), RcError::BadRequest(_)));
        assert!(h.egress.calls().is_empty());
    }

    #[tokio::test]
    async fn test_sink_overrides_region_and_endpoint() {
        let h = harness();
        let mut request = RecordingRequest::new("r1");
        request.output_format = OutputFormat::Ogg;
        request.sink = Some(S3Sink {
            bucket: "b1".to_string(),
            region: Some("eu-west-1".to_string()),
            endpoint: Some("https://s3.eu-west-1.amazonaws.com".to_string()),
        });

        h.orchestrator.start(&request).await.unwrap();

        match only_call(&h.egress) {
            EgressCall::RoomComposite { output, .. } => {
                assert_eq!(output.file_type, 2);
                assert!(output.filepath.ends_with(".ogg"));
                let s3 = output.s3.unwrap();
                assert_eq!(s3.region, "eu-west-1");
                assert_eq!(s3.endpoint, "https://s3.eu-west-1.amazonaws.com");
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_audio_and_video_only_pass_through_together() {
        let h = harness();
        let mut request = RecordingRequest::new("r1");
        request.audio_only = true;
        request.video_only = true;
        request.preset = EncodingPreset::FullHd60;

        h.orchestrator.start(&request).await.unwrap();

        match only_call(&h.egress) {
            EgressCall::RoomComposite { options, .. } => {
                assert!(options.audio_only);
                assert!(options.video_only);
                assert_eq!(options.preset, EncodingPreset::FullHd60);
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_omitted_start_status_reports_starting() {
        let h = harness_with(
            MockRoomDirectory::with_rooms(&["r1"]),
            MockEgressControl::without_start_status(),
            MockSigner::new(),
        );

        let session = h
            .orchestrator
            .start(&RecordingRequest::new("r1"))
            .await
            .unwrap();

        assert_eq!(session.status, EgressStatus::Starting);
    }

    fn info(id: &str, room: &str, status: Option<EgressStatus>) -> EgressInfo {
        EgressInfo {
            egress_id: id.to_string(),
            room_name: room.to_string(),
            status,
            ..EgressInfo::default()
        }
    }

    #[tokio::test]
    async fn test_get_status_scans_full_list() {
        let egress = MockEgressControl::with_sessions(vec![
            info("EG_1", "r1", Some(EgressStatus::Complete)),
            info("EG_2", "r2", Some(EgressStatus::Active)),
        ]);
        let h = harness_with(MockRoomDirectory::new(), egress, MockSigner::new());

        let session = h.orchestrator.get_status("EG_2").await.unwrap();

        assert_eq!(session.egress_id, "EG_2");
        assert_eq!(session.room_name, "r2");
        assert_eq!(session.status, EgressStatus::Active);
        assert!(matches!(only_call(&h.egress), EgressCall::List(None)));
    }

    #[tokio::test]
    async fn test_get_status_unknown_id() {
        let egress =
            MockEgressControl::with_sessions(vec![info("EG_1", "r1", Some(EgressStatus::Active))]);
        let h = harness_with(MockRoomDirectory::new(), egress, MockSigner::new());

        let result = h.orchestrator.get_status("EG_missing").await;

        assert!(matches!(result, Err(RcError::RecordingNotFound(id)) if id == "EG_missing"));
    }

    #[tokio::test]
    async fn test_list_preserves_server_order_and_filter() {
        let egress = MockEgressControl::with_sessions(vec![
            info("EG_3", "r1", Some(EgressStatus::Failed)),
            info("EG_1", "r2", None),
            info("EG_2", "r1", Some(EgressStatus::Active)),
        ]);
        let h = harness_with(MockRoomDirectory::new(), egress, MockSigner::new());

        let all = h.orchestrator.list(None).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|s| s.egress_id.as_str()).collect();
        assert_eq!(ids, vec!["EG_3", "EG_1", "EG_2"]);
        // Omitted status defaults to starting
        assert_eq!(all.get(1).unwrap().status, EgressStatus::Starting);

        let r1 = h.orchestrator.list(Some("r1")).await.unwrap();
        let ids: Vec<&str> = r1.iter().map(|s| s.egress_id.as_str()).collect();
        assert_eq!(ids, vec!["EG_3", "EG_2"]);
    }

    #[tokio::test]
    async fn test_stop_forwards_and_reports_status() {
        let egress =
            MockEgressControl::with_sessions(vec![info("EG_1", "r1", Some(EgressStatus::Active))]);
        let h = harness_with(MockRoomDirectory::new(), egress, MockSigner::new());

        let session = h.orchestrator.stop("EG_1").await.unwrap();
        assert_eq!(session.status, EgressStatus::Stopping);

        let result = h.orchestrator.stop("EG_missing").await;
        assert!(matches!(result, Err(RcError::RecordingNotFound(_))));
    }

    #[test]
    fn test_session_from_info_drops_zero_fields() {
        let session = RecordingSession::from(EgressInfo {
            egress_id: "EG_1".to_string(),
            status: Some(EgressStatus::Failed),
            started_at: 10,
            error: "pipeline crashed".to_string(),
            ..EgressInfo::default()
        });

        assert_eq!(session.started_at, Some(10));
        assert_eq!(session.ended_at, None);
        assert_eq!(session.error.as_deref(), Some("pipeline crashed"));

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["status"], "FAILED");
        assert!(json.get("ended_at").is_none());
        assert!(json.get("room_name").is_none());
    }
}
