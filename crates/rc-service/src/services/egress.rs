//! Egress control collaborator.
//!
//! Starts, stops and lists server-side captures. Status values are
//! reported by the media server and passed through; nothing here derives a
//! status locally except the documented default for an omitted field.

use crate::errors::RcError;
use crate::services::livekit::{int64, TwirpClient, EGRESS_SERVICE};
use common::jwt::VideoGrant;
use common::secret::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tracing::{info, instrument, warn};

/// Recording session status.
///
/// `STARTING → ACTIVE → STOPPING → {COMPLETE | FAILED | ABORTED}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EgressStatus {
    Starting,
    Active,
    Stopping,
    Complete,
    Failed,
    Aborted,
}

impl EgressStatus {
    /// Map a media server status name or number onto a session status.
    ///
    /// `EGRESS_LIMIT_REACHED` ends a capture with its output written, so it
    /// reports as `COMPLETE`.
    pub fn from_wire(value: &WireStatus) -> Option<Self> {
        let status = match value {
            WireStatus::Name(name) => match name.as_str() {
                "EGRESS_STARTING" => Self::Starting,
                "EGRESS_ACTIVE" => Self::Active,
                "EGRESS_ENDING" => Self::Stopping,
                "EGRESS_COMPLETE" | "EGRESS_LIMIT_REACHED" => Self::Complete,
                "EGRESS_FAILED" => Self::Failed,
                "EGRESS_ABORTED" => Self::Aborted,
                _ => return None,
            },
            WireStatus::Number(n) => match n {
                0 => Self::Starting,
                1 => Self::Active,
                2 => Self::Stopping,
                3 | 6 => Self::Complete,
                4 => Self::Failed,
                5 => Self::Aborted,
                _ => return None,
            },
        };
        Some(status)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Aborted)
    }
}

impl fmt::Display for EgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "STARTING",
            Self::Active => "ACTIVE",
            Self::Stopping => "STOPPING",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
            Self::Aborted => "ABORTED",
        };
        f.write_str(name)
    }
}

/// Status as it appears on the wire: protobuf JSON emits enum names, but
/// numbers are valid too.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireStatus {
    Name(String),
    Number(i32),
}

fn deserialize_status<'de, D>(deserializer: D) -> Result<Option<EgressStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<WireStatus>::deserialize(deserializer)? {
        None => Ok(None),
        Some(wire) => EgressStatus::from_wire(&wire)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown egress status {wire:?}"))),
    }
}

/// Container format of a file capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Mp4,
    Ogg,
    Webm,
}

impl OutputFormat {
    /// Numeric file type understood by the egress API.
    pub fn file_type(self) -> u8 {
        match self {
            Self::Mp4 => 1,
            Self::Ogg => 2,
            Self::Webm => 3,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Ogg => "ogg",
            Self::Webm => "webm",
        }
    }
}

/// Encoding preset forwarded to the capture pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodingPreset {
    #[default]
    #[serde(rename = "preset-hd-30")]
    Hd30,
    #[serde(rename = "preset-hd-60")]
    Hd60,
    #[serde(rename = "preset-full-hd-30")]
    FullHd30,
    #[serde(rename = "preset-full-hd-60")]
    FullHd60,
}

impl EncodingPreset {
    /// `EncodingOptionsPreset` value (H264_720P_30 = 0 ... H264_1080P_60 = 3).
    pub fn wire_value(self) -> u8 {
        match self {
            Self::Hd30 => 0,
            Self::Hd60 => 1,
            Self::FullHd30 => 2,
            Self::FullHd60 => 3,
        }
    }
}

/// S3-compatible upload target.
#[derive(Clone)]
pub struct S3Upload {
    pub access_key: SecretString,
    pub secret: SecretString,
    pub region: String,
    pub endpoint: String,
    pub bucket: String,
    /// Always true: non-AWS stores need path-style addressing.
    pub force_path_style: bool,
}

impl fmt::Debug for S3Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Upload")
            .field("access_key", &"[REDACTED]")
            .field("secret", &"[REDACTED]")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

impl Serialize for S3Upload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("S3Upload", 6)?;
        state.serialize_field("access_key", self.access_key.expose_secret())?;
        state.serialize_field("secret", self.secret.expose_secret())?;
        state.serialize_field("region", &self.region)?;
        state.serialize_field("endpoint", &self.endpoint)?;
        state.serialize_field("bucket", &self.bucket)?;
        state.serialize_field("force_path_style", &self.force_path_style)?;
        state.end()
    }
}

/// Where a capture is written: a bare file path, optionally uploaded to S3.
#[derive(Debug, Clone, Serialize)]
pub struct EncodedFileOutput {
    pub file_type: u8,
    pub filepath: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Upload>,
}

/// Capture options shared by both strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EgressOptions {
    pub audio_only: bool,
    pub video_only: bool,
    pub preset: EncodingPreset,
}

/// A capture as reported by the media server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EgressInfo {
    #[serde(default)]
    pub egress_id: String,

    #[serde(default)]
    pub room_id: String,

    #[serde(default)]
    pub room_name: String,

    /// Omitted on the wire when it is the zero value (starting).
    #[serde(default, deserialize_with = "deserialize_status")]
    pub status: Option<EgressStatus>,

    /// Unix nanoseconds.
    #[serde(default, deserialize_with = "int64::deserialize")]
    pub started_at: i64,

    /// Unix nanoseconds.
    #[serde(default, deserialize_with = "int64::deserialize")]
    pub ended_at: i64,

    #[serde(default)]
    pub error: String,
}

/// Trait for egress control operations (enables mocking in tests).
#[async_trait::async_trait]
pub trait EgressControl: Send + Sync {
    /// Capture the mixed output of `room_name`.
    async fn start_room_composite(
        &self,
        room_name: &str,
        output: &EncodedFileOutput,
        options: &EgressOptions,
    ) -> Result<EgressInfo, RcError>;

    /// Capture a headless browser rendering `url`.
    async fn start_web(
        &self,
        url: &str,
        output: &EncodedFileOutput,
        options: &EgressOptions,
    ) -> Result<EgressInfo, RcError>;

    async fn stop(&self, egress_id: &str) -> Result<EgressInfo, RcError>;

    /// List captures, optionally filtered by room, in server order.
    async fn list(&self, room_name: Option<&str>) -> Result<Vec<EgressInfo>, RcError>;
}

// Wire messages of livekit.Egress

#[derive(Serialize)]
struct RoomCompositeEgressRequest<'a> {
    room_name: &'a str,
    audio_only: bool,
    video_only: bool,
    preset: u8,
    file_outputs: [&'a EncodedFileOutput; 1],
}

#[derive(Serialize)]
struct WebEgressRequest<'a> {
    url: &'a str,
    audio_only: bool,
    video_only: bool,
    preset: u8,
    file_outputs: [&'a EncodedFileOutput; 1],
}

#[derive(Serialize)]
struct StopEgressRequest<'a> {
    egress_id: &'a str,
}

#[derive(Serialize)]
struct ListEgressRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    room_name: Option<&'a str>,
}

/// Items stay raw so one undecodable entry does not fail the whole list.
#[derive(Deserialize)]
struct ListEgressResponse {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

/// Decode one listed capture, dropping it if its status is unknown.
fn decode_listed(item: serde_json::Value) -> Option<EgressInfo> {
    let egress_id = item
        .get("egress_id")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();

    match serde_json::from_value(item) {
        Ok(info) => Some(info),
        Err(e) => {
            warn!(target: "rc.services.egress", egress_id = %egress_id, error = %e, "Dropping undecodable egress entry");
            None
        }
    }
}

/// Egress control backed by the media server's `Egress` service.
pub struct LiveKitEgressClient {
    twirp: TwirpClient,
}

impl LiveKitEgressClient {
    pub fn new(twirp: TwirpClient) -> Self {
        Self { twirp }
    }
}

#[async_trait::async_trait]
impl EgressControl for LiveKitEgressClient {
    #[instrument(skip_all, name = "rc.egress.start_room_composite", fields(room = %room_name))]
    async fn start_room_composite(
        &self,
        room_name: &str,
        output: &EncodedFileOutput,
        options: &EgressOptions,
    ) -> Result<EgressInfo, RcError> {
        let request = RoomCompositeEgressRequest {
            room_name,
            audio_only: options.audio_only,
            video_only: options.video_only,
            preset: options.preset.wire_value(),
            file_outputs: [output],
        };

        let info: EgressInfo = self
            .twirp
            .call(
                EGRESS_SERVICE,
                "StartRoomCompositeEgress",
                VideoGrant::room_record(),
                &request,
            )
            .await
            .map_err(|e| e.into_rc_error(|| RcError::RoomNotFound(room_name.to_string())))?;

        info!(target: "rc.services.egress", egress_id = %info.egress_id, room = %room_name, "Room composite egress started");
        Ok(info)
    }

    #[instrument(skip_all, name = "rc.egress.start_web")]
    async fn start_web(
        &self,
        url: &str,
        output: &EncodedFileOutput,
        options: &EgressOptions,
    ) -> Result<EgressInfo, RcError> {
        let request = WebEgressRequest {
            url,
            audio_only: options.audio_only,
            video_only: options.video_only,
            preset: options.preset.wire_value(),
            file_outputs: [output],
        };

        let info: EgressInfo = self
            .twirp
            .call(
                EGRESS_SERVICE,
                "StartWebEgress",
                VideoGrant::room_record(),
                &request,
            )
            .await
            .map_err(|e| {
                e.into_rc_error(|| RcError::Internal("StartWebEgress returned not_found".to_string()))
            })?;

        // The URL embeds a bearer token and is never logged
        info!(target: "rc.services.egress", egress_id = %info.egress_id, "Web egress started");
        Ok(info)
    }

    #[instrument(skip_all, name = "rc.egress.stop", fields(egress_id = %egress_id))]
    async fn stop(&self, egress_id: &str) -> Result<EgressInfo, RcError> {
        let info: EgressInfo = self
            .twirp
            .call(
                EGRESS_SERVICE,
                "StopEgress",
                VideoGrant::room_record(),
                &StopEgressRequest { egress_id },
            )
            .await
            .map_err(|e| e.into_rc_error(|| RcError::RecordingNotFound(egress_id.to_string())))?;

        info!(target: "rc.services.egress", egress_id = %egress_id, "Egress stop requested");
        Ok(info)
    }

    #[instrument(skip_all, name = "rc.egress.list")]
    async fn list(&self, room_name: Option<&str>) -> Result<Vec<EgressInfo>, RcError> {
        let response: ListEgressResponse = self
            .twirp
            .call(
                EGRESS_SERVICE,
                "ListEgress",
                VideoGrant::room_record(),
                &ListEgressRequest { room_name },
            )
            .await
            .map_err(|e| {
                e.into_rc_error(|| RcError::RoomNotFound(room_name.unwrap_or_default().to_string()))
            })?;

        Ok(response.items.into_iter().filter_map(decode_listed).collect())
    }
}

/// Mock egress control module for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};

    /// A call received by [`MockEgressControl`].
    #[derive(Debug, Clone)]
    pub enum EgressCall {
        RoomComposite {
            room_name: String,
            output: EncodedFileOutput,
            options: EgressOptions,
        },
        Web {
            url: String,
            output: EncodedFileOutput,
            options: EgressOptions,
        },
        Stop(String),
        List(Option<String>),
    }

    /// Egress control that records every call.
    ///
    /// Started captures are kept and show up in `list`, `stop` moves them to
    /// `STOPPING`.
    pub struct MockEgressControl {
        calls: Mutex<Vec<EgressCall>>,
        sessions: Mutex<Vec<EgressInfo>>,
        next_id: AtomicUsize,
        start_status: Option<EgressStatus>,
        return_error: Option<fn() -> RcError>,
    }

    impl Default for MockEgressControl {
        fn default() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                sessions: Mutex::new(Vec::new()),
                next_id: AtomicUsize::new(0),
                start_status: Some(EgressStatus::Starting),
                return_error: None,
            }
        }
    }

    impl MockEgressControl {
        pub fn new() -> Self {
            Self::default()
        }

        /// Start responses omit the status field.
        pub fn without_start_status() -> Self {
            Self {
                start_status: None,
                ..Self::default()
            }
        }

        /// Every call fails as if the media server were down.
        pub fn unavailable() -> Self {
            Self {
                return_error: Some(|| {
                    RcError::CollaboratorUnavailable("Mock egress unavailable".to_string())
                }),
                ..Self::default()
            }
        }

        /// Seed captures the server already knows about.
        pub fn with_sessions(sessions: Vec<EgressInfo>) -> Self {
            Self {
                sessions: Mutex::new(sessions),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<EgressCall> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Number of start commands (either strategy) received.
        pub fn start_count(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, EgressCall::RoomComposite { .. } | EgressCall::Web { .. }))
                .count()
        }

        fn record(&self, call: EgressCall) -> Result<(), RcError> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(call);

            match self.return_error {
                Some(error) => Err(error()),
                None => Ok(()),
            }
        }

        fn start(&self, room_name: &str) -> EgressInfo {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            let info = EgressInfo {
                egress_id: format!("EG_mock_{n}"),
                room_name: room_name.to_string(),
                status: self.start_status,
                ..EgressInfo::default()
            };
            self.sessions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(info.clone());
            info
        }
    }

    #[async_trait::async_trait]
    impl EgressControl for MockEgressControl {
        async fn start_room_composite(
            &self,
            room_name: &str,
            output: &EncodedFileOutput,
            options: &EgressOptions,
        ) -> Result<EgressInfo, RcError> {
            self.record(EgressCall::RoomComposite {
                room_name: room_name.to_string(),
                output: output.clone(),
                options: *options,
            })?;
            Ok(self.start(room_name))
        }

        async fn start_web(
            &self,
            url: &str,
            output: &EncodedFileOutput,
            options: &EgressOptions,
        ) -> Result<EgressInfo, RcError> {
            self.record(EgressCall::Web {
                url: url.to_string(),
                output: output.clone(),
                options: *options,
            })?;
            Ok(self.start(""))
        }

        async fn stop(&self, egress_id: &str) -> Result<EgressInfo, RcError> {
            self.record(EgressCall::Stop(egress_id.to_string()))?;

            let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
            let session = sessions
                .iter_mut()
                .find(|s| s.egress_id == egress_id)
                .ok_or_else(|| RcError::RecordingNotFound(egress_id.to_string()))?;
            session.status = Some(EgressStatus::Stopping);
            Ok(session.clone())
        }

        async fn list(&self, room_name: Option<&str>) -> Result<Vec<EgressInfo>, RcError> {
            self.record(EgressCall::List(room_name.map(str::to_string)))?;

            Ok(self
                .sessions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .filter(|s| room_name.map_or(true, |room| s.room_name == room))
                .cloned()
                .collect())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_mapping() {
        assert_eq!(OutputFormat::Mp4.file_type(), 1);
        assert_eq!(OutputFormat::Ogg.file_type(), 2);
        assert_eq!(OutputFormat::Webm.file_type(), 3);
        assert_eq!(OutputFormat::default(), OutputFormat::Mp4);
    }

    #[test]
    fn test_output_format_deserializes_lowercase() {
        let format: OutputFormat = serde_json::from_str("\"webm\"").unwrap();
        assert_eq!(format, OutputFormat::Webm);
        assert!(serde_json::from_str::<OutputFormat>("\"avi\"").is_err());
    }

    #[test]
    fn test_preset_names_and_wire_values() {
        let preset: EncodingPreset = serde_json::from_str("\"preset-full-hd-60\"").unwrap();
        assert_eq!(preset, EncodingPreset::FullHd60);
        assert_eq!(preset.wire_value(), 3);
        assert_eq!(EncodingPreset::default().wire_value(), 0);
    }

    #[test]
    fn test_status_from_wire_names() {
        let cases = [
            ("EGRESS_STARTING", EgressStatus::Starting),
            ("EGRESS_ACTIVE", EgressStatus::Active),
            ("EGRESS_ENDING", EgressStatus::Stopping),
            ("EGRESS_COMPLETE", EgressStatus::Complete),
            ("EGRESS_FAILED", EgressStatus::Failed),
            ("EGRESS_ABORTED", EgressStatus::Aborted),
            ("EGRESS_LIMIT_REACHED", EgressStatus::Complete),
        ];

        for (name, expected) in cases {
            assert_eq!(
                EgressStatus::from_wire(&WireStatus::Name(name.to_string())),
                Some(expected),
                "{name}"
            );
        }
        assert_eq!(
            EgressStatus::from_wire(&WireStatus::Name("EGRESS_EXPLODED".to_string())),
            None
        );
    }

    #[test]
    fn test_status_from_wire_numbers() {
        assert_eq!(
            EgressStatus::from_wire(&WireStatus::Number(1)),
            Some(EgressStatus::Active)
        );
        assert_eq!(
            EgressStatus::from_wire(&WireStatus::Number(6)),
            Some(EgressStatus::Complete)
        );
        assert_eq!(EgressStatus::from_wire(&WireStatus::Number(42)), None);
    }

    #[test]
    fn test_status_serializes_session_names() {
        assert_eq!(
            serde_json::to_string(&EgressStatus::Stopping).unwrap(),
            "\"STOPPING\""
        );
        assert_eq!(EgressStatus::Aborted.to_string(), "ABORTED");
        assert!(EgressStatus::Failed.is_terminal());
        assert!(!EgressStatus::Active.is_terminal());
    }

    #[test]
    fn test_egress_info_omitted_status_is_none() {
        let info: EgressInfo =
            serde_json::from_str(r#"{"egress_id":"EG_1","room_name":"standup"}"#).unwrap();
        assert_eq!(info.egress_id, "EG_1");
        assert_eq!(info.status, None);
    }

    #[test]
    fn test_egress_info_parses_status_and_timestamps() {
        let json = r#"{
            "egress_id": "EG_1",
            "room_name": "standup",
            "status": "EGRESS_ACTIVE",
            "started_at": "1700000000000000000"
        }"#;

        let info: EgressInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.status, Some(EgressStatus::Active));
        assert_eq!(info.started_at, 1_700_000_000_000_000_000);
    }

    #[test]
    fn test_egress_info_rejects_unknown_status() {
        let result = serde_json::from_str::<EgressInfo>(r#"{"status":"EGRESS_EXPLODED"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_listed_drops_only_unknown_status() {
        let items = vec![
            serde_json::json!({"egress_id": "EG_1", "status": "EGRESS_EXPLODED"}),
            serde_json::json!({"egress_id": "EG_2", "status": "EGRESS_COMPLETE"}),
        ];

        let decoded: Vec<EgressInfo> = items.into_iter().filter_map(decode_listed).collect();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded.first().unwrap().egress_id, "EG_2");
    }

    fn s3() -> S3Upload {
        S3Upload {
            access_key: SecretString::from("AKIA-test"),
            secret: SecretString::from("s3-secret-value"),
            region: "us-east-1".to_string(),
            endpoint: "https://minio.local".to_string(),
            bucket: "b1".to_string(),
            force_path_style: true,
        }
    }

    #[test]
    fn test_file_output_serializes_s3() {
        let output = EncodedFileOutput {
            file_type: 1,
            filepath: "r1-1700000000000.mp4".to_string(),
            s3: Some(s3()),
        };

        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["file_type"], 1);
        assert_eq!(json["s3"]["bucket"], "b1");
        assert_eq!(json["s3"]["secret"], "s3-secret-value");
        assert_eq!(json["s3"]["force_path_style"], true);
    }

    #[test]
    fn test_local_file_output_omits_s3() {
        let output = EncodedFileOutput {
            file_type: 2,
            filepath: "r1-1.ogg".to_string(),
            s3: None,
        };

        let json = serde_json::to_value(&output).unwrap();
        assert!(json.get("s3").is_none());
    }

    #[test]
    fn test_s3_debug_redacts_credentials() {
        let debug = format!("{:?}", s3());
        assert!(!debug.contains("AKIA-test"));
        assert!(!debug.contains("s3-secret-value"));
        assert!(debug.contains("b1"));
    }
}
