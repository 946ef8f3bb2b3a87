//! Services for the Room Controller.
//!
//! # Components
//!
//! - `livekit` - Twirp transport to the media server API
//! - `room_directory` - Room and participant collaborator (passthrough)
//! - `egress` - Capture control collaborator
//! - `recording` - Recording Orchestrator

pub mod egress;
pub mod livekit;
pub mod recording;
pub mod room_directory;

pub use egress::{EgressControl, LiveKitEgressClient};
pub use livekit::TwirpClient;
pub use recording::{RecordingOrchestrator, RecordingRequest, RecordingSession};
pub use room_directory::{LiveKitRoomClient, RoomDirectory};
