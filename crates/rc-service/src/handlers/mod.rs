//! HTTP request handlers for the Room Controller.

pub mod health;
pub mod metrics;
pub mod recordings;
pub mod rooms;
pub mod tokens;

pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
pub use recordings::{get_recording, list_recordings, start_recording, stop_recording};
pub use rooms::{
    create_room, delete_room, get_room, list_participants, list_rooms, mute_track,
    remove_participant, update_room,
};
pub use tokens::{connection_info, create_token};
