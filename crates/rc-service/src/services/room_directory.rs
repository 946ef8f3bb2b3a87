//! Room directory collaborator.
//!
//! The media server is the authority on which rooms exist and who is in
//! them. The Recording Orchestrator only needs [`RoomDirectory::lookup_room`];
//! the remaining operations are passthroughs used by the room endpoints.

use crate::errors::RcError;
use crate::services::livekit::{int64, Empty, TwirpClient, TwirpError, ROOM_SERVICE};
use common::jwt::VideoGrant;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Default seconds an empty room stays open.
pub const DEFAULT_EMPTY_TIMEOUT_SECS: u32 = 300;

/// Default participant cap; 0 means unlimited.
pub const DEFAULT_MAX_PARTICIPANTS: u32 = 0;

/// A room as reported by the media server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    #[serde(default)]
    pub sid: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub empty_timeout: u32,

    #[serde(default)]
    pub max_participants: u32,

    /// Unix seconds.
    #[serde(default, deserialize_with = "int64::deserialize")]
    pub creation_time: i64,

    #[serde(default)]
    pub metadata: String,

    #[serde(default)]
    pub num_participants: u32,

    #[serde(default)]
    pub num_publishers: u32,

    #[serde(default)]
    pub active_recording: bool,
}

/// A published track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    #[serde(default)]
    pub sid: String,

    /// `AUDIO`, `VIDEO` or `DATA`.
    #[serde(default, rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub muted: bool,

    /// `CAMERA`, `MICROPHONE`, `SCREEN_SHARE`, ...
    #[serde(default)]
    pub source: String,
}

/// A participant currently in a room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    #[serde(default)]
    pub sid: String,

    #[serde(default)]
    pub identity: String,

    #[serde(default)]
    pub name: String,

    /// `JOINING`, `JOINED`, `ACTIVE` or `DISCONNECTED`.
    #[serde(default)]
    pub state: String,

    #[serde(default)]
    pub metadata: String,

    /// Unix seconds.
    #[serde(default, deserialize_with = "int64::deserialize")]
    pub joined_at: i64,

    #[serde(default)]
    pub is_publisher: bool,

    #[serde(default)]
    pub tracks: Vec<TrackInfo>,
}

/// Settings for a new room.
///
/// Defaults are explicit: `max_participants = 0` is "unlimited", not
/// "unset".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateRoomOptions {
    pub name: String,
    pub empty_timeout: u32,
    pub max_participants: u32,
    pub metadata: String,
}

impl CreateRoomOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            empty_timeout: DEFAULT_EMPTY_TIMEOUT_SECS,
            max_participants: DEFAULT_MAX_PARTICIPANTS,
            metadata: String::new(),
        }
    }
}

/// Trait for room directory operations (enables mocking in tests).
#[async_trait::async_trait]
pub trait RoomDirectory: Send + Sync {
    /// Look up a single room by name; `None` if the room does not exist.
    async fn lookup_room(&self, name: &str) -> Result<Option<Room>, RcError>;

    /// List rooms, optionally restricted to `names`.
    async fn list_rooms(&self, names: &[String]) -> Result<Vec<Room>, RcError>;

    async fn create_room(&self, options: &CreateRoomOptions) -> Result<Room, RcError>;

    async fn delete_room(&self, name: &str) -> Result<(), RcError>;

    /// Replace the room's metadata string.
    async fn update_room_metadata(&self, name: &str, metadata: &str) -> Result<Room, RcError>;

    async fn list_participants(&self, room: &str) -> Result<Vec<ParticipantInfo>, RcError>;

    async fn remove_participant(&self, room: &str, identity: &str) -> Result<(), RcError>;

    /// Mute or unmute one of a participant's published tracks.
    async fn mute_published_track(
        &self,
        room: &str,
        identity: &str,
        track_sid: &str,
        muted: bool,
    ) -> Result<TrackInfo, RcError>;
}

// Wire messages of livekit.RoomService

#[derive(Serialize)]
struct ListRoomsRequest<'a> {
    names: &'a [String],
}

#[derive(Deserialize)]
struct ListRoomsResponse {
    #[serde(default)]
    rooms: Vec<Room>,
}

#[derive(Serialize)]
struct RoomRequest<'a> {
    room: &'a str,
}

#[derive(Serialize)]
struct UpdateRoomMetadataRequest<'a> {
    room: &'a str,
    metadata: &'a str,
}

#[derive(Deserialize)]
struct ListParticipantsResponse {
    #[serde(default)]
    participants: Vec<ParticipantInfo>,
}

#[derive(Serialize)]
struct RoomParticipantIdentity<'a> {
    room: &'a str,
    identity: &'a str,
}

#[derive(Serialize)]
struct MuteRoomTrackRequest<'a> {
    room: &'a str,
    identity: &'a str,
    track_sid: &'a str,
    muted: bool,
}

#[derive(Deserialize)]
struct MuteRoomTrackResponse {
    #[serde(default)]
    track: TrackInfo,
}

/// Room directory backed by the media server's `RoomService`.
pub struct LiveKitRoomClient {
    twirp: TwirpClient,
}

impl LiveKitRoomClient {
    pub fn new(twirp: TwirpClient) -> Self {
        Self { twirp }
    }
}

fn room_not_found(room: &str) -> impl FnOnce() -> RcError + '_ {
    move || RcError::RoomNotFound(room.to_string())
}

#[async_trait::async_trait]
impl RoomDirectory for LiveKitRoomClient {
    #[instrument(skip_all, name = "rc.rooms.lookup", fields(room = %name))]
    async fn lookup_room(&self, name: &str) -> Result<Option<Room>, RcError> {
        let rooms = self.list_rooms(&[name.to_string()]).await?;
        Ok(rooms.into_iter().find(|room| room.name == name))
    }

    #[instrument(skip_all, name = "rc.rooms.list")]
    async fn list_rooms(&self, names: &[String]) -> Result<Vec<Room>, RcError> {
        let response: ListRoomsResponse = self
            .twirp
            .call(
                ROOM_SERVICE,
                "ListRooms",
                VideoGrant::room_list(),
                &ListRoomsRequest { names },
            )
            .await
            .map_err(|e| e.into_rc_error(|| RcError::Internal("ListRooms returned not_found".to_string())))?;

        Ok(response.rooms)
    }

    #[instrument(skip_all, name = "rc.rooms.create", fields(room = %options.name))]
    async fn create_room(&self, options: &CreateRoomOptions) -> Result<Room, RcError> {
        let room: Room = self
            .twirp
            .call(ROOM_SERVICE, "CreateRoom", VideoGrant::room_create(), options)
            .await
            .map_err(|e| e.into_rc_error(room_not_found(&options.name)))?;

        info!(target: "rc.services.rooms", room = %room.name, sid = %room.sid, "Room created");
        Ok(room)
    }

    #[instrument(skip_all, name = "rc.rooms.delete", fields(room = %name))]
    async fn delete_room(&self, name: &str) -> Result<(), RcError> {
        let _: Empty = self
            .twirp
            .call(
                ROOM_SERVICE,
                "DeleteRoom",
                VideoGrant::room_create(),
                &RoomRequest { room: name },
            )
            .await
            .map_err(|e| e.into_rc_error(room_not_found(name)))?;

        info!(target: "rc.services.rooms", room = %name, "Room deleted");
        Ok(())
    }

    #[instrument(skip_all, name = "rc.rooms.update_metadata", fields(room = %name))]
    async fn update_room_metadata(&self, name: &str, metadata: &str) -> Result<Room, RcError> {
        self.twirp
            .call(
                ROOM_SERVICE,
                "UpdateRoomMetadata",
                VideoGrant::room_admin(name),
                &UpdateRoomMetadataRequest {
                    room: name,
                    metadata,
                },
            )
            .await
            .map_err(|e| e.into_rc_error(room_not_found(name)))
    }

    #[instrument(skip_all, name = "rc.rooms.list_participants", fields(room = %room))]
    async fn list_participants(&self, room: &str) -> Result<Vec<ParticipantInfo>, RcError> {
        let response: ListParticipantsResponse = self
            .twirp
            .call(
                ROOM_SERVICE,
                "ListParticipants",
                VideoGrant::room_admin(room),
                &RoomRequest { room },
            )
            .await
            .map_err(|e| e.into_rc_error(room_not_found(room)))?;

        Ok(response.participants)
    }

    #[instrument(skip_all, name = "rc.rooms.remove_participant", fields(room = %room))]
    async fn remove_participant(&self, room: &str, identity: &str) -> Result<(), RcError> {
        let _: Empty = self
            .twirp
            .call(
                ROOM_SERVICE,
                "RemoveParticipant",
                VideoGrant::room_admin(room),
                &RoomParticipantIdentity { room, identity },
            )
            .await
            .map_err(|e| e.into_rc_error(participant_not_found(room, identity)))?;

        info!(target: "rc.services.rooms", room = %room, "Participant removed");
        Ok(())
    }

    #[instrument(skip_all, name = "rc.rooms.mute_track", fields(room = %room, muted = muted))]
    async fn mute_published_track(
        &self,
        room: &str,
        identity: &str,
        track_sid: &str,
        muted: bool,
    ) -> Result<TrackInfo, RcError> {
        let response: MuteRoomTrackResponse = self
            .twirp
            .call(
                ROOM_SERVICE,
                "MutePublishedTrack",
                VideoGrant::room_admin(room),
                &MuteRoomTrackRequest {
                    room,
                    identity,
                    track_sid,
                    muted,
                },
            )
            .await
            .map_err(|e: TwirpError| e.into_rc_error(participant_not_found(room, identity)))?;

        Ok(response.track)
    }
}

fn participant_not_found<'a>(room: &'a str, identity: &'a str) -> impl FnOnce() -> RcError + 'a {
    move || RcError::ParticipantNotFound {
        room: room.to_string(),
        identity: identity.to_string(),
    }
}

/// Mock room directory module for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};

    /// In-memory room directory.
    ///
    /// Holds rooms and participants in memory, counts lookups, and can be
    /// switched to report the media server as unreachable.
    #[derive(Default)]
    pub struct MockRoomDirectory {
        rooms: Mutex<Vec<Room>>,
        participants: Mutex<Vec<(String, ParticipantInfo)>>,
        lookup_count: AtomicUsize,
        unavailable: bool,
    }

    impl MockRoomDirectory {
        /// Directory with no rooms.
        pub fn new() -> Self {
            Self::default()
        }

        /// Directory that already knows the given rooms.
        pub fn with_rooms(names: &[&str]) -> Self {
            let directory = Self::new();
            for name in names {
                directory.add_room(name);
            }
            directory
        }

        /// Directory whose every call fails as if the server were down.
        pub fn unavailable() -> Self {
            Self {
                unavailable: true,
                ..Self::default()
            }
        }

        pub fn add_room(&self, name: &str) {
            self.lock_rooms().push(Room {
                sid: format!("RM_{name}"),
                name: name.to_string(),
                empty_timeout: DEFAULT_EMPTY_TIMEOUT_SECS,
                ..Room::default()
            });
        }

        /// Put a participant with one unmuted audio track into `room`.
        pub fn add_participant(&self, room: &str, identity: &str) {
            self.lock_participants().push((
                room.to_string(),
                ParticipantInfo {
                    sid: format!("PA_{identity}"),
                    identity: identity.to_string(),
                    name: identity.to_string(),
                    state: "ACTIVE".to_string(),
                    is_publisher: true,
                    tracks: vec![TrackInfo {
                        sid: format!("TR_{identity}"),
                        kind: "AUDIO".to_string(),
                        source: "MICROPHONE".to_string(),
                        ..TrackInfo::default()
                    }],
                    ..ParticipantInfo::default()
                },
            ));
        }

        /// Number of `lookup_room` calls made.
        pub fn lookup_count(&self) -> usize {
            self.lookup_count.load(Ordering::SeqCst)
        }

        pub fn room_names(&self) -> Vec<String> {
            self.lock_rooms().iter().map(|r| r.name.clone()).collect()
        }

        fn lock_rooms(&self) -> std::sync::MutexGuard<'_, Vec<Room>> {
            self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
        }

        fn lock_participants(&self) -> std::sync::MutexGuard<'_, Vec<(String, ParticipantInfo)>> {
            self.participants
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
        }

        fn check_available(&self) -> Result<(), RcError> {
            if self.unavailable {
                return Err(RcError::CollaboratorUnavailable(
                    "Mock room directory unavailable".to_string(),
                ));
            }
            Ok(())
        }

        fn require_room(&self, name: &str) -> Result<(), RcError> {
            if self.lock_rooms().iter().any(|r| r.name == name) {
                Ok(())
            } else {
                Err(RcError::RoomNotFound(name.to_string()))
            }
        }
    }

    #[async_trait::async_trait]
    impl RoomDirectory for MockRoomDirectory {
        async fn lookup_room(&self, name: &str) -> Result<Option<Room>, RcError> {
            self.lookup_count.fetch_add(1, Ordering::SeqCst);
            self.check_available()?;
            Ok(self.lock_rooms().iter().find(|r| r.name == name).cloned())
        }

        async fn list_rooms(&self, names: &[String]) -> Result<Vec<Room>, RcError> {
            self.check_available()?;
            Ok(self
                .lock_rooms()
                .iter()
                .filter(|r| names.is_empty() || names.contains(&r.name))
                .cloned()
                .collect())
        }

        async fn create_room(&self, options: &CreateRoomOptions) -> Result<Room, RcError> {
            self.check_available()?;
            let mut rooms = self.lock_rooms();

            // Creating an existing room returns it unchanged
            if let Some(existing) = rooms.iter().find(|r| r.name == options.name) {
                return Ok(existing.clone());
            }

            let room = Room {
                sid: format!("RM_{}", options.name),
                name: options.name.clone(),
                empty_timeout: options.empty_timeout,
                max_participants: options.max_participants,
                metadata: options.metadata.clone(),
                ..Room::default()
            };
            rooms.push(room.clone());
            Ok(room)
        }

        async fn delete_room(&self, name: &str) -> Result<(), RcError> {
            self.check_available()?;
            self.require_room(name)?;
            self.lock_rooms().retain(|r| r.name != name);
            self.lock_participants().retain(|(room, _)| room != name);
            Ok(())
        }

        async fn update_room_metadata(&self, name: &str, metadata: &str) -> Result<Room, RcError> {
            self.check_available()?;
            let mut rooms = self.lock_rooms();
            let room = rooms
                .iter_mut()
                .find(|r| r.name == name)
                .ok_or_else(|| RcError::RoomNotFound(name.to_string()))?;
            room.metadata = metadata.to_string();
            Ok(room.clone())
        }

        async fn list_participants(&self, room: &str) -> Result<Vec<ParticipantInfo>, RcError> {
            self.check_available()?;
            self.require_room(room)?;
            Ok(self
                .lock_participants()
                .iter()
                .filter(|(r, _)| r == room)
                .map(|(_, p)| p.clone())
                .collect())
        }

        async fn remove_participant(&self, room: &str, identity: &str) -> Result<(), RcError> {
            self.check_available()?;
            let mut participants = self.lock_participants();
            let before = participants.len();
            participants.retain(|(r, p)| !(r == room && p.identity == identity));

            if participants.len() == before {
                return Err(participant_not_found(room, identity)());
            }
            Ok(())
        }

        async fn mute_published_track(
            &self,
            room: &str,
            identity: &str,
            track_sid: &str,
            muted: bool,
        ) -> Result<TrackInfo, RcError> {
            self.check_available()?;
            let mut participants = self.lock_participants();
            let participant = participants
                .iter_mut()
                .find(|(r, p)| r == room && p.identity == identity)
                .map(|(_, p)| p)
                .ok_or_else(participant_not_found(room, identity))?;

            let track = participant
                .tracks
                .iter_mut()
                .find(|t| t.sid == track_sid)
                .ok_or_else(|| RcError::BadRequest(format!("Unknown track: {track_sid}")))?;
            track.muted = muted;
            Ok(track.clone())
        }
    }

}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_room_defaults() {
        let options = CreateRoomOptions::new("standup");
        assert_eq!(options.empty_timeout, 300);
        assert_eq!(options.max_participants, 0);
        assert!(options.metadata.is_empty());
    }

    #[test]
    fn test_create_room_serializes_zero_cap() {
        let json = serde_json::to_value(CreateRoomOptions::new("standup")).unwrap();
        assert_eq!(json["name"], "standup");
        assert_eq!(json["empty_timeout"], 300);
        assert_eq!(json["max_participants"], 0);
    }

    #[test]
    fn test_room_deserializes_protobuf_json() {
        let json = r#"{
            "sid": "RM_abc",
            "name": "standup",
            "empty_timeout": 300,
            "creation_time": "1700000000",
            "num_participants": 2
        }"#;

        let room: Room = serde_json::from_str(json).unwrap();
        assert_eq!(room.name, "standup");
        assert_eq!(room.creation_time, 1_700_000_000);
        assert_eq!(room.num_participants, 2);
        // Omitted zero values
        assert_eq!(room.max_participants, 0);
        assert!(!room.active_recording);
    }

    #[test]
    fn test_participant_deserializes_tracks() {
        let json = r#"{
            "identity": "alice",
            "state": "ACTIVE",
            "joined_at": "1700000000",
            "tracks": [{"sid": "TR_1", "type": "VIDEO", "source": "CAMERA", "muted": true}]
        }"#;

        let participant: ParticipantInfo = serde_json::from_str(json).unwrap();
        assert_eq!(participant.identity, "alice");
        let track = participant.tracks.first().unwrap();
        assert_eq!(participant.tracks.len(), 1);
        assert_eq!(track.kind, "VIDEO");
        assert!(track.muted);
    }
}
