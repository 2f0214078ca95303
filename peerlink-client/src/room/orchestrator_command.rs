use crate::room::snapshot::SessionSnapshot;
use crate::transport::LocalTrack;
use peerlink_core::{RoomId, UserData};
use std::fmt;
use tokio::sync::oneshot;

/// Requests from the application to the orchestrator loop.
pub enum OrchestratorCommand {
    JoinRoom {
        room_id: RoomId,
        user_data: Option<UserData>,
    },

    LeaveRoom,

    /// Local capture produced tracks; they are attached to current and future links.
    LocalMediaAvailable { tracks: Vec<LocalTrack> },

    /// Local capture stopped. Established links are left untouched.
    LocalMediaStopped,

    /// Local capture failed.
    LocalMediaFailed { reason: String },

    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },

    /// Close every link and stop the loop.
    Shutdown,
}

impl fmt::Debug for OrchestratorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorCommand::JoinRoom { room_id, .. } => {
                f.debug_struct("JoinRoom").field("room_id", room_id).finish()
            }
            OrchestratorCommand::LeaveRoom => f.write_str("LeaveRoom"),
            OrchestratorCommand::LocalMediaAvailable { tracks } => f
                .debug_struct("LocalMediaAvailable")
                .field("tracks", &tracks.len())
                .finish(),
            OrchestratorCommand::LocalMediaStopped => f.write_str("LocalMediaStopped"),
            OrchestratorCommand::LocalMediaFailed { reason } => f
                .debug_struct("LocalMediaFailed")
                .field("reason", reason)
                .finish(),
            OrchestratorCommand::Snapshot { .. } => f.write_str("Snapshot"),
            OrchestratorCommand::Shutdown => f.write_str("Shutdown"),
        }
    }
}
