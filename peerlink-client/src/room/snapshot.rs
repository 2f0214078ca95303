use peerlink_core::{
    ConnectionStatus, LinkRole, NegotiationState, ParticipantId, PeerConnectionState, RoomId,
};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct LinkSnapshot {
    pub remote_id: ParticipantId,
    pub role: LinkRole,
    pub negotiation: NegotiationState,
    pub connection: PeerConnectionState,
    pub local_tracks_attached: bool,
    pub remote_tracks: usize,
    pub pending_candidates: usize,
    pub age: Duration,
}

/// Point-in-time view of the session, for status displays and tests.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub status: ConnectionStatus,
    pub local_id: Option<ParticipantId>,
    pub room_id: Option<RoomId>,
    pub members: Vec<ParticipantId>,
    pub media_active: bool,
    pub links: Vec<LinkSnapshot>,
}

impl SessionSnapshot {
    pub fn link(&self, remote_id: &ParticipantId) -> Option<&LinkSnapshot> {
        self.links.iter().find(|l| &l.remote_id == remote_id)
    }
}
