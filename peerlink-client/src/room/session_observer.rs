use crate::transport::RemoteTrack;
use async_trait::async_trait;
use peerlink_core::{
    ConnectionStatus, NegotiationState, ParticipantId, PeerConnectionState, RoomId,
};

/// Hooks the application implements to follow the session.
///
/// Every method has an empty default, so implementors only override what they
/// care about. Calls are made from the orchestrator loop and should return quickly.
#[async_trait]
pub trait SessionObserver: Send + Sync + 'static {
    async fn on_status(&self, _status: ConnectionStatus) {}

    async fn on_members(&self, _room_id: &RoomId, _members: &[ParticipantId]) {}

    async fn on_negotiation(&self, _remote_id: &ParticipantId, _state: NegotiationState) {}

    async fn on_connection_state(&self, _remote_id: &ParticipantId, _state: PeerConnectionState) {
    }

    async fn on_remote_track(&self, _remote_id: &ParticipantId, _track: &RemoteTrack) {}

    async fn on_link_closed(&self, _remote_id: &ParticipantId) {}

    /// Local media could not be acquired. Existing links keep running.
    async fn on_media_error(&self, _reason: &str) {}
}

pub struct NoopObserver;

#[async_trait]
impl SessionObserver for NoopObserver {}
