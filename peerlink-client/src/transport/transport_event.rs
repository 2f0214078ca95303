use peerlink_core::{IceCandidate, MediaKind, ParticipantId, PeerConnectionState};

/// Identifies the link a transport callback belongs to.
///
/// `epoch` is unique per created connection, so callbacks from a connection that
/// has since been replaced can be told apart from the live one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkTag {
    pub remote_id: ParticipantId,
    pub epoch: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: MediaKind,
}

/// Events a peer connection reports back to the orchestrator loop.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A local ICE candidate was gathered and must be trickled to the remote side.
    CandidateGenerated(LinkTag, IceCandidate),

    /// The remote side started sending a track.
    RemoteTrack(LinkTag, RemoteTrack),

    StateChanged(LinkTag, PeerConnectionState),
}

impl TransportEvent {
    pub fn tag(&self) -> &LinkTag {
        match self {
            TransportEvent::CandidateGenerated(tag, _)
            | TransportEvent::RemoteTrack(tag, _)
            | TransportEvent::StateChanged(tag, _) => tag,
        }
    }
}
