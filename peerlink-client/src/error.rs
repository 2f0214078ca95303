use peerlink_core::{NegotiationState, ParticipantId};
use thiserror::Error;

/// Failures of a single peer link. None of them is fatal to the session.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("link to {remote_id} is {actual}, expected {expected}")]
    InvalidState {
        remote_id: ParticipantId,
        expected: NegotiationState,
        actual: NegotiationState,
    },

    #[error("link to {0} is closed")]
    Closed(ParticipantId),

    #[error("transport failure on link to {remote_id}: {reason}")]
    Transport {
        remote_id: ParticipantId,
        reason: String,
    },
}

impl LinkError {
    /// Whether the link is unusable after this error and must be discarded.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LinkError::Closed(_) | LinkError::Transport { .. })
    }
}

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("invalid signaling endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("credential is not a valid header value")]
    InvalidCredentials,

    #[error("signaling channel is not connected")]
    NotConnected,

    #[error("signaling channel is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error("session orchestrator has stopped")]
    Stopped,

    #[error("timed out waiting for the signaling channel")]
    Timeout,
}
