use peerlink_core::{ConnectionStatus, ParticipantId, SignalingMessage};

/// Inbound half of the rendezvous channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Status(ConnectionStatus),

    /// The server assigned this connection its participant id.
    Identity(ParticipantId),

    Message(SignalingMessage),
}
