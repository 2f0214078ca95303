mod frame;
mod media;
mod negotiation;
mod participant;
mod room;
mod signaling;
mod status;

pub use frame::{FrameError, decode_frame};
pub use media::MediaKind;
pub use negotiation::{LinkRole, NegotiationState, PeerConnectionState};
pub use participant::ParticipantId;
pub use room::{RoomId, UserData};
pub use signaling::{IceCandidate, IceServerConfig, SdpType, SessionDescription, SignalingMessage};
pub use status::ConnectionStatus;
