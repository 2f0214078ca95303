pub use peerlink_core::model::{ParticipantId, RoomId};

pub mod model {
    pub use peerlink_core::model::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use peerlink_client::*;
}
