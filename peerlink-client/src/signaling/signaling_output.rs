use crate::error::SignalingError;
use async_trait::async_trait;
use peerlink_core::SignalingMessage;

/// Outbound half of the rendezvous channel, as seen by the orchestrator.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Queue a message for the rendezvous server.
    async fn send(&self, message: SignalingMessage) -> Result<(), SignalingError>;
}
