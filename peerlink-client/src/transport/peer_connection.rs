use crate::transport::local_media::LocalTrack;
use crate::transport::transport_event::{LinkTag, TransportEvent};
use anyhow::Result;
use async_trait::async_trait;
use peerlink_core::{IceCandidate, SessionDescription};
use std::sync::Arc;
use tokio::sync::mpsc;

/// The standard peer connection capability a link drives.
///
/// Offer and answer creation also install the result as the local description.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn add_track(&self, track: LocalTrack) -> Result<()>;

    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Builds peer connections whose callbacks report into `events`, tagged with `tag`.
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(
        &self,
        tag: LinkTag,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerConnection>>;
}
