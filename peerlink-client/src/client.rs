use crate::error::{ClientError, SignalingError};
use crate::room::{Orchestrator, OrchestratorHandle, SessionObserver, SessionSnapshot};
use crate::signaling::{SignalingChannel, SignalingConfig};
use crate::transport::{LocalTrack, PeerConnectionFactory, RtcConnectionFactory, TransportConfig};
use peerlink_core::{ConnectionStatus, RoomId, UserData};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub signaling: SignalingConfig,
    pub transport: TransportConfig,
    pub command_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            signaling: SignalingConfig::default(),
            transport: TransportConfig::default(),
            command_buffer: 64,
        }
    }
}

/// A running session: the signaling channel plus the orchestrator driving it.
pub struct Client {
    handle: OrchestratorHandle,
    channel: SignalingChannel,
    task: JoinHandle<()>,
}

impl Client {
    /// Connect with `webrtc` peer connections. Must be called inside a Tokio runtime.
    pub fn connect(
        config: ClientConfig,
        observer: impl SessionObserver,
    ) -> Result<Self, ClientError> {
        let factory = Arc::new(RtcConnectionFactory::new(config.transport.clone()));
        Self::connect_with_factory(config, factory, observer)
    }

    pub fn connect_with_factory(
        config: ClientConfig,
        factory: Arc<dyn PeerConnectionFactory>,
        observer: impl SessionObserver,
    ) -> Result<Self, ClientError> {
        let (channel, events) = SignalingChannel::connect(config.signaling)?;
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));

        let orchestrator = Orchestrator::new(
            factory,
            Arc::new(channel.clone()),
            Box::new(observer),
            command_rx,
            events,
        );
        let task = tokio::spawn(orchestrator.run());

        Ok(Self {
            handle: OrchestratorHandle::new(command_tx),
            channel,
            task,
        })
    }

    pub fn handle(&self) -> OrchestratorHandle {
        self.handle.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.channel.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.channel.subscribe_status()
    }

    pub async fn wait_for_status(
        &self,
        status: ConnectionStatus,
        timeout: Duration,
    ) -> Result<(), ClientError> {
        let mut rx = self.channel.subscribe_status();
        let reached = tokio::time::timeout(timeout, async {
            rx.wait_for(|current| *current == status).await.map(|_| ())
        })
        .await
        .map_err(|_| ClientError::Timeout)?;
        reached.map_err(|_| ClientError::Signaling(SignalingError::Closed))
    }

    pub async fn join(
        &self,
        room_id: impl Into<RoomId>,
        user_data: Option<UserData>,
    ) -> Result<(), ClientError> {
        self.handle.join(room_id, user_data).await
    }

    pub async fn leave(&self) -> Result<(), ClientError> {
        self.handle.leave().await
    }

    pub async fn publish_media(&self, tracks: Vec<LocalTrack>) -> Result<(), ClientError> {
        self.handle.publish_media(tracks).await
    }

    pub async fn stop_media(&self) -> Result<(), ClientError> {
        self.handle.stop_media().await
    }

    pub async fn report_media_failure(&self, reason: impl Into<String>) -> Result<(), ClientError> {
        self.handle.report_media_failure(reason).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, ClientError> {
        self.handle.snapshot().await
    }

    /// Leave the room, close every link and the signaling channel.
    pub async fn disconnect(self) {
        if let Err(e) = self.handle.leave().await {
            warn!("Leave during disconnect failed: {}", e);
        }
        let _ = self.handle.shutdown().await;
        if let Err(e) = self.task.await {
            warn!("Orchestrator task ended abnormally: {}", e);
        }
        self.channel.close();
        info!("Client disconnected");
    }
}
