use crate::error::ClientError;
use crate::room::orchestrator_command::OrchestratorCommand;
use crate::room::snapshot::SessionSnapshot;
use crate::transport::LocalTrack;
use peerlink_core::{RoomId, UserData};
use tokio::sync::{mpsc, oneshot};

/// Cloneable front door to a running orchestrator.
#[derive(Clone, Debug)]
pub struct OrchestratorHandle {
    commands: mpsc::Sender<OrchestratorCommand>,
}

impl OrchestratorHandle {
    pub fn new(commands: mpsc::Sender<OrchestratorCommand>) -> Self {
        Self { commands }
    }

    pub async fn join(
        &self,
        room_id: impl Into<RoomId>,
        user_data: Option<UserData>,
    ) -> Result<(), ClientError> {
        self.send(OrchestratorCommand::JoinRoom {
            room_id: room_id.into(),
            user_data,
        })
        .await
    }

    pub async fn leave(&self) -> Result<(), ClientError> {
        self.send(OrchestratorCommand::LeaveRoom).await
    }

    pub async fn publish_media(&self, tracks: Vec<LocalTrack>) -> Result<(), ClientError> {
        self.send(OrchestratorCommand::LocalMediaAvailable { tracks })
            .await
    }

    pub async fn stop_media(&self) -> Result<(), ClientError> {
        self.send(OrchestratorCommand::LocalMediaStopped).await
    }

    pub async fn report_media_failure(&self, reason: impl Into<String>) -> Result<(), ClientError> {
        self.send(OrchestratorCommand::LocalMediaFailed {
            reason: reason.into(),
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(OrchestratorCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| ClientError::Stopped)
    }

    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.send(OrchestratorCommand::Shutdown).await
    }

    async fn send(&self, command: OrchestratorCommand) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::Stopped)
    }
}
