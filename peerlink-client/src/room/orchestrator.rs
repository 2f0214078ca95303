use crate::link::PeerLink;
use crate::room::orchestrator_command::OrchestratorCommand;
use crate::room::room_session::RoomSession;
use crate::room::session_observer::SessionObserver;
use crate::room::snapshot::{LinkSnapshot, SessionSnapshot};
use crate::signaling::{ChannelEvent, SignalingOutput};
use crate::transport::{LinkTag, LocalTrack, PeerConnectionFactory, TransportEvent};
use anyhow::Result;
use peerlink_core::{
    ConnectionStatus, IceCandidate, LinkRole, NegotiationState, ParticipantId,
    PeerConnectionState, RoomId, SessionDescription, SignalingMessage, UserData,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const TRANSPORT_EVENT_BUFFER: usize = 256;

/// Owns every link and the room session, and serializes all signaling,
/// transport and application input through a single loop.
pub struct Orchestrator {
    status: ConnectionStatus,
    session: Option<RoomSession>,
    pending_join: Option<(RoomId, Option<UserData>)>,
    /// A `join-room` for the current room never reached the server.
    rejoin_pending: bool,
    links: HashMap<ParticipantId, PeerLink>,
    local_tracks: Option<Vec<LocalTrack>>,
    next_epoch: u64,
    factory: Arc<dyn PeerConnectionFactory>,
    signaling: Arc<dyn SignalingOutput>,
    observer: Box<dyn SessionObserver>,
    command_rx: mpsc::Receiver<OrchestratorCommand>,
    channel_rx: mpsc::Receiver<ChannelEvent>,
    channel_open: bool,
    transport_rx: mpsc::Receiver<TransportEvent>,
    transport_tx: mpsc::Sender<TransportEvent>,
}

enum IdentityChange {
    First,
    Unchanged,
    Replaced,
}

impl Orchestrator {
    pub fn new(
        factory: Arc<dyn PeerConnectionFactory>,
        signaling: Arc<dyn SignalingOutput>,
        observer: Box<dyn SessionObserver>,
        command_rx: mpsc::Receiver<OrchestratorCommand>,
        channel_rx: mpsc::Receiver<ChannelEvent>,
    ) -> Self {
        let (transport_tx, transport_rx) = mpsc::channel(TRANSPORT_EVENT_BUFFER);

        Self {
            status: ConnectionStatus::Connecting,
            session: None,
            pending_join: None,
            rejoin_pending: false,
            links: HashMap::new(),
            local_tracks: None,
            next_epoch: 0,
            factory,
            signaling,
            observer,
            command_rx,
            channel_rx,
            channel_open: true,
            transport_rx,
            transport_tx,
        }
    }

    pub async fn run(mut self) {
        info!("Orchestrator event loop started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(OrchestratorCommand::Shutdown) => {
                            info!("Shutdown requested");
                            break;
                        }
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("Command channel closed. Shutting down orchestrator.");
                            break;
                        }
                    }
                }

                evt = self.channel_rx.recv(), if self.channel_open => {
                    match evt {
                        Some(e) => self.handle_channel_event(e).await,
                        None => {
                            warn!("Signaling event stream closed");
                            self.channel_open = false;
                            self.on_status(ConnectionStatus::Disconnected).await;
                        }
                    }
                }

                evt = self.transport_rx.recv() => {
                    if let Some(e) = evt {
                        self.handle_transport_event(e).await;
                    }
                }
            }
        }

        self.close_all_links().await;
        info!("Orchestrator event loop finished");
    }

    async fn handle_command(&mut self, cmd: OrchestratorCommand) {
        match cmd {
            OrchestratorCommand::JoinRoom { room_id, user_data } => {
                self.join_room(room_id, user_data).await;
            }

            OrchestratorCommand::LeaveRoom => self.leave_room().await,

            OrchestratorCommand::LocalMediaAvailable { tracks } => {
                self.on_local_media(tracks).await;
            }

            OrchestratorCommand::LocalMediaStopped => {
                info!("Local media stopped; existing links are kept");
                self.local_tracks = None;
            }

            OrchestratorCommand::LocalMediaFailed { reason } => {
                warn!("Local media unavailable: {}", reason);
                self.observer.on_media_error(&reason).await;
            }

            OrchestratorCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }

            OrchestratorCommand::Shutdown => {}
        }
    }

    async fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Status(status) => self.on_status(status).await,
            ChannelEvent::Identity(id) => self.on_identity(id).await,
            ChannelEvent::Message(message) => self.handle_signal(message).await,
        }
    }

    async fn on_status(&mut self, status: ConnectionStatus) {
        if self.status == status {
            return;
        }
        info!("Signaling status: {} -> {}", self.status, status);
        self.status = status;
        self.observer.on_status(status).await;

        match status {
            ConnectionStatus::Reconnecting => {
                info!("Keeping {} links while signaling reconnects", self.links.len());
            }
            ConnectionStatus::Disconnected => {
                self.close_all_links().await;
                self.session = None;
                self.pending_join = None;
                self.rejoin_pending = false;
            }
            ConnectionStatus::Connecting | ConnectionStatus::Connected => {}
        }
    }

    async fn on_identity(&mut self, id: ParticipantId) {
        let change = match &self.session {
            None => IdentityChange::First,
            Some(session) if session.local_id() == &id => IdentityChange::Unchanged,
            Some(_) => IdentityChange::Replaced,
        };

        match change {
            IdentityChange::First => {
                info!("Assigned participant id {}", id);
                self.session = Some(RoomSession::new(id));
                if let Some((room_id, user_data)) = self.pending_join.take() {
                    self.join_room(room_id, user_data).await;
                }
            }

            IdentityChange::Unchanged => {
                debug!("Identity {} unchanged after reconnect", id);
                if self.rejoin_pending {
                    self.send_join().await;
                }
            }

            IdentityChange::Replaced => {
                warn!("Rendezvous session was reset; new participant id {}", id);
                self.close_all_links().await;
                if let Some(session) = self.session.as_mut() {
                    session.reset_identity(id);
                }
                self.send_join().await;
            }
        }
    }

    async fn join_room(&mut self, room_id: RoomId, user_data: Option<UserData>) {
        if self.session.is_none() {
            info!("Deferring join of {} until an identity is assigned", room_id);
            self.pending_join = Some((room_id, user_data));
            return;
        }
        if !self.links.is_empty() {
            self.close_all_links().await;
        }

        let Some(session) = self.session.as_mut() else {
            return;
        };
        info!("Joining room {}", room_id);
        session.join(room_id, user_data);
        self.send_join().await;
    }

    /// Send `join-room` for the current room. A failed send is retried once the
    /// channel is back with the same identity.
    async fn send_join(&mut self) {
        let Some(message) = self.session.as_ref().and_then(|s| s.join_message()) else {
            self.rejoin_pending = false;
            return;
        };
        self.rejoin_pending = !self.send_signal(message).await;
        if self.rejoin_pending {
            warn!("join-room not delivered; retrying after reconnect");
        }
    }

    async fn leave_room(&mut self) {
        self.pending_join = None;
        self.rejoin_pending = false;
        let Some(session) = self.session.as_mut() else {
            debug!("Leave requested without a session");
            return;
        };
        let message = session.leave();

        self.close_all_links().await;
        if let Some(message) = message {
            self.send_signal(message).await;
        }
    }

    async fn on_local_media(&mut self, tracks: Vec<LocalTrack>) {
        info!("Local media available ({} tracks)", tracks.len());
        self.local_tracks = Some(tracks.clone());

        for link in self.links.values_mut().filter(|link| link.is_live()) {
            link.attach_local_tracks(&tracks).await;
        }

        let targets: Vec<ParticipantId> = match &self.session {
            Some(session) if session.room_id().is_some() => session
                .members()
                .filter(|id| !self.has_live_link(id))
                .cloned()
                .collect(),
            _ => Vec::new(),
        };
        for remote_id in targets {
            self.start_initiator(remote_id).await;
        }
    }

    async fn handle_signal(&mut self, message: SignalingMessage) {
        if let SignalingMessage::Welcome { user_id } = &message {
            let id = user_id.clone();
            self.on_identity(id).await;
            return;
        }

        let kind = message.kind();
        let Some(session) = self.session.as_ref() else {
            warn!("Dropping {} received before identity assignment", kind);
            return;
        };
        let local_id = session.local_id().clone();

        if let Some(target) = message.target() {
            if target != &local_id {
                warn!("Dropping {} addressed to {}", kind, target);
                return;
            }
            if session.room_id() != message.room_id() {
                warn!(
                    "Dropping {} for room {:?} while in {:?}",
                    kind,
                    message.room_id(),
                    session.room_id()
                );
                return;
            }
        }
        if message.sender() == Some(&local_id) {
            debug!("Ignoring echo of own {}", kind);
            return;
        }

        match message {
            SignalingMessage::RoomUpdate { room_id, members } => {
                self.on_room_update(room_id, members).await;
            }
            SignalingMessage::LeaveRoom {
                room_id,
                user_id: Some(user_id),
            } => self.on_remote_leave(room_id, user_id).await,
            SignalingMessage::Offer { sdp, user_id, .. } => self.on_offer(user_id, sdp).await,
            SignalingMessage::Answer { sdp, user_id, .. } => self.on_answer(user_id, sdp).await,
            SignalingMessage::IceCandidate {
                candidate, user_id, ..
            } => self.on_remote_candidate(user_id, candidate).await,
            SignalingMessage::LeaveRoom { user_id: None, .. }
            | SignalingMessage::JoinRoom { .. }
            | SignalingMessage::Welcome { .. } => {
                debug!("Ignoring {} frame from server", kind);
            }
        }
    }

    async fn on_room_update(&mut self, room_id: RoomId, members: Vec<ParticipantId>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(diff) = session.apply_room_update(&room_id, &members) else {
            return;
        };
        let current: Vec<ParticipantId> = session.members().cloned().collect();

        self.observer.on_members(&room_id, &current).await;
        if diff.is_empty() {
            return;
        }

        for left in &diff.left {
            info!("{} left room {}", left, room_id);
            self.remove_link(left).await;
        }

        if self.local_tracks.is_some() {
            for joined in diff.joined {
                self.start_initiator(joined).await;
            }
        } else if !diff.joined.is_empty() {
            debug!(
                "No local media; waiting for offers from {} new members",
                diff.joined.len()
            );
        }
    }

    async fn on_remote_leave(&mut self, room_id: RoomId, user_id: ParticipantId) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.room_id() != Some(&room_id) {
            debug!("Ignoring leave of {} from room {}", user_id, room_id);
            return;
        }
        session.remove_member(&user_id);
        let current: Vec<ParticipantId> = session.members().cloned().collect();

        info!("{} left room {}", user_id, room_id);
        self.remove_link(&user_id).await;
        self.observer.on_members(&room_id, &current).await;
    }

    async fn start_initiator(&mut self, remote_id: ParticipantId) {
        let Some((room_id, local_id)) = self.room_context() else {
            return;
        };

        match self.ensure_link(&remote_id, LinkRole::Initiator).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Live link to {} already exists", remote_id);
                return;
            }
            Err(e) => {
                error!("Failed to create link to {}: {:#}", remote_id, e);
                return;
            }
        }

        let Some(link) = self.links.get_mut(&remote_id) else {
            return;
        };
        let offer = match link.create_offer().await {
            Ok(offer) => offer,
            Err(e) => {
                error!("Failed to create offer for {}: {}", remote_id, e);
                self.remove_link(&remote_id).await;
                return;
            }
        };
        self.observer
            .on_negotiation(&remote_id, NegotiationState::OfferSent)
            .await;

        info!("Sending offer to {}", remote_id);
        let message = SignalingMessage::Offer {
            room_id,
            sdp: offer,
            target_user_id: remote_id.clone(),
            user_id: local_id,
        };
        if !self.send_signal(message).await {
            self.remove_link(&remote_id).await;
        }
    }

    async fn on_offer(&mut self, from: ParticipantId, offer: SessionDescription) {
        let Some((room_id, local_id)) = self.room_context() else {
            return;
        };

        if let Some(link) = self.links.get(&from) {
            match link.state() {
                NegotiationState::OfferSent if local_id < from => {
                    info!("Offer collision with {}: keeping our offer", from);
                    return;
                }
                NegotiationState::OfferSent => {
                    info!("Offer collision with {}: yielding to the remote offer", from);
                    self.remove_link(&from).await;
                }
                state if state.is_dead() => {
                    debug!("Replacing {} link to {}", state, from);
                    self.remove_link(&from).await;
                }
                _ => {}
            }
        }

        if let Err(e) = self.ensure_link(&from, LinkRole::Responder).await {
            error!("Failed to create link to {}: {:#}", from, e);
            return;
        }
        let Some(link) = self.links.get_mut(&from) else {
            return;
        };

        match link.handle_remote_offer(offer).await {
            Ok(Some(answer)) => {
                self.observer
                    .on_negotiation(&from, NegotiationState::AnswerSent)
                    .await;

                info!("Sending answer to {}", from);
                let message = SignalingMessage::Answer {
                    room_id,
                    sdp: answer,
                    target_user_id: from.clone(),
                    user_id: local_id,
                };
                if !self.send_signal(message).await {
                    self.remove_link(&from).await;
                    return;
                }
                if let Some(link) = self.links.get_mut(&from) {
                    link.mark_answer_delivered();
                }
                self.observer
                    .on_negotiation(&from, NegotiationState::Stable)
                    .await;
            }
            Ok(None) => {}
            Err(e) if e.is_fatal() => {
                error!("Failed to answer offer from {}: {}", from, e);
                self.remove_link(&from).await;
            }
            Err(e) => warn!("Dropping offer from {}: {}", from, e),
        }
    }

    async fn on_answer(&mut self, from: ParticipantId, answer: SessionDescription) {
        let Some(link) = self.links.get_mut(&from) else {
            warn!("Dropping answer from {}: no link", from);
            return;
        };

        match link.handle_remote_answer(answer).await {
            Ok(true) => {
                self.observer
                    .on_negotiation(&from, NegotiationState::Stable)
                    .await;
            }
            Ok(false) => {}
            Err(e) if e.is_fatal() => {
                error!("Failed to apply answer from {}: {}", from, e);
                self.remove_link(&from).await;
            }
            Err(e) => warn!("Dropping answer from {}: {}", from, e),
        }
    }

    async fn on_remote_candidate(&mut self, from: ParticipantId, candidate: IceCandidate) {
        match self.links.get_mut(&from) {
            Some(link) if link.is_live() => {
                let disposition = link.enqueue_or_apply_candidate(candidate).await;
                debug!("Candidate from {}: {:?}", from, disposition);
            }
            _ => warn!("Dropping ICE candidate from {}: no live link", from),
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        let tag = event.tag().clone();
        let Some(link) = self.links.get_mut(&tag.remote_id) else {
            debug!("Ignoring transport event for unknown link {}", tag.remote_id);
            return;
        };
        if link.epoch() != tag.epoch || !link.is_live() {
            debug!(
                "Ignoring stale transport event for {} (epoch {}, live epoch {})",
                tag.remote_id,
                tag.epoch,
                link.epoch()
            );
            return;
        }

        match event {
            TransportEvent::CandidateGenerated(_, candidate) => {
                let Some((room_id, local_id)) = self.room_context() else {
                    return;
                };
                self.send_signal(SignalingMessage::IceCandidate {
                    room_id,
                    candidate,
                    target_user_id: tag.remote_id,
                    user_id: local_id,
                })
                .await;
            }

            TransportEvent::RemoteTrack(_, track) => {
                info!("Remote {} track {} from {}", track.kind, track.id, tag.remote_id);
                link.add_remote_track(track.clone());
                self.observer.on_remote_track(&tag.remote_id, &track).await;
            }

            TransportEvent::StateChanged(_, state) => {
                link.set_connection_state(state);
                self.observer
                    .on_connection_state(&tag.remote_id, state)
                    .await;

                if state == PeerConnectionState::Failed {
                    warn!("Transport to {} failed", tag.remote_id);
                    link.mark_failed();
                    self.observer
                        .on_negotiation(&tag.remote_id, NegotiationState::Failed)
                        .await;
                    self.remove_link(&tag.remote_id).await;
                }
            }
        }
    }

    /// Returns `Ok(true)` when a new link was created, `Ok(false)` when a live
    /// one already exists.
    async fn ensure_link(&mut self, remote_id: &ParticipantId, role: LinkRole) -> Result<bool> {
        if self.has_live_link(remote_id) {
            return Ok(false);
        }
        if self.links.contains_key(remote_id) {
            self.remove_link(remote_id).await;
        }

        self.next_epoch += 1;
        let tag = LinkTag {
            remote_id: remote_id.clone(),
            epoch: self.next_epoch,
        };
        let connection = self
            .factory
            .create(tag, self.transport_tx.clone())
            .await?;

        let mut link = PeerLink::new(remote_id.clone(), self.next_epoch, role, connection);
        if let Some(tracks) = &self.local_tracks {
            link.attach_local_tracks(tracks).await;
        }
        self.links.insert(remote_id.clone(), link);
        Ok(true)
    }

    async fn remove_link(&mut self, remote_id: &ParticipantId) {
        let Some(mut link) = self.links.remove(remote_id) else {
            return;
        };
        link.close().await;
        self.observer
            .on_negotiation(remote_id, NegotiationState::Closed)
            .await;
        self.observer.on_link_closed(remote_id).await;
    }

    async fn close_all_links(&mut self) {
        let ids: Vec<ParticipantId> = self.links.keys().cloned().collect();
        for remote_id in ids {
            self.remove_link(&remote_id).await;
        }
    }

    fn has_live_link(&self, remote_id: &ParticipantId) -> bool {
        self.links.get(remote_id).is_some_and(|link| link.is_live())
    }

    fn room_context(&self) -> Option<(RoomId, ParticipantId)> {
        let session = self.session.as_ref()?;
        let room_id = session.room_id()?.clone();
        Some((room_id, session.local_id().clone()))
    }

    async fn send_signal(&self, message: SignalingMessage) -> bool {
        let kind = message.kind();
        match self.signaling.send(message).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send {}: {}", kind, e);
                false
            }
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        let mut links: Vec<LinkSnapshot> = self
            .links
            .values()
            .map(|link| LinkSnapshot {
                remote_id: link.remote_id().clone(),
                role: link.role(),
                negotiation: link.state(),
                connection: link.connection_state(),
                local_tracks_attached: link.local_tracks_attached(),
                remote_tracks: link.remote_tracks().len(),
                pending_candidates: link.pending_candidates(),
                age: link.age(),
            })
            .collect();
        links.sort_by(|a, b| a.remote_id.cmp(&b.remote_id));

        SessionSnapshot {
            status: self.status,
            local_id: self.session.as_ref().map(|s| s.local_id().clone()),
            room_id: self.session.as_ref().and_then(|s| s.room_id().cloned()),
            members: self
                .session
                .as_ref()
                .map(|s| s.members().cloned().collect())
                .unwrap_or_default(),
            media_active: self.local_tracks.is_some(),
            links,
        }
    }
}
