use crate::error::LinkError;
use crate::link::candidate_buffer::CandidateBuffer;
use crate::transport::{LocalTrack, PeerConnection, RemoteTrack};
use peerlink_core::{
    IceCandidate, LinkRole, NegotiationState, ParticipantId, PeerConnectionState,
    SessionDescription,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What happened to a remote candidate handed to a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateDisposition {
    Applied,
    Buffered,
    Dropped,
}

/// Negotiation state and resources for one remote participant.
///
/// All mutation goes through these methods; the orchestrator owns the only
/// reference.
pub struct PeerLink {
    remote_id: ParticipantId,
    epoch: u64,
    role: LinkRole,
    connection: Option<Arc<dyn PeerConnection>>,
    state: NegotiationState,
    connection_state: PeerConnectionState,
    local_tracks_attached: bool,
    local_tracks: Vec<LocalTrack>,
    remote_tracks: Vec<RemoteTrack>,
    pending_candidates: CandidateBuffer,
    remote_description_set: bool,
    created_at: Instant,
}

impl PeerLink {
    pub fn new(
        remote_id: ParticipantId,
        epoch: u64,
        role: LinkRole,
        connection: Arc<dyn PeerConnection>,
    ) -> Self {
        debug!("New {:?} link to {} (epoch {})", role, remote_id, epoch);
        Self {
            remote_id,
            epoch,
            role,
            connection: Some(connection),
            state: NegotiationState::Idle,
            connection_state: PeerConnectionState::New,
            local_tracks_attached: false,
            local_tracks: Vec::new(),
            remote_tracks: Vec::new(),
            pending_candidates: CandidateBuffer::new(),
            remote_description_set: false,
            created_at: Instant::now(),
        }
    }

    pub fn remote_id(&self) -> &ParticipantId {
        &self.remote_id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn role(&self) -> LinkRole {
        self.role
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn connection_state(&self) -> PeerConnectionState {
        self.connection_state
    }

    pub fn is_live(&self) -> bool {
        !self.state.is_dead()
    }

    pub fn local_tracks_attached(&self) -> bool {
        self.local_tracks_attached
    }

    pub fn remote_tracks(&self) -> &[RemoteTrack] {
        &self.remote_tracks
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    pub fn has_remote_description(&self) -> bool {
        self.remote_description_set
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Attach local tracks once per link. Returns `false` when already attached.
    ///
    /// A track the connection rejects is logged and skipped; the link carries on
    /// without that media kind.
    pub async fn attach_local_tracks(&mut self, tracks: &[LocalTrack]) -> bool {
        if self.local_tracks_attached {
            debug!("Local tracks already attached to {}", self.remote_id);
            return false;
        }
        let Some(connection) = self.live_connection() else {
            return false;
        };

        self.local_tracks_attached = true;
        for track in tracks {
            match connection.add_track(track.clone()).await {
                Ok(()) => self.local_tracks.push(track.clone()),
                Err(e) => warn!(
                    "Failed to attach {:?} track {} to {}: {:#}",
                    track.kind(),
                    track.id(),
                    self.remote_id,
                    e
                ),
            }
        }
        info!(
            "Attached {}/{} local tracks to {}",
            self.local_tracks.len(),
            tracks.len(),
            self.remote_id
        );
        true
    }

    /// Initiator side: create and install a local offer.
    pub async fn create_offer(&mut self) -> Result<SessionDescription, LinkError> {
        self.expect_state(NegotiationState::Idle)?;
        let connection = self.connection_or_closed()?;

        match connection.create_offer().await {
            Ok(offer) => {
                self.state = NegotiationState::OfferSent;
                Ok(offer)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Responder side: apply a remote offer and produce the answer to send back.
    ///
    /// Returns `Ok(None)` for a duplicate offer on an already negotiated link.
    pub async fn handle_remote_offer(
        &mut self,
        offer: SessionDescription,
    ) -> Result<Option<SessionDescription>, LinkError> {
        match self.state {
            NegotiationState::Idle => {}
            NegotiationState::Stable | NegotiationState::AnswerSent => {
                warn!(
                    "Ignoring duplicate offer from {} on {} link",
                    self.remote_id, self.state
                );
                return Ok(None);
            }
            _ => self.expect_state(NegotiationState::Idle)?,
        }
        let connection = self.connection_or_closed()?;

        if let Err(e) = connection.set_remote_description(offer).await {
            return Err(self.fail(e));
        }
        self.remote_description_set = true;
        self.state = NegotiationState::OfferReceived;
        self.flush_pending_candidates(&connection).await;

        match connection.create_answer().await {
            Ok(answer) => {
                self.state = NegotiationState::AnswerSent;
                Ok(Some(answer))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Initiator side: apply the remote answer. Returns `false` for a late
    /// duplicate on a link that is already stable.
    pub async fn handle_remote_answer(
        &mut self,
        answer: SessionDescription,
    ) -> Result<bool, LinkError> {
        if self.state == NegotiationState::Stable {
            warn!("Ignoring answer from {}: link already stable", self.remote_id);
            return Ok(false);
        }
        self.expect_state(NegotiationState::OfferSent)?;
        let connection = self.connection_or_closed()?;

        if let Err(e) = connection.set_remote_description(answer).await {
            return Err(self.fail(e));
        }
        self.remote_description_set = true;
        self.flush_pending_candidates(&connection).await;
        self.state = NegotiationState::Stable;
        info!("Link to {} is stable", self.remote_id);
        Ok(true)
    }

    /// The answer produced by [`handle_remote_offer`](Self::handle_remote_offer)
    /// reached the signaling channel.
    pub fn mark_answer_delivered(&mut self) {
        if self.state == NegotiationState::AnswerSent {
            self.state = NegotiationState::Stable;
            info!("Link to {} is stable", self.remote_id);
        }
    }

    pub async fn enqueue_or_apply_candidate(
        &mut self,
        candidate: IceCandidate,
    ) -> CandidateDisposition {
        let Some(connection) = self.live_connection() else {
            debug!("Dropping candidate for closed link to {}", self.remote_id);
            return CandidateDisposition::Dropped;
        };

        if !self.remote_description_set {
            self.pending_candidates.push(candidate);
            debug!(
                "Buffered candidate from {} ({} pending)",
                self.remote_id,
                self.pending_candidates.len()
            );
            return CandidateDisposition::Buffered;
        }

        match connection.add_ice_candidate(candidate).await {
            Ok(()) => CandidateDisposition::Applied,
            Err(e) => {
                warn!("Failed to add ICE candidate from {}: {:#}", self.remote_id, e);
                CandidateDisposition::Dropped
            }
        }
    }

    pub fn set_connection_state(&mut self, state: PeerConnectionState) {
        self.connection_state = state;
    }

    pub fn add_remote_track(&mut self, track: RemoteTrack) {
        if !self.remote_tracks.iter().any(|t| t.id == track.id) {
            self.remote_tracks.push(track);
        }
    }

    /// Record a transport failure reported outside a negotiation step.
    pub fn mark_failed(&mut self) {
        if self.state != NegotiationState::Closed {
            self.state = NegotiationState::Failed;
        }
    }

    /// Release the connection and every track reference. Safe to call twice.
    pub async fn close(&mut self) {
        if self.state == NegotiationState::Closed {
            return;
        }
        self.state = NegotiationState::Closed;
        self.pending_candidates.clear();
        self.local_tracks.clear();
        self.remote_tracks.clear();

        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close().await {
                warn!("Error closing connection to {}: {:#}", self.remote_id, e);
            }
        }
        info!("Link to {} closed", self.remote_id);
    }

    async fn flush_pending_candidates(&mut self, connection: &Arc<dyn PeerConnection>) {
        let pending = self.pending_candidates.drain();
        if pending.is_empty() {
            return;
        }
        debug!(
            "Applying {} buffered candidates from {}",
            pending.len(),
            self.remote_id
        );
        for candidate in pending {
            if let Err(e) = connection.add_ice_candidate(candidate).await {
                warn!(
                    "Failed to add buffered candidate from {}: {:#}",
                    self.remote_id, e
                );
            }
        }
    }

    fn live_connection(&self) -> Option<Arc<dyn PeerConnection>> {
        if self.state.is_dead() {
            return None;
        }
        self.connection.clone()
    }

    fn connection_or_closed(&self) -> Result<Arc<dyn PeerConnection>, LinkError> {
        self.live_connection()
            .ok_or_else(|| LinkError::Closed(self.remote_id.clone()))
    }

    fn expect_state(&self, expected: NegotiationState) -> Result<(), LinkError> {
        if self.state.is_dead() {
            return Err(LinkError::Closed(self.remote_id.clone()));
        }
        if self.state != expected {
            return Err(LinkError::InvalidState {
                remote_id: self.remote_id.clone(),
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    fn fail(&mut self, error: anyhow::Error) -> LinkError {
        self.state = NegotiationState::Failed;
        LinkError::Transport {
            remote_id: self.remote_id.clone(),
            reason: format!("{:#}", error),
        }
    }
}
