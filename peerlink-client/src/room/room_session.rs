use peerlink_core::{ParticipantId, RoomId, SignalingMessage, UserData};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Membership change computed from an authoritative member list.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MembershipDiff {
    pub joined: Vec<ParticipantId>,
    pub left: Vec<ParticipantId>,
}

impl MembershipDiff {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty()
    }
}

/// Local identity, current room and the remote members known in it.
///
/// The local participant is never part of `members`.
#[derive(Debug, Clone)]
pub struct RoomSession {
    local_id: ParticipantId,
    room_id: Option<RoomId>,
    user_data: Option<UserData>,
    members: BTreeSet<ParticipantId>,
}

impl RoomSession {
    pub fn new(local_id: ParticipantId) -> Self {
        Self {
            local_id,
            room_id: None,
            user_data: None,
            members: BTreeSet::new(),
        }
    }

    pub fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    pub fn members(&self) -> impl Iterator<Item = &ParticipantId> {
        self.members.iter()
    }

    pub fn is_member(&self, id: &ParticipantId) -> bool {
        self.members.contains(id)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Enter `room_id`. The room is recorded before the server acknowledges it
    /// so that events arriving in the meantime can be correlated.
    pub fn join(&mut self, room_id: RoomId, user_data: Option<UserData>) -> SignalingMessage {
        if let Some(previous) = self.room_id.as_ref().filter(|r| **r != room_id) {
            warn!("Joining {} while still in {}", room_id, previous);
        }
        info!("Joining room {} as {}", room_id, self.local_id);

        self.room_id = Some(room_id.clone());
        self.user_data = user_data.clone();
        self.members.clear();

        SignalingMessage::JoinRoom { room_id, user_data }
    }

    /// The `join-room` message for the current room, if one is set.
    pub fn join_message(&self) -> Option<SignalingMessage> {
        let room_id = self.room_id.clone()?;
        Some(SignalingMessage::JoinRoom {
            room_id,
            user_data: self.user_data.clone(),
        })
    }

    /// Replace the member list with the server's view and report what changed.
    ///
    /// Returns `None` when the update belongs to a different room than the one
    /// joined locally. With no local room yet, the server's room is adopted.
    pub fn apply_room_update(
        &mut self,
        room_id: &RoomId,
        members: &[ParticipantId],
    ) -> Option<MembershipDiff> {
        match &self.room_id {
            Some(current) if current != room_id => {
                warn!(
                    "Ignoring room-update for {} while in {}",
                    room_id, current
                );
                return None;
            }
            Some(_) => {}
            None => {
                info!("Adopting room {} from server", room_id);
                self.room_id = Some(room_id.clone());
            }
        }

        let incoming: BTreeSet<ParticipantId> = members
            .iter()
            .filter(|id| **id != self.local_id)
            .cloned()
            .collect();

        let diff = MembershipDiff {
            joined: incoming.difference(&self.members).cloned().collect(),
            left: self.members.difference(&incoming).cloned().collect(),
        };
        self.members = incoming;

        debug!(
            "Room {}: {} members, +{} -{}",
            room_id,
            self.members.len(),
            diff.joined.len(),
            diff.left.len()
        );
        Some(diff)
    }

    /// A single remote participant announced it left.
    pub fn remove_member(&mut self, id: &ParticipantId) -> bool {
        self.members.remove(id)
    }

    /// Leave the current room. Returns the `leave-room` message to send, if any.
    pub fn leave(&mut self) -> Option<SignalingMessage> {
        self.members.clear();
        let room_id = self.room_id.take()?;
        info!("Leaving room {}", room_id);
        Some(SignalingMessage::LeaveRoom {
            room_id,
            user_id: Some(self.local_id.clone()),
        })
    }

    /// The server assigned a new identity after a reconnect.
    ///
    /// Members are forgotten (they knew the old identity); when a room was
    /// joined, the `join-room` message to re-enter it is returned.
    pub fn reset_identity(&mut self, local_id: ParticipantId) -> Option<SignalingMessage> {
        info!("Identity changed from {} to {}", self.local_id, local_id);
        self.local_id = local_id;
        self.members.clear();
        self.join_message()
    }
}
