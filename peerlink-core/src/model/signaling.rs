use crate::model::participant::ParticipantId;
use crate::model::room::{RoomId, UserData};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

/// SDP blob in the `{ type, sdp }` shape browsers produce.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default)]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

/// Every frame exchanged with the rendezvous server.
///
/// Point-to-point variants (`offer`, `answer`, `ice-candidate`) carry both the
/// sender (`userId`) and the recipient (`targetUserId`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalingMessage {
    #[serde(rename_all = "camelCase")]
    Welcome { user_id: ParticipantId },

    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_id: RoomId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_data: Option<UserData>,
    },

    #[serde(rename_all = "camelCase")]
    LeaveRoom {
        room_id: RoomId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<ParticipantId>,
    },

    #[serde(rename_all = "camelCase")]
    RoomUpdate {
        room_id: RoomId,
        #[serde(alias = "users")]
        members: Vec<ParticipantId>,
    },

    #[serde(rename_all = "camelCase")]
    Offer {
        room_id: RoomId,
        sdp: SessionDescription,
        target_user_id: ParticipantId,
        user_id: ParticipantId,
    },

    #[serde(rename_all = "camelCase")]
    Answer {
        room_id: RoomId,
        sdp: SessionDescription,
        target_user_id: ParticipantId,
        user_id: ParticipantId,
    },

    #[serde(rename_all = "camelCase")]
    IceCandidate {
        room_id: RoomId,
        candidate: IceCandidate,
        target_user_id: ParticipantId,
        user_id: ParticipantId,
    },
}

impl SignalingMessage {
    /// Wire tag of the message, handy for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SignalingMessage::Welcome { .. } => "welcome",
            SignalingMessage::JoinRoom { .. } => "join-room",
            SignalingMessage::LeaveRoom { .. } => "leave-room",
            SignalingMessage::RoomUpdate { .. } => "room-update",
            SignalingMessage::Offer { .. } => "offer",
            SignalingMessage::Answer { .. } => "answer",
            SignalingMessage::IceCandidate { .. } => "ice-candidate",
        }
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            SignalingMessage::Welcome { .. } => None,
            SignalingMessage::JoinRoom { room_id, .. }
            | SignalingMessage::LeaveRoom { room_id, .. }
            | SignalingMessage::RoomUpdate { room_id, .. }
            | SignalingMessage::Offer { room_id, .. }
            | SignalingMessage::Answer { room_id, .. }
            | SignalingMessage::IceCandidate { room_id, .. } => Some(room_id),
        }
    }

    pub fn sender(&self) -> Option<&ParticipantId> {
        match self {
            SignalingMessage::Offer { user_id, .. }
            | SignalingMessage::Answer { user_id, .. }
            | SignalingMessage::IceCandidate { user_id, .. } => Some(user_id),
            SignalingMessage::LeaveRoom { user_id, .. } => user_id.as_ref(),
            _ => None,
        }
    }

    pub fn target(&self) -> Option<&ParticipantId> {
        match self {
            SignalingMessage::Offer { target_user_id, .. }
            | SignalingMessage::Answer { target_user_id, .. }
            | SignalingMessage::IceCandidate { target_user_id, .. } => Some(target_user_id),
            _ => None,
        }
    }
}
