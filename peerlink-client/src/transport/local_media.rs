use peerlink_core::MediaKind;
use std::sync::Arc;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// A local track ready to be attached to peer connections.
pub type LocalTrack = Arc<dyn TrackLocal + Send + Sync>;

pub fn track_kind(track: &LocalTrack) -> Option<MediaKind> {
    match track.kind() {
        RTPCodecType::Audio => Some(MediaKind::Audio),
        RTPCodecType::Video => Some(MediaKind::Video),
        _ => None,
    }
}

/// An Opus audio track and a VP8 video track sharing one stream id.
///
/// Samples are written by whatever owns the capture device; the tracks here
/// only describe what gets negotiated.
pub fn sample_tracks(stream_id: &str) -> Vec<LocalTrack> {
    let audio = TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48000,
            channels: 2,
            ..Default::default()
        },
        format!("{stream_id}-audio"),
        stream_id.to_owned(),
    );
    let video = TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_owned(),
            clock_rate: 90000,
            ..Default::default()
        },
        format!("{stream_id}-video"),
        stream_id.to_owned(),
    );

    vec![Arc::new(audio), Arc::new(video)]
}
