use peerlink_client::SignalingError;
use peerlink_client::signaling::{ChannelEvent, SignalingChannel, SignalingOutput};
use peerlink_core::{ConnectionStatus, ParticipantId, RoomId, SignalingMessage};

use super::{SIGNAL_TIMEOUT_MS, fast_config, next_matching};
use crate::integration::init_tracing;
use crate::utils::RendezvousServer;

fn identity(event: &ChannelEvent) -> Option<ParticipantId> {
    match event {
        ChannelEvent::Identity(id) => Some(id.clone()),
        _ => None,
    }
}

fn status(wanted: ConnectionStatus) -> impl Fn(&ChannelEvent) -> Option<()> {
    move |event| match event {
        ChannelEvent::Status(s) if *s == wanted => Some(()),
        _ => None,
    }
}

#[tokio::test]
async fn test_connect_reports_status_then_identity() {
    init_tracing();

    let server = RendezvousServer::start().await;
    let (channel, mut events) =
        SignalingChannel::connect(fast_config(server.endpoint())).expect("Connect failed");

    next_matching(&mut events, SIGNAL_TIMEOUT_MS, status(ConnectionStatus::Connected))
        .await
        .expect("Never connected");
    let id = next_matching(&mut events, SIGNAL_TIMEOUT_MS, identity)
        .await
        .expect("No welcome received");

    assert!(!id.as_str().is_empty());
    assert_eq!(channel.status(), ConnectionStatus::Connected);
    assert_eq!(server.auth_headers().await, vec![None]);

    channel.close();
    server.shutdown();
}

#[tokio::test]
async fn test_token_is_sent_as_bearer_header() {
    init_tracing();

    let server = RendezvousServer::start().await;
    let mut config = fast_config(server.http_endpoint());
    config.token = Some("secret-token".to_owned());

    let (channel, mut events) = SignalingChannel::connect(config).expect("Connect failed");
    next_matching(&mut events, SIGNAL_TIMEOUT_MS, identity)
        .await
        .expect("No welcome received");

    assert_eq!(
        server.auth_headers().await,
        vec![Some("Bearer secret-token".to_owned())]
    );
    channel.close();
    server.shutdown();
}

#[tokio::test]
async fn test_invalid_endpoint_is_rejected_up_front() {
    init_tracing();

    let result = SignalingChannel::connect(fast_config("ftp://example.com/ws".to_owned()));
    assert!(matches!(
        result,
        Err(SignalingError::InvalidEndpoint { .. })
    ));
}

#[tokio::test]
async fn test_unreachable_server_gives_up() {
    init_tracing();

    // Grab a free port and release it so nothing listens there
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Bind failed");
    let port = listener.local_addr().expect("No address").port();
    drop(listener);

    let (channel, mut events) =
        SignalingChannel::connect(fast_config(format!("ws://127.0.0.1:{port}/ws")))
            .expect("Connect failed");

    next_matching(&mut events, SIGNAL_TIMEOUT_MS, status(ConnectionStatus::Disconnected))
        .await
        .expect("Channel never gave up");
    assert_eq!(channel.status(), ConnectionStatus::Disconnected);

    let result = channel
        .send(SignalingMessage::JoinRoom {
            room_id: RoomId::from("r"),
            user_data: None,
        })
        .await;
    assert!(matches!(result, Err(SignalingError::Closed)));
}

#[tokio::test]
async fn test_wrapped_frames_are_normalized() {
    init_tracing();

    let server = RendezvousServer::start().await;
    let (channel, mut events) =
        SignalingChannel::connect(fast_config(server.endpoint())).expect("Connect failed");
    next_matching(&mut events, SIGNAL_TIMEOUT_MS, identity)
        .await
        .expect("No welcome received");

    server.send_raw("not json at all");
    server.send_raw(r#"[{"type":"room-update","roomId":"r1","users":["x","y"]}]"#);

    let message = next_matching(&mut events, SIGNAL_TIMEOUT_MS, |event| match event {
        ChannelEvent::Message(message) => Some(message.clone()),
        _ => None,
    })
    .await
    .expect("Wrapped frame was not delivered");

    assert_eq!(
        message,
        SignalingMessage::RoomUpdate {
            room_id: RoomId::from("r1"),
            members: vec![ParticipantId::from("x"), ParticipantId::from("y")],
        }
    );
    channel.close();
    server.shutdown();
}

#[tokio::test]
async fn test_server_close_triggers_reconnect_with_new_identity() {
    init_tracing();

    let server = RendezvousServer::start().await;
    let (channel, mut events) =
        SignalingChannel::connect(fast_config(server.endpoint())).expect("Connect failed");
    let first = next_matching(&mut events, SIGNAL_TIMEOUT_MS, identity)
        .await
        .expect("No welcome received");

    server.kick_all();

    next_matching(&mut events, SIGNAL_TIMEOUT_MS, status(ConnectionStatus::Reconnecting))
        .await
        .expect("No reconnecting status");
    let second = next_matching(&mut events, SIGNAL_TIMEOUT_MS, identity)
        .await
        .expect("No welcome after reconnect");

    assert_ne!(first, second);
    assert_eq!(channel.status(), ConnectionStatus::Connected);
    channel.close();
    server.shutdown();
}

#[tokio::test]
async fn test_close_is_terminal() {
    init_tracing();

    let server = RendezvousServer::start().await;
    let (channel, mut events) =
        SignalingChannel::connect(fast_config(server.endpoint())).expect("Connect failed");
    next_matching(&mut events, SIGNAL_TIMEOUT_MS, identity)
        .await
        .expect("No welcome received");

    channel.close();
    next_matching(&mut events, SIGNAL_TIMEOUT_MS, status(ConnectionStatus::Disconnected))
        .await
        .expect("Close did not report disconnected");

    let result = channel
        .send(SignalingMessage::JoinRoom {
            room_id: RoomId::from("r"),
            user_data: None,
        })
        .await;
    assert!(matches!(result, Err(SignalingError::Closed)));
    server.shutdown();
}
