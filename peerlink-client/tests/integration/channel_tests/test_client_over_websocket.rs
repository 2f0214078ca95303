use peerlink_client::transport::{RtcConnectionFactory, TransportConfig, sample_tracks};
use peerlink_client::{Client, ClientConfig, SessionSnapshot};
use peerlink_core::{ConnectionStatus, NegotiationState, ParticipantId, RoomId, UserData};
use std::sync::Arc;
use std::time::Duration;

use super::{SIGNAL_TIMEOUT_MS, fast_config};
use crate::integration::{ROOM, init_tracing};
use crate::utils::{MockPeerConnectionFactory, ObservedEvent, RecordingObserver, RendezvousServer};

fn client_config(server: &RendezvousServer) -> ClientConfig {
    ClientConfig {
        signaling: fast_config(server.endpoint()),
        transport: TransportConfig::without_ice_servers(),
        ..ClientConfig::default()
    }
}

async fn wait_for_snapshot<F>(client: &Client, timeout_ms: u64, check: F) -> Option<SessionSnapshot>
where
    F: Fn(&SessionSnapshot) -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    loop {
        let snapshot = client.snapshot().await.ok()?;
        if check(&snapshot) {
            return Some(snapshot);
        }
        if start.elapsed() > timeout {
            tracing::warn!("[ClientTest] gave up waiting: {:?}", snapshot);
            return None;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn all_stable(snapshot: &SessionSnapshot, count: usize) -> bool {
    snapshot.links.len() == count
        && snapshot
            .links
            .iter()
            .all(|l| l.negotiation == NegotiationState::Stable)
}

#[tokio::test]
async fn test_two_clients_negotiate_through_server() {
    init_tracing();

    let server = RendezvousServer::start().await;
    let mut clients = Vec::new();
    for name in ["first", "second"] {
        let client = Client::connect_with_factory(
            client_config(&server),
            Arc::new(MockPeerConnectionFactory::new()),
            RecordingObserver::new(),
        )
        .expect("Connect failed");
        client
            .wait_for_status(ConnectionStatus::Connected, Duration::from_millis(SIGNAL_TIMEOUT_MS))
            .await
            .expect("Never connected");
        client
            .publish_media(sample_tracks(name))
            .await
            .expect("Publish failed");
        client
            .join(
                ROOM,
                Some(UserData {
                    name: name.to_owned(),
                    email: None,
                }),
            )
            .await
            .expect("Join failed");
        clients.push(client);
    }

    for client in &clients {
        let snapshot = wait_for_snapshot(client, SIGNAL_TIMEOUT_MS, |s| all_stable(s, 1))
            .await
            .expect("Link never became stable");
        assert_eq!(snapshot.room_id, Some(RoomId::from(ROOM)));
        assert_eq!(snapshot.members.len(), 1);
    }
    assert_eq!(server.members(&RoomId::from(ROOM)).len(), 2);

    for client in clients {
        client.disconnect().await;
    }
    server.shutdown();
}

#[tokio::test]
async fn test_server_reset_rejoins_with_new_identity() {
    init_tracing();

    let server = RendezvousServer::start().await;
    let observer = RecordingObserver::new();
    let client = Client::connect_with_factory(
        client_config(&server),
        Arc::new(MockPeerConnectionFactory::new()),
        observer.clone(),
    )
    .expect("Connect failed");

    client.join(ROOM, None).await.expect("Join failed");
    let first: ParticipantId = wait_for_snapshot(&client, SIGNAL_TIMEOUT_MS, |s| {
        s.local_id.is_some() && s.members.is_empty() && s.room_id.is_some()
    })
    .await
    .and_then(|s| s.local_id)
    .expect("No identity");

    let room = RoomId::from(ROOM);
    let start = std::time::Instant::now();
    while server.members(&room) != vec![first.clone()] {
        assert!(start.elapsed() < Duration::from_millis(SIGNAL_TIMEOUT_MS));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    server.kick_all();

    let snapshot = wait_for_snapshot(&client, SIGNAL_TIMEOUT_MS, |s| {
        s.local_id.as_ref().is_some_and(|id| *id != first)
    })
    .await
    .expect("Identity was not replaced");
    let second = snapshot.local_id.expect("No identity");
    assert_eq!(snapshot.room_id, Some(room.clone()));

    let start = std::time::Instant::now();
    while server.members(&room) != vec![second.clone()] {
        assert!(
            start.elapsed() < Duration::from_millis(SIGNAL_TIMEOUT_MS),
            "Client did not rejoin under its new identity"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(
        observer
            .has(&ObservedEvent::Status(ConnectionStatus::Reconnecting))
            .await
    );

    client.disconnect().await;
    server.shutdown();
}

#[tokio::test]
async fn test_disconnect_leaves_room() {
    init_tracing();

    let server = RendezvousServer::start().await;
    let client = Client::connect_with_factory(
        client_config(&server),
        Arc::new(MockPeerConnectionFactory::new()),
        RecordingObserver::new(),
    )
    .expect("Connect failed");
    client.join(ROOM, None).await.expect("Join failed");

    let room = RoomId::from(ROOM);
    let start = std::time::Instant::now();
    while server.members(&room).is_empty() {
        assert!(start.elapsed() < Duration::from_millis(SIGNAL_TIMEOUT_MS));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    client.disconnect().await;

    let start = std::time::Instant::now();
    while !server.members(&room).is_empty() {
        assert!(
            start.elapsed() < Duration::from_millis(SIGNAL_TIMEOUT_MS),
            "Member still listed after disconnect"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    server.shutdown();
}

#[tokio::test]
async fn test_rtc_connections_reach_stable() {
    init_tracing();

    let server = RendezvousServer::start().await;
    let mut clients = Vec::new();
    for name in ["rtc-a", "rtc-b"] {
        let config = client_config(&server);
        let factory = Arc::new(RtcConnectionFactory::new(config.transport.clone()));
        let client = Client::connect_with_factory(config, factory, RecordingObserver::new())
            .expect("Connect failed");
        client
            .publish_media(sample_tracks(name))
            .await
            .expect("Publish failed");
        client.join(ROOM, None).await.expect("Join failed");
        clients.push(client);
    }

    for client in &clients {
        let snapshot = wait_for_snapshot(client, 10_000, |s| all_stable(s, 1))
            .await
            .expect("webrtc negotiation did not settle");
        assert!(snapshot.links[0].local_tracks_attached);
    }

    for client in clients {
        client.disconnect().await;
    }
    server.shutdown();
}
