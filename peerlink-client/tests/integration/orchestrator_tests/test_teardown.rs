use peerlink_client::transport::sample_tracks;
use peerlink_core::{NegotiationState, PeerConnectionState, RoomId, SignalingMessage};

use crate::integration::{ROOM, create_joined_orchestrator, init_tracing, pid};
use crate::utils::ObservedEvent;

#[tokio::test]
async fn test_leave_room_closes_every_link() {
    init_tracing();

    let test = create_joined_orchestrator("a").await;
    test.handle
        .publish_media(sample_tracks("a"))
        .await
        .expect("Publish failed");
    test.room_update(&["b", "c"]).await;
    let (ok, _) = test.wait_until(2000, |s| s.links.len() == 2).await;
    assert!(ok, "Links were not created");

    test.handle.leave().await.expect("Leave failed");
    let (ok, snapshot) = test
        .wait_until(2000, |s| s.links.is_empty() && s.room_id.is_none())
        .await;
    assert!(ok, "Leave did not tear down the session");
    assert!(snapshot.members.is_empty());

    let leave = test
        .signaling
        .wait_for_kind("leave-room", 2000)
        .await
        .expect("leave-room not sent");
    assert_eq!(
        leave,
        SignalingMessage::LeaveRoom {
            room_id: RoomId::from(ROOM),
            user_id: Some(pid("a")),
        }
    );

    for remote in ["b", "c"] {
        let connection = test.factory.latest(&pid(remote)).await.expect("No connection");
        assert!(connection.is_closed(), "Connection to {} left open", remote);
        assert!(
            test.observer
                .has(&ObservedEvent::LinkClosed(pid(remote)))
                .await
        );
    }
}

#[tokio::test]
async fn test_member_missing_from_update_loses_link() {
    init_tracing();

    let test = create_joined_orchestrator("a").await;
    test.handle
        .publish_media(sample_tracks("a"))
        .await
        .expect("Publish failed");
    test.room_update(&["b", "c"]).await;
    let (ok, _) = test.wait_until(2000, |s| s.links.len() == 2).await;
    assert!(ok);

    test.room_update(&["c"]).await;
    let (ok, snapshot) = test
        .wait_until(2000, |s| s.link(&pid("b")).is_none())
        .await;
    assert!(ok, "Link to b should be removed");
    assert!(snapshot.link(&pid("c")).is_some());
    assert_eq!(snapshot.members, vec![pid("c")]);

    let to_b = test.factory.latest(&pid("b")).await.expect("No connection");
    assert!(to_b.is_closed());
}

#[tokio::test]
async fn test_remote_leave_closes_link() {
    init_tracing();

    let test = create_joined_orchestrator("a").await;
    test.room_update(&["b"]).await;
    test.offer_from("b", "v=0 offer").await;
    let (ok, _) = test.wait_until(2000, |s| s.link(&pid("b")).is_some()).await;
    assert!(ok);

    test.deliver(SignalingMessage::LeaveRoom {
        room_id: RoomId::from(ROOM),
        user_id: Some(pid("b")),
    })
    .await;

    let (ok, snapshot) = test.wait_until(2000, |s| s.links.is_empty()).await;
    assert!(ok, "Remote leave should close the link");
    assert!(snapshot.members.is_empty());
}

#[tokio::test]
async fn test_transport_failure_discards_link() {
    init_tracing();

    let test = create_joined_orchestrator("a").await;
    test.room_update(&["b"]).await;
    test.offer_from("b", "v=0 offer").await;
    let connection = test
        .factory
        .wait_for_connection(&pid("b"), 2000)
        .await
        .expect("No connection to b");

    connection.emit_state(PeerConnectionState::Connected).await;
    let (ok, _) = test
        .wait_until(2000, |s| {
            s.link(&pid("b"))
                .is_some_and(|l| l.connection == PeerConnectionState::Connected)
        })
        .await;
    assert!(ok);

    connection.emit_state(PeerConnectionState::Failed).await;
    let (ok, snapshot) = test.wait_until(2000, |s| s.links.is_empty()).await;
    assert!(ok, "Failed link should be removed");
    assert_eq!(snapshot.members, vec![pid("b")]);
    assert!(connection.is_closed());
    assert!(
        test.observer
            .has(&ObservedEvent::Negotiation {
                remote_id: pid("b"),
                state: NegotiationState::Failed,
            })
            .await
    );
}
