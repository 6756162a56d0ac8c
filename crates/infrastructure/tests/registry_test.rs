use application::EventBroadcaster;
use domain::{ConnectionInfo, LanguageCode, RoomKey, RoomRef, ServerEvent, UserId};
use infrastructure::InMemoryRoomRegistry;

fn connection(user: &str) -> ConnectionInfo {
    ConnectionInfo::new(
        UserId::parse(user).unwrap(),
        None,
        Some(LanguageCode::parse("en").unwrap()),
    )
}

fn room(key: &str) -> RoomKey {
    RoomKey::parse(key).unwrap()
}

fn marker(key: &str) -> ServerEvent {
    ServerEvent::JoinedRoom(RoomRef { room: room(key) })
}

#[tokio::test]
async fn join_is_idempotent_and_room_broadcast_reaches_members_only() {
    let registry = InMemoryRoomRegistry::new();
    let alice = connection("alice");
    let bob = connection("bob");
    let mut alice_rx = registry.connect(alice.clone()).await;
    let mut bob_rx = registry.connect(bob.clone()).await;

    assert!(registry.join(alice.connection_id, &room("room-1")).await);
    assert!(!registry.join(alice.connection_id, &room("room-1")).await);

    let delivered = registry
        .broadcast_to_room(&room("room-1"), marker("room-1"))
        .await
        .unwrap();

    assert_eq!(delivered, 1);
    assert_eq!(alice_rx.try_recv().unwrap(), marker("room-1"));
    assert!(alice_rx.try_recv().is_err());
    assert!(bob_rx.try_recv().is_err());
}

#[tokio::test]
async fn leave_without_join_is_noop() {
    let registry = InMemoryRoomRegistry::new();
    let alice = connection("alice");
    let _rx = registry.connect(alice.clone()).await;

    assert!(!registry.leave(alice.connection_id, &room("room-1")).await);

    registry.join(alice.connection_id, &room("room-1")).await;
    assert!(registry.leave(alice.connection_id, &room("room-1")).await);
    assert!(registry.room_members(&room("room-1")).await.is_empty());
}

#[tokio::test]
async fn disconnect_removes_every_membership() {
    let registry = InMemoryRoomRegistry::new();
    let alice = connection("alice");
    let bob = connection("bob");
    let _alice_rx = registry.connect(alice.clone()).await;
    let mut bob_rx = registry.connect(bob.clone()).await;

    for key in ["room-1", "room-2", "babelbot-alice"] {
        registry.join(alice.connection_id, &room(key)).await;
    }
    registry.join(bob.connection_id, &room("room-1")).await;

    registry.disconnect(alice.connection_id).await;

    assert!(registry.rooms_of(alice.connection_id).await.is_empty());
    let members = registry.room_members(&room("room-1")).await;
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, bob.user_id);
    assert!(registry.room_members(&room("room-2")).await.is_empty());
    assert_eq!(registry.connection_count().await, 1);

    let delivered = registry
        .broadcast_to_room(&room("room-1"), marker("room-1"))
        .await
        .unwrap();
    assert_eq!(delivered, 1);
    assert_eq!(bob_rx.try_recv().unwrap(), marker("room-1"));
}

#[tokio::test]
async fn broadcast_all_ignores_membership() {
    let registry = InMemoryRoomRegistry::new();
    let alice = connection("alice");
    let bob = connection("bob");
    let mut alice_rx = registry.connect(alice.clone()).await;
    let mut bob_rx = registry.connect(bob.clone()).await;
    registry.join(alice.connection_id, &room("room-1")).await;

    let delivered = registry.broadcast_all(marker("room-1")).await.unwrap();

    assert_eq!(delivered, 2);
    assert!(alice_rx.try_recv().is_ok());
    assert!(bob_rx.try_recv().is_ok());
}

#[tokio::test]
async fn same_user_on_two_connections_gets_independent_membership() {
    let registry = InMemoryRoomRegistry::new();
    let phone = connection("alice");
    let laptop = connection("alice");
    let mut phone_rx = registry.connect(phone.clone()).await;
    let mut laptop_rx = registry.connect(laptop.clone()).await;

    registry.join(phone.connection_id, &room("room-1")).await;
    registry
        .broadcast_to_room(&room("room-1"), marker("room-1"))
        .await
        .unwrap();

    assert!(phone_rx.try_recv().is_ok());
    assert!(laptop_rx.try_recv().is_err());
}

#[tokio::test]
async fn dropped_receiver_is_not_counted() {
    let registry = InMemoryRoomRegistry::new();
    let alice = connection("alice");
    let bob = connection("bob");
    let alice_rx = registry.connect(alice.clone()).await;
    let _bob_rx = registry.connect(bob.clone()).await;
    registry.join(alice.connection_id, &room("room-1")).await;
    registry.join(bob.connection_id, &room("room-1")).await;
    drop(alice_rx);

    let delivered = registry
        .broadcast_to_room(&room("room-1"), marker("room-1"))
        .await
        .unwrap();
    assert_eq!(delivered, 1);
}

#[tokio::test]
async fn concurrent_joins_and_leaves_keep_state_consistent() {
    let registry = std::sync::Arc::new(InMemoryRoomRegistry::new());
    let mut handles = Vec::new();
    let mut connections = Vec::new();

    for i in 0..20 {
        let info = connection(&format!("user{i}"));
        let rx = registry.connect(info.clone()).await;
        connections.push((info, rx));
    }

    for (info, _) in &connections {
        let registry = registry.clone();
        let id = info.connection_id;
        handles.push(tokio::spawn(async move {
            for key in ["a", "b", "c"] {
                registry.join(id, &RoomKey::parse(key).unwrap()).await;
            }
            registry.leave(id, &RoomKey::parse("b").unwrap()).await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(registry.room_members(&room("a")).await.len(), 20);
    assert!(registry.room_members(&room("b")).await.is_empty());
    assert_eq!(registry.room_members(&room("c")).await.len(), 20);
}
