use entity_actor::config::RuntimeConfig;
use entity_actor::framework::{probe::TestProbe, EntityError, GroupBroadcaster, InitializeState};
use entity_actor::lifecycle::{try_setup_tracing, EntitySystem, ShutdownError};
use entity_actor::session_actor::{
    self, session_address, Chat, GetPosition, Kick, Move, PlayerState, Position, Say, Zone,
};
use std::time::Duration;
use tokio::sync::mpsc;

fn test_config() -> RuntimeConfig {
    RuntimeConfig {
        ask_timeout_ms: 1_000,
        ..RuntimeConfig::default()
    }
}

async fn wait_for_members(zones: &GroupBroadcaster<Zone>, zone: Zone, count: usize) {
    for _ in 0..200 {
        if zones.member_count(zone).await.unwrap() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("{zone:?} never reached {count} members");
}

/// Full end-to-end test with real sessions, a real zone broadcaster and the system orchestrator.
#[tokio::test]
async fn sessions_move_chat_and_answer() {
    try_setup_tracing("debug");
    let zones = GroupBroadcaster::<Zone>::new("zones");
    let table = session_actor::dispatch_table(zones.clone());
    let mut system = EntitySystem::new(test_config());

    let alice = system.spawn(session_address(Zone::Lobby, "alice"), table.clone());
    let bob = system.spawn(session_address(Zone::Lobby, "bob"), table);
    alice.initialize(PlayerState::new("alice", Zone::Lobby)).await.unwrap();
    bob.actor_ref()
        .tell(InitializeState::new(PlayerState::new("bob", Zone::Lobby)))
        .unwrap();
    wait_for_members(&zones, Zone::Lobby, 2).await;

    // a spectator probe sees the same chat
    let mut spectator = TestProbe::new("/spectator");
    zones.add_to_group(Zone::Lobby, spectator.actor_ref()).unwrap();

    alice.actor_ref().tell(Move { dx: 5, dy: 7 }).unwrap();
    alice.actor_ref().tell(Move { dx: -1, dy: 0 }).unwrap();
    let position: Position = system.ask(alice.actor_ref(), GetPosition).await.unwrap();
    assert_eq!(position, Position { x: 4, y: 7 });

    alice.actor_ref().tell(Say::new("hello")).unwrap();
    let (chat, from) = spectator.expect_message_from::<Chat>().await;
    assert_eq!(chat.from, "alice");
    assert_eq!(chat.text, "hello");
    assert_eq!(from.as_ref(), Some(alice.actor_ref()));

    // bob's inbox has the line once the request behind it is answered
    let _: Position = system.ask(bob.actor_ref(), GetPosition).await.unwrap();
    let inbox = bob
        .read_state(|s| s.data().map(|p| p.inbox.clone()).unwrap_or_default())
        .await;
    assert_eq!(inbox, vec!["alice: hello".to_string()]);

    system.shutdown().await.unwrap();
    wait_for_members(&zones, Zone::Lobby, 1).await;
    zones.shutdown().await;
}

#[tokio::test]
async fn kicked_session_leaves_zone_and_stops_answering() {
    let zones = GroupBroadcaster::<Zone>::new("zones");
    let mut system = EntitySystem::new(test_config());
    let carol = system.spawn(
        session_address(Zone::Arena, "carol"),
        session_actor::dispatch_table(zones.clone()),
    );
    carol.initialize(PlayerState::new("carol", Zone::Arena)).await.unwrap();
    wait_for_members(&zones, Zone::Arena, 1).await;

    carol
        .actor_ref()
        .tell(Kick {
            reason: "afk".to_string(),
        })
        .unwrap();
    wait_for_members(&zones, Zone::Arena, 0).await;

    let answer = carol
        .actor_ref()
        .ask_timeout::<Position, _>(GetPosition, Duration::from_millis(100))
        .await;
    assert!(answer.is_err());
    assert!(carol.read_state(|s| s.data().map(|p| p.kicked)).await.unwrap());

    system.shutdown().await.unwrap();
    zones.shutdown().await;
}

#[tokio::test]
async fn out_of_bounds_move_is_a_fault_reported_at_shutdown() {
    let zones = GroupBroadcaster::<Zone>::new("zones");
    let (sink, mut diagnostics) = mpsc::unbounded_channel();
    let mut system = EntitySystem::new(test_config()).with_diagnostics(sink);
    let dave = system.spawn(
        session_address(Zone::Arena, "dave"),
        session_actor::dispatch_table(zones.clone()),
    );

    // before initialization this is only a diagnostic
    dave.actor_ref().tell(Move { dx: 1, dy: 1 }).unwrap();
    assert!(matches!(
        diagnostics.recv().await.unwrap(),
        EntityError::UninitializedMessageDropped { message_type: "Move", .. }
    ));

    dave.initialize(PlayerState::new("dave", Zone::Arena)).await.unwrap();
    wait_for_members(&zones, Zone::Arena, 1).await;
    dave.actor_ref().tell(Move { dx: 500, dy: 0 }).unwrap();

    tokio::time::timeout(Duration::from_secs(1), dave.terminated())
        .await
        .unwrap();
    // the zone membership resource ran during disposal
    wait_for_members(&zones, Zone::Arena, 0).await;

    match system.shutdown().await {
        Err(ShutdownError::Entity(EntityError::HandlerFault { message_type, .. })) => {
            assert_eq!(message_type, "Move")
        }
        other => panic!("expected the move fault, got {other:?}"),
    }
    zones.shutdown().await;
}
