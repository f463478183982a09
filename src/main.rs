//! Demo: two players in the lobby chat, one moves, one gets kicked.

use entity_actor::config::RuntimeConfig;
use entity_actor::framework::{GroupBroadcaster, InitializeState};
use entity_actor::lifecycle::{setup_tracing, EntitySystem};
use entity_actor::session_actor::{
    self, session_address, GetPosition, Kick, Move, PlayerState, Position, Say, Zone,
};
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    setup_tracing();

    let config = RuntimeConfig::from_env();
    info!(?config, "Starting session demo");

    let zones = GroupBroadcaster::<Zone>::new("zones");
    let table = session_actor::dispatch_table(zones.clone());
    let mut system = EntitySystem::new(config);

    let alice = system.spawn(session_address(Zone::Lobby, "alice"), table.clone());
    let bob = system.spawn(session_address(Zone::Lobby, "bob"), table);

    // dropped: bob is not initialized yet
    bob.actor_ref().tell(Say::new("anyone here?"))?;

    alice.initialize(PlayerState::new("alice", Zone::Lobby)).await?;
    bob.actor_ref()
        .tell(InitializeState::new(PlayerState::new("bob", Zone::Lobby)))?;

    alice.actor_ref().tell(Move { dx: 3, dy: -4 })?;
    let position: Position = system.ask(alice.actor_ref(), GetPosition).await?;
    info!(x = position.x, y = position.y, "Alice position");

    // give both sessions time to join before chatting
    while zones.member_count(Zone::Lobby).await? < 2 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    alice.actor_ref().tell(Say::new("hi bob"))?;
    bob.actor_ref().tell(Say::new("hi alice"))?;

    bob.actor_ref().tell(Kick {
        reason: "demo over".to_string(),
    })?;
    match bob
        .actor_ref()
        .ask_timeout::<Position, _>(GetPosition, Duration::from_millis(200))
        .await
    {
        Ok(position) => info!(?position, "Bob still answers"),
        Err(e) => warn!(error = %e, "Bob no longer answers"),
    }

    let inbox = alice
        .read_state(|state| state.data().map(|p| p.inbox.clone()).unwrap_or_default())
        .await;
    info!(?inbox, "Alice inbox");

    system.shutdown().await?;
    zones.shutdown().await;
    info!("Demo complete");
    Ok(())
}
