use std::sync::Arc;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use deepdig_server::game::{GameError, MatchOptions, MatchTimings};
use deepdig_server::service::{MatchService, ServiceError};
use deepdig_server::store::{MemoryStore, SnapshotStore};
use deepdig_server::world::template::Scalar;
use deepdig_server::world::{Position, TemplateOverrides, WorldGenError};
use deepdig_server::ws::hub::ChannelHub;

fn timings() -> MatchTimings {
    MatchTimings {
        hazard_tick: Duration::from_millis(100),
        step_interval: Duration::from_millis(100),
        charge_fuse: Duration::from_millis(300),
        save_debounce: Duration::from_secs(5),
    }
}

fn small_options(seed: u64) -> MatchOptions {
    MatchOptions {
        template: "standard".into(),
        overrides: TemplateOverrides {
            width: Some(Scalar::Fixed(12.0)),
            depth: Some(Scalar::Fixed(16.0)),
            ..TemplateOverrides::default()
        },
        seed: Some(seed),
    }
}

fn service() -> (MatchService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let service = MatchService::new(store.clone(), Arc::new(ChannelHub::default()), timings());
    (service, store)
}

#[tokio::test(start_paused = true)]
async fn create_join_and_walk() {
    let (service, _) = service();
    let created = assert_ok!(service.create_match("dig".into(), small_options(1)).await);
    assert_eq!(service.active_matches(), 1);

    let player = assert_ok!(service.join_match(created.id, "ada".into()).await);
    assert_eq!(player.position.y, created.world.air_gap);
    assert_eq!(service.total_players(), 1);

    // Air row is always open, so a sideways step is a plain walk
    let x = if player.position.x == 0 { 1 } else { player.position.x - 1 };
    let target = Position::new(x, player.position.y);
    let moved = assert_ok!(service.move_player(created.id, player.id, vec![target]).await);
    assert_eq!(moved.position, target);
    assert!(moved.fuel < player.fuel);

    let snapshot = assert_ok!(service.get_match(created.id).await);
    assert_eq!(snapshot.players.len(), 1);
    assert_eq!(snapshot.players[0].position, target);
}

#[tokio::test(start_paused = true)]
async fn oversized_world_is_rejected() {
    let (service, store) = service();
    let options = MatchOptions {
        overrides: TemplateOverrides {
            width: Some(Scalar::Fixed(60000.0)),
            depth: Some(Scalar::Fixed(60000.0)),
            ..TemplateOverrides::default()
        },
        ..small_options(9)
    };

    let err = assert_err!(service.create_match("huge".into(), options).await);
    assert!(matches!(
        err,
        ServiceError::WorldGen(WorldGenError::InvalidDimensions { .. })
    ));
    assert_eq!(service.active_matches(), 0);
    assert!(store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn rejected_moves_leave_the_player_in_place() {
    let (service, _) = service();
    let created = assert_ok!(service.create_match("dig".into(), small_options(2)).await);
    let player = assert_ok!(service.join_match(created.id, "bo".into()).await);

    let err = assert_err!(service.move_player(created.id, player.id, vec![]).await);
    assert_eq!(err, GameError::EmptyPath);

    let far_x = if player.position.x >= 6 { player.position.x - 5 } else { player.position.x + 5 };
    let far = Position::new(far_x, player.position.y);
    let err = assert_err!(service.move_player(created.id, player.id, vec![far]).await);
    assert_eq!(err, GameError::NotAdjacent(far));

    let snapshot = assert_ok!(service.get_match(created.id).await);
    assert_eq!(snapshot.players[0].position, player.position);
    assert!(!snapshot.players[0].moving);
}

#[tokio::test(start_paused = true)]
async fn unknown_match_and_player_are_reported() {
    let (service, _) = service();
    let err = assert_err!(service.join_match(Uuid::new_v4(), "x".into()).await);
    assert_eq!(err, GameError::UnknownMatch);

    let created = assert_ok!(service.create_match("dig".into(), small_options(3)).await);
    let err = assert_err!(service.sell(created.id, Uuid::new_v4()).await);
    assert_eq!(err, GameError::UnknownPlayer);
}

#[tokio::test(start_paused = true)]
async fn saves_wait_for_the_debounce_window() {
    let (service, store) = service();
    let created = assert_ok!(service.create_match("dig".into(), small_options(4)).await);
    assert_ok!(service.join_match(created.id, "cy".into()).await);

    // Stored copy still has the state from creation
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(assert_ok!(store.read(created.id)).players.is_empty());

    tokio::time::sleep(Duration::from_secs(5)).await;
    // Round trip through the actor so the flush has been processed
    assert_ok!(service.get_match(created.id).await);
    let stored = assert_ok!(store.read(created.id));
    assert_eq!(stored.players.len(), 1);
    assert!(stored.saved_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn deleted_match_stays_deleted_after_pending_save() {
    let (service, store) = service();
    let created = assert_ok!(service.create_match("dig".into(), small_options(5)).await);
    assert_ok!(service.join_match(created.id, "di".into()).await);

    assert_ok!(service.delete_match(created.id).await);
    assert!(store.is_empty());
    assert_eq!(service.active_matches(), 0);

    assert!(service.hub().subscribe(created.id).is_none());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(store.is_empty());
    assert!(service.hub().subscribe(created.id).is_none());
    let err = assert_err!(service.get_match(created.id).await);
    assert_eq!(err, GameError::UnknownMatch);
}

#[tokio::test(start_paused = true)]
async fn restore_brings_stored_matches_back() {
    let (service, store) = service();
    let created = assert_ok!(service.create_match("dig".into(), small_options(6)).await);
    let player = assert_ok!(service.join_match(created.id, "ed".into()).await);
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_ok!(service.get_match(created.id).await);

    let restarted = MatchService::new(store.clone(), Arc::new(ChannelHub::default()), timings());
    assert_eq!(assert_ok!(restarted.restore()), 1);
    // Already running matches are skipped
    assert_eq!(assert_ok!(restarted.restore()), 0);

    let snapshot = assert_ok!(restarted.get_match(created.id).await);
    assert_eq!(snapshot.players.len(), 1);
    assert_eq!(snapshot.players[0].id, player.id);
    assert_eq!(snapshot.world, created.world);
    assert_eq!(restarted.total_players(), 1);
}

#[tokio::test(start_paused = true)]
async fn subscribers_receive_player_updates() {
    let (service, _) = service();
    let created = assert_ok!(service.create_match("dig".into(), small_options(7)).await);
    let mut updates = service.hub().subscribe(created.id).unwrap();

    let player = assert_ok!(service.join_match(created.id, "fay".into()).await);
    let payload = assert_ok!(updates.recv().await);
    let value: serde_json::Value = assert_ok!(serde_json::from_str(&payload));
    assert_eq!(value["update"], "playerJoin");
    assert_eq!(value["matchId"], created.id.to_string());
    assert_eq!(value["player"]["id"], player.id.to_string());

    assert_ok!(service.exit_match(created.id, player.id).await);
    let payload = assert_ok!(updates.recv().await);
    assert!(payload.contains("\"playerExit\""));
    assert_eq!(service.total_players(), 0);
}
