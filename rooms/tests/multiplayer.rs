use std::sync::Arc;
use std::time::Duration;

use outpost_defence_core::{CellCoord, EnemyKind, PlayerId, TowerKind};
use outpost_defence_rooms::{
    Audience, Gateway, Outbound, RoomCode, RoomConfig, RoomError, RoomManager, RoomStatus,
    ServerEvent,
};

const TICK: Duration = Duration::from_millis(50);

const ALICE: PlayerId = PlayerId::new(1);
const BOB: PlayerId = PlayerId::new(2);
const CAROL: PlayerId = PlayerId::new(3);

/// Gateway that records every delivery for assertions.
#[derive(Default)]
struct Recording {
    deliveries: parking_lot::Mutex<Vec<Outbound>>,
}

impl Recording {
    fn events(&self) -> Vec<ServerEvent> {
        self.deliveries
            .lock()
            .iter()
            .map(|outbound| outbound.event.clone())
            .collect()
    }

    fn direct_to(&self, player: PlayerId) -> Vec<ServerEvent> {
        self.deliveries
            .lock()
            .iter()
            .filter(|outbound| outbound.audience == Audience::Player(player))
            .map(|outbound| outbound.event.clone())
            .collect()
    }
}

impl Gateway for Recording {
    fn broadcast(&self, room: &RoomCode, event: &ServerEvent) {
        self.deliveries.lock().push(Outbound {
            room: room.clone(),
            audience: Audience::Room,
            event: event.clone(),
        });
    }

    fn direct(&self, room: &RoomCode, player: PlayerId, event: &ServerEvent) {
        self.deliveries.lock().push(Outbound {
            room: room.clone(),
            audience: Audience::Player(player),
            event: event.clone(),
        });
    }
}

fn test_config() -> RoomConfig {
    RoomConfig {
        countdown: Duration::from_secs(1),
        wave_prep: Duration::from_secs(2),
        idle_timeout: Duration::ZERO,
        points_per_kill: 5,
        ..RoomConfig::default()
    }
}

fn manager() -> (RoomManager, Arc<Recording>) {
    let recording = Arc::new(Recording::default());
    let gateway: Arc<dyn Gateway> = Arc::clone(&recording) as Arc<dyn Gateway>;
    (RoomManager::new(test_config(), gateway), recording)
}

fn step_for(manager: &RoomManager, code: &RoomCode, duration: Duration) {
    let mut elapsed = Duration::ZERO;
    while elapsed < duration {
        manager.step_room(code, TICK).expect("step");
        elapsed += TICK;
    }
}

/// Creates a two-player room and steps it through the countdown into play.
fn playing_room(manager: &RoomManager) -> RoomCode {
    let code = manager
        .create_room(ALICE, "Alice".to_string(), 0)
        .expect("create");
    manager
        .join_room(&code, BOB, "Bob".to_string())
        .expect("join");
    manager.set_ready(BOB, true).expect("ready");
    manager.start_game(ALICE).expect("start");
    step_for(manager, &code, Duration::from_millis(1050));
    assert_eq!(manager.room_status(&code), Ok(RoomStatus::Playing));
    code
}

fn board_gold(manager: &RoomManager, code: &RoomCode, player: PlayerId) -> u32 {
    let snapshot = manager.snapshot(code).expect("snapshot");
    snapshot
        .players
        .iter()
        .find(|entry| entry.id == player)
        .expect("player present")
        .board
        .gold
}

#[tokio::test(start_paused = true)]
async fn lobby_gates_start_on_players_and_readiness() {
    let (manager, _) = manager();
    let code = manager
        .create_room(ALICE, "Alice".to_string(), 0)
        .expect("create");
    assert!(code.as_str().starts_with('D'));

    assert_eq!(manager.start_game(ALICE), Err(RoomError::NotEnoughPlayers));

    manager
        .join_room(&code, BOB, "Bob".to_string())
        .expect("join");
    assert_eq!(manager.start_game(ALICE), Err(RoomError::NotReady));

    manager.set_ready(BOB, true).expect("ready");
    assert_eq!(manager.start_game(BOB), Err(RoomError::NotHost));

    manager.start_game(ALICE).expect("start");
    assert_eq!(manager.room_status(&code), Ok(RoomStatus::Countdown));

    // Joining after the countdown began is rejected.
    assert_eq!(
        manager.join_room(&code, CAROL, "Carol".to_string()),
        Err(RoomError::AlreadyStarted)
    );

    step_for(&manager, &code, Duration::from_millis(1050));
    assert_eq!(manager.room_status(&code), Ok(RoomStatus::Playing));
}

#[tokio::test(start_paused = true)]
async fn unknown_rooms_and_maps_are_rejected() {
    let (manager, _) = manager();
    assert_eq!(
        manager.create_room(ALICE, "Alice".to_string(), 99),
        Err(RoomError::UnknownMap)
    );
    assert_eq!(
        manager.join_room(
            &RoomCode::from_string("DZZZZZ".to_string()),
            BOB,
            "Bob".to_string()
        ),
        Err(RoomError::RoomNotFound)
    );
    assert_eq!(manager.leave_room(ALICE), Err(RoomError::PlayerNotFound));
}

#[tokio::test(start_paused = true)]
async fn reconnecting_keeps_the_player_record() {
    let (manager, _) = manager();
    let code = manager
        .create_room(ALICE, "Alice".to_string(), 0)
        .expect("create");
    manager
        .join_room(&code, BOB, "Bob".to_string())
        .expect("join");
    manager
        .join_room(&code, BOB, "Bob".to_string())
        .expect("reconnect");

    let snapshot = manager.snapshot(&code).expect("snapshot");
    assert_eq!(snapshot.players.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn both_players_place_towers_from_starting_gold() {
    let (manager, recording) = manager();
    let code = playing_room(&manager);

    let cell = CellCoord::new(1, 4);
    let _ = manager
        .place_tower(ALICE, TowerKind::Archer, cell)
        .expect("alice placement");
    let _ = manager
        .place_tower(BOB, TowerKind::Archer, cell)
        .expect("bob placement");

    assert_eq!(board_gold(&manager, &code, ALICE), 400);
    assert_eq!(board_gold(&manager, &code, BOB), 400);

    let snapshot = manager.snapshot(&code).expect("snapshot");
    for player in &snapshot.players {
        assert_eq!(player.board.towers.len(), 1);
    }

    let placements = recording
        .events()
        .into_iter()
        .filter(|event| matches!(event, ServerEvent::TowerPlaced { .. }))
        .count();
    assert_eq!(placements, 2);
}

#[tokio::test(start_paused = true)]
async fn shared_wave_runs_every_board_and_pays_the_reward() {
    let (manager, recording) = manager();
    let code = playing_room(&manager);

    assert_eq!(manager.start_wave(BOB), Err(RoomError::NotHost));
    assert_eq!(manager.start_wave(ALICE), Ok(1));
    assert_eq!(manager.start_wave(ALICE), Err(RoomError::WaveInProgress));
    assert_eq!(manager.room_wave(&code), Ok(1));

    // Nobody defends: all eight basics breach on both boards, then the wave
    // completes room-wide and the reward lands.
    for _ in 0..4000 {
        manager.step_room(&code, TICK).expect("step");
        let snapshot = manager.snapshot(&code).expect("snapshot");
        if !snapshot.wave_active {
            break;
        }
    }

    let snapshot = manager.snapshot(&code).expect("snapshot");
    assert!(!snapshot.wave_active);
    for player in &snapshot.players {
        assert_eq!(player.board.lives, 12);
        assert_eq!(player.board.gold, 550);
    }
    assert!(recording
        .events()
        .iter()
        .any(|event| matches!(event, ServerEvent::WaveComplete { wave: 1 })));
}

#[tokio::test(start_paused = true)]
async fn kills_convert_to_send_points_and_sends_charge_them() {
    let (manager, recording) = manager();
    let code = playing_room(&manager);

    // Alice fortifies the spawn approach; Bob builds nothing.
    for cell in [(1u32, 4u32), (3, 4), (2, 6), (4, 6)] {
        let _ = manager
            .place_tower(ALICE, TowerKind::Archer, CellCoord::new(cell.0, cell.1))
            .expect("placement");
    }

    assert_eq!(
        manager.send_enemy(ALICE, Some(BOB), EnemyKind::Fast),
        Err(RoomError::InsufficientPoints)
    );

    assert_eq!(manager.start_wave(ALICE), Ok(1));
    for _ in 0..4000 {
        manager.step_room(&code, TICK).expect("step");
        if !manager.snapshot(&code).expect("snapshot").wave_active {
            break;
        }
    }

    // Eight kills at five points each.
    let snapshot = manager.snapshot(&code).expect("snapshot");
    let alice = snapshot
        .players
        .iter()
        .find(|player| player.id == ALICE)
        .expect("alice");
    assert_eq!(alice.send_points, 40);

    // Self-sends and unset targets are rejected before any charge.
    assert_eq!(
        manager.send_enemy(ALICE, Some(ALICE), EnemyKind::Fast),
        Err(RoomError::SelfTarget)
    );
    assert_eq!(
        manager.send_enemy(ALICE, None, EnemyKind::Fast),
        Err(RoomError::NoTarget)
    );

    manager.select_target(ALICE, BOB).expect("select target");
    assert_eq!(manager.send_enemy(ALICE, None, EnemyKind::Fast), Ok(1));

    let snapshot = manager.snapshot(&code).expect("snapshot");
    let alice = snapshot
        .players
        .iter()
        .find(|player| player.id == ALICE)
        .expect("alice");
    let bob = snapshot
        .players
        .iter()
        .find(|player| player.id == BOB)
        .expect("bob");
    assert_eq!(alice.send_points, 30);
    assert_eq!(alice.total_sent, 1);
    assert_eq!(bob.total_received, 1);
    assert_eq!(bob.board.enemies.len(), 1);
    let sent = &bob.board.enemies[0];
    assert_eq!(sent.kind, EnemyKind::Fast);
    assert!((sent.max_health - EnemyKind::Fast.max_health() * 1.25).abs() < 1e-4);

    // Only Bob got the private incoming notice.
    assert!(recording
        .direct_to(BOB)
        .iter()
        .any(|event| matches!(event, ServerEvent::IncomingAttack { from, .. } if *from == ALICE)));
    assert!(recording.direct_to(ALICE).is_empty());
}

#[tokio::test(start_paused = true)]
async fn collapsing_boards_eliminate_and_rank_players() {
    let (manager, recording) = manager();
    let code = playing_room(&manager);

    // Alice defends; Bob leaks every wave until his twenty lives run out.
    for cell in [(1u32, 4u32), (3, 4), (2, 6), (4, 6)] {
        let _ = manager
            .place_tower(ALICE, TowerKind::Archer, CellCoord::new(cell.0, cell.1))
            .expect("placement");
    }
    assert_eq!(manager.start_wave(ALICE), Ok(1));

    // Waves after the first auto-start from the build-phase countdown.
    for _ in 0..40_000 {
        manager.step_room(&code, TICK).expect("step");
        if manager.room_status(&code) == Ok(RoomStatus::Ended) {
            break;
        }
    }
    assert_eq!(manager.room_status(&code), Ok(RoomStatus::Ended));

    let events = recording.events();
    assert!(events
        .iter()
        .any(|event| matches!(event, ServerEvent::PlayerEliminated { player, rank: 2 } if *player == BOB)));
    let rankings = events
        .iter()
        .rev()
        .find_map(|event| match event {
            ServerEvent::GameOver { rankings } => Some(rankings.clone()),
            _ => None,
        })
        .expect("game over broadcast");
    assert_eq!(rankings.len(), 2);
    assert_eq!(rankings[0].player, ALICE);
    assert_eq!(rankings[0].rank, 1);
    assert!(!rankings[0].eliminated);
    assert_eq!(rankings[1].player, BOB);
    assert_eq!(rankings[1].rank, 2);
    assert!(rankings[1].eliminated);

    // Eliminated players are rejected, and stopping is idempotent.
    assert_eq!(
        manager.place_tower(BOB, TowerKind::Archer, CellCoord::new(1, 1)),
        Err(RoomError::NotPlaying)
    );
    manager.stop_room(&code).expect("first stop");
    manager.stop_room(&code).expect("second stop");
}

#[tokio::test(start_paused = true)]
async fn leaving_mid_game_is_immediate_elimination() {
    let (manager, recording) = manager();
    let code = playing_room(&manager);

    manager.leave_room(BOB).expect("leave");

    let events = recording.events();
    assert!(events
        .iter()
        .any(|event| matches!(event, ServerEvent::PlayerLeft { player } if *player == BOB)));
    assert!(events
        .iter()
        .any(|event| matches!(event, ServerEvent::PlayerEliminated { player, .. } if *player == BOB)));
    // With one survivor the room ends immediately.
    assert_eq!(manager.room_status(&code), Ok(RoomStatus::Ended));

    // Departed players are forgotten; commands from them fail cleanly.
    assert_eq!(manager.leave_room(BOB), Err(RoomError::PlayerNotFound));
}

#[tokio::test(start_paused = true)]
async fn empty_rooms_tear_down_and_ended_rooms_sweep() {
    let (manager, _) = manager();
    let code = manager
        .create_room(ALICE, "Alice".to_string(), 0)
        .expect("create");
    manager
        .join_room(&code, BOB, "Bob".to_string())
        .expect("join");

    manager.leave_room(BOB).expect("bob leaves");
    manager.leave_room(ALICE).expect("alice leaves");
    assert_eq!(manager.room_count(), 0);

    // An ended room lingers until the sweep claims it.
    let code = playing_room(&manager);
    manager.stop_room(&code).expect("stop");
    assert_eq!(manager.room_count(), 1);
    assert_eq!(manager.sweep_stale(), 1);
    assert_eq!(manager.room_count(), 0);
    assert_eq!(manager.sweep_stale(), 0);
}

#[tokio::test(start_paused = true)]
async fn snapshots_broadcast_on_the_reduced_cadence() {
    let (manager, recording) = manager();
    let code = playing_room(&manager);

    let before = recording
        .events()
        .into_iter()
        .filter(|event| matches!(event, ServerEvent::StateUpdate { .. }))
        .count();
    for _ in 0..8 {
        manager.step_room(&code, TICK).expect("step");
    }
    let after = recording
        .events()
        .into_iter()
        .filter(|event| matches!(event, ServerEvent::StateUpdate { .. }))
        .count();
    assert_eq!(after - before, 2);
}

#[tokio::test(start_paused = true)]
async fn room_codes_are_unique_and_prefixed() {
    let (manager, _) = manager();
    let mut codes = Vec::new();
    for index in 0..8u64 {
        let code = manager
            .create_room(PlayerId::new(100 + index), format!("Host{index}"), 0)
            .expect("create");
        assert!(code.as_str().starts_with('D'));
        assert!(!codes.contains(&code));
        codes.push(code);
    }
    assert_eq!(manager.room_count(), 8);
}

#[tokio::test(start_paused = true)]
async fn server_events_serialize_for_the_wire() {
    let (manager, recording) = manager();
    let code = playing_room(&manager);
    let _ = manager
        .place_tower(ALICE, TowerKind::Tesla, CellCoord::new(2, 6))
        .expect("placement");
    step_for(&manager, &code, Duration::from_millis(400));

    for event in recording.events() {
        let encoded = serde_json::to_string(&event).expect("encode");
        let decoded: ServerEvent = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, event);
    }
}

#[tokio::test]
async fn spawned_tickers_drive_rooms_and_stop_idempotently() {
    let recording = Arc::new(Recording::default());
    let gateway: Arc<dyn Gateway> = Arc::clone(&recording) as Arc<dyn Gateway>;
    let config = RoomConfig {
        countdown: Duration::from_millis(100),
        ..RoomConfig::default()
    };
    let manager = RoomManager::new(config, gateway);

    let code = manager
        .create_room(ALICE, "Alice".to_string(), 0)
        .expect("create");
    manager
        .join_room(&code, BOB, "Bob".to_string())
        .expect("join");
    manager.set_ready(BOB, true).expect("ready");
    manager.start_game(ALICE).expect("start");

    // The room's own tick task runs the countdown without manual stepping.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(manager.room_status(&code), Ok(RoomStatus::Playing));

    manager.stop_room(&code).expect("stop");
    manager.stop_room(&code).expect("stop again");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(manager.room_status(&code), Ok(RoomStatus::Ended));
}
