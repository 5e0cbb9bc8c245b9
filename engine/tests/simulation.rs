use std::time::Duration;

use outpost_defence_core::{
    CellCoord, EnemyKind, Event, Phase, PlacementError, SellError, TowerKind, UpgradeError,
};
use outpost_defence_engine::{
    advance, inject_enemy, pause, place_tower, query, resume, sell_tower, start_wave,
    upgrade_tower, GameState, STARTING_GOLD, STARTING_LIVES,
};
use outpost_defence_map::{blueprint, waves};

const TICK: Duration = Duration::from_millis(50);

fn fresh_state() -> GameState {
    GameState::new(blueprint(0).expect("catalog map"))
}

/// Advances until the board leaves wave phase, asserting along the way that
/// build phase is never reported while enemies remain alive.
fn run_wave_to_completion(state: &mut GameState, events: &mut Vec<Event>) {
    for _ in 0..20_000 {
        advance(state, TICK, events);
        if query::enemy_count(state) > 0 {
            assert_ne!(query::phase(state), Phase::Build);
        }
        if query::phase(state) != Phase::Wave {
            return;
        }
    }
    panic!("wave did not complete within the tick budget");
}

#[test]
fn placement_consumes_gold_and_occupies_the_cell() {
    let mut state = fresh_state();
    let cell = CellCoord::new(1, 4);

    let tower = place_tower(&mut state, TowerKind::Archer, cell).expect("placement");
    assert_eq!(query::gold(&state), STARTING_GOLD - TowerKind::Archer.cost());
    assert!(query::cell_occupied(&state, cell));
    assert_eq!(query::tower_kills(&state, tower), Some(0));

    // Same cell again is rejected without touching gold.
    let gold = query::gold(&state);
    assert_eq!(
        place_tower(&mut state, TowerKind::Frost, cell),
        Err(PlacementError::Occupied)
    );
    assert_eq!(query::gold(&state), gold);
}

#[test]
fn placement_rejects_path_and_out_of_bounds_cells() {
    let mut state = fresh_state();
    assert_eq!(
        place_tower(&mut state, TowerKind::Archer, CellCoord::new(2, 5)),
        Err(PlacementError::NotBuildable)
    );
    assert_eq!(
        place_tower(&mut state, TowerKind::Archer, CellCoord::new(99, 99)),
        Err(PlacementError::OutOfBounds)
    );
    assert_eq!(query::gold(&state), STARTING_GOLD);
}

#[test]
fn placement_rejects_unaffordable_towers() {
    let mut state = fresh_state();
    // 500 gold buys exactly two 200-cost snipers.
    assert!(place_tower(&mut state, TowerKind::Sniper, CellCoord::new(1, 1)).is_ok());
    assert!(place_tower(&mut state, TowerKind::Sniper, CellCoord::new(2, 1)).is_ok());
    assert_eq!(
        place_tower(&mut state, TowerKind::Sniper, CellCoord::new(3, 1)),
        Err(PlacementError::InsufficientGold)
    );
    assert_eq!(query::gold(&state), 100);
}

#[test]
fn selling_refunds_seventy_percent_of_cumulative_spend() {
    let mut state = fresh_state();
    let cell = CellCoord::new(1, 4);
    let tower = place_tower(&mut state, TowerKind::Archer, cell).expect("placement");
    let level = upgrade_tower(&mut state, tower).expect("upgrade");
    assert_eq!(level, 2);

    let invested = TowerKind::Archer.cost() + TowerKind::Archer.upgrade_cost(1);
    let refund = sell_tower(&mut state, tower).expect("sale");
    assert_eq!(refund, invested * 7 / 10);
    assert!(refund < invested);
    assert!(!query::cell_occupied(&state, cell));
    assert_eq!(query::gold(&state), STARTING_GOLD - invested + refund);

    assert_eq!(sell_tower(&mut state, tower), Err(SellError::MissingTower));
}

#[test]
fn upgrades_stop_at_the_kind_maximum() {
    let mut state = fresh_state();
    let tower = place_tower(&mut state, TowerKind::Archer, CellCoord::new(1, 4)).expect("placement");

    assert_eq!(upgrade_tower(&mut state, tower), Ok(2));
    assert_eq!(upgrade_tower(&mut state, tower), Ok(3));
    assert_eq!(
        upgrade_tower(&mut state, tower),
        Err(UpgradeError::LevelMaxed)
    );
}

#[test]
fn first_wave_spawns_eight_basics_and_pays_the_reward() {
    let mut state = fresh_state();
    let mut events = Vec::new();

    for cell in [(1u32, 4u32), (3, 4), (2, 6), (4, 6)] {
        let _ = place_tower(&mut state, TowerKind::Archer, CellCoord::new(cell.0, cell.1))
            .expect("placement");
    }
    let gold_before_wave = query::gold(&state);

    assert_eq!(start_wave(&mut state, &mut events), Ok(1));
    assert_eq!(query::phase(&state), Phase::Wave);
    run_wave_to_completion(&mut state, &mut events);

    assert_eq!(query::phase(&state), Phase::Build);
    let spawned = events
        .iter()
        .filter(|event| matches!(event, Event::EnemySpawned { .. }))
        .count();
    assert_eq!(spawned, 8);

    let reward = waves::wave(1).expect("wave one").reward_gold;
    assert!(query::gold(&state) >= gold_before_wave + reward);
    assert!(events
        .iter()
        .any(|event| matches!(event, Event::WaveCompleted { wave: 1, .. })));
}

#[test]
fn starting_a_wave_twice_is_rejected() {
    let mut state = fresh_state();
    let mut events = Vec::new();
    assert_eq!(start_wave(&mut state, &mut events), Ok(1));
    assert!(start_wave(&mut state, &mut events).is_err());
}

#[test]
fn undefended_enemies_breach_and_cost_lives() {
    let mut state = fresh_state();
    let mut events = Vec::new();

    assert_eq!(start_wave(&mut state, &mut events), Ok(1));
    run_wave_to_completion(&mut state, &mut events);

    assert_eq!(query::phase(&state), Phase::Build);
    assert_eq!(query::lives(&state), STARTING_LIVES - 8);
    let breaches = events
        .iter()
        .filter(|event| matches!(event, Event::LifeLost { .. }))
        .count();
    assert_eq!(breaches, 8);
}

#[test]
fn exhausted_lives_end_the_board_in_defeat() {
    let mut state = fresh_state();
    let mut events = Vec::new();

    // No towers: every spawned enemy breaches until lives run dry.
    for _ in 0..10 {
        if query::phase(&state) == Phase::Build {
            let _ = start_wave(&mut state, &mut events).expect("next wave");
        }
        run_wave_to_completion(&mut state, &mut events);
        if query::phase(&state) == Phase::Lost {
            break;
        }
    }

    assert_eq!(query::phase(&state), Phase::Lost);
    assert_eq!(query::lives(&state), 0);
    assert!(events
        .iter()
        .any(|event| matches!(event, Event::PhaseChanged { phase: Phase::Lost })));

    // Terminal boards ignore both ticks and commands.
    advance(&mut state, TICK, &mut events);
    assert_eq!(query::phase(&state), Phase::Lost);
    assert!(start_wave(&mut state, &mut events).is_err());
    assert!(place_tower(&mut state, TowerKind::Archer, CellCoord::new(1, 4)).is_err());
}

#[test]
fn paused_boards_freeze_until_resumed() {
    let mut state = fresh_state();
    let mut events = Vec::new();

    assert_eq!(start_wave(&mut state, &mut events), Ok(1));
    advance(&mut state, Duration::from_secs(2), &mut events);
    let alive_before = query::enemy_count(&state);
    assert!(alive_before > 0);

    pause(&mut state).expect("pause");
    assert_eq!(query::phase(&state), Phase::Paused);
    for _ in 0..100 {
        advance(&mut state, TICK, &mut events);
    }
    assert_eq!(query::enemy_count(&state), alive_before);

    resume(&mut state).expect("resume");
    assert_eq!(query::phase(&state), Phase::Wave);
}

#[test]
fn injected_enemies_bypass_the_tracker_and_flip_build_boards() {
    let mut state = fresh_state();
    let mut events = Vec::new();
    let gold_before = query::gold(&state);

    let injected =
        inject_enemy(&mut state, EnemyKind::Fast, 1.25, &mut events).expect("injection");
    assert_eq!(query::phase(&state), Phase::Wave);
    assert_eq!(query::enemy_count(&state), 1);
    assert!(query::spawn_tracker(&state).is_none());
    assert!(events
        .iter()
        .any(|event| matches!(event, Event::EnemySpawned { enemy, .. } if *enemy == injected)));

    let snapshot = query::snapshot(&state);
    let enemy = &snapshot.enemies[0];
    assert_eq!(enemy.kind, EnemyKind::Fast);
    assert!((enemy.max_health - EnemyKind::Fast.max_health() * 1.25).abs() < 1e-4);

    // With no defenses the enemy breaches; the board settles back into build
    // phase without paying any wave reward.
    run_wave_to_completion(&mut state, &mut events);
    assert_eq!(query::phase(&state), Phase::Build);
    assert_eq!(query::lives(&state), STARTING_LIVES - 1);
    assert_eq!(query::gold(&state), gold_before);
}

#[test]
fn minimum_damage_floor_defeats_heavy_armor() {
    let mut state = fresh_state();
    let mut events = Vec::new();

    // Hex hits for 5 against boss armor 6; only the damage floor lets the
    // kill land before the boss walks the full route.
    let _ = place_tower(&mut state, TowerKind::Hex, CellCoord::new(1, 4)).expect("placement");
    let boss = inject_enemy(&mut state, EnemyKind::Boss, 0.01, &mut events).expect("injection");

    run_wave_to_completion(&mut state, &mut events);
    assert!(events
        .iter()
        .any(|event| matches!(event, Event::EnemyKilled { enemy, .. } if *enemy == boss)));
    assert_eq!(query::lives(&state), STARTING_LIVES);
}

#[test]
fn snapshots_serialize_for_broadcast() {
    let mut state = fresh_state();
    let mut events = Vec::new();
    let _ = place_tower(&mut state, TowerKind::Tesla, CellCoord::new(2, 6)).expect("placement");
    let _ = start_wave(&mut state, &mut events).expect("wave");
    advance(&mut state, Duration::from_secs(1), &mut events);

    let snapshot = query::snapshot(&state);
    let encoded = serde_json::to_string(&snapshot).expect("encode");
    let decoded: query::BoardSnapshot = serde_json::from_str(&encoded).expect("decode");
    assert_eq!(decoded, snapshot);
}
