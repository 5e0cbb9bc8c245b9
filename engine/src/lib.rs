#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Per-player simulation engine for Outpost Defence.
//!
//! A [`GameState`] is the unit of simulation: one player's board, advanced by
//! [`advance`] in fixed time slices and mutated by discrete command
//! functions. Commands return explicit results and never panic across the
//! boundary; every externally observable consequence of a tick is also
//! appended to the caller's [`Event`] buffer so the room manager reacts to
//! discrete events rather than diffing counters between ticks.
//!
//! The per-tick pipeline order is load-bearing: spawning, movement,
//! targeting, firing, projectile resolution, status effects, support auras,
//! cleanup, then the wave-complete check. An enemy killed by a burn this
//! step was still a valid target earlier in the same step, so towers never
//! visibly fire at nothing.

use std::collections::BTreeMap;
use std::time::Duration;

use outpost_defence_core::{
    CellCoord, EnemyId, EnemyKind, Event, InjectError, OnHitEffect, PauseError, Phase,
    PlacementError, Position, ProjectileId, SellError, StatusEffect, TowerId, TowerKind,
    UpgradeError, WaveError, SELL_REFUND_DENOMINATOR, SELL_REFUND_NUMERATOR,
};
use outpost_defence_map::{cell_center, waves, MapBlueprint};

mod combat;
mod effects;
mod spawning;

pub use spawning::SpawnTracker;

/// Gold every board starts with.
pub const STARTING_GOLD: u32 = 500;
/// Lives every board starts with.
pub const STARTING_LIVES: u32 = 20;

/// Height at which flying enemies travel.
pub(crate) const FLYING_ALTITUDE: f32 = 1.5;
/// Height from which towers launch projectiles.
pub(crate) const MUZZLE_HEIGHT: f32 = 1.0;
/// Distance below which a projectile counts as having arrived.
pub(crate) const ARRIVAL_EPSILON: f32 = 0.25;
/// Smallest damage any successful hit deals, regardless of armor.
pub(crate) const MINIMUM_DAMAGE: f32 = 1.0;
/// Splash inside this radius deals full projectile damage.
pub(crate) const SPLASH_INNER_RADIUS: f32 = 0.8;
/// Damage fraction applied to splash victims outside the inner radius.
pub(crate) const SPLASH_FALLOFF: f32 = 0.5;
/// Maximum arc length between chain-lightning victims.
pub(crate) const CHAIN_RADIUS: f32 = 3.5;
/// Damage fraction retained by each successive chain jump.
pub(crate) const CHAIN_FALLOFF: f32 = 0.6;

#[derive(Clone, Debug)]
pub(crate) struct Tower {
    pub(crate) id: TowerId,
    pub(crate) kind: TowerKind,
    pub(crate) cell: CellCoord,
    pub(crate) level: u32,
    pub(crate) cooldown: Duration,
    pub(crate) target: Option<EnemyId>,
    pub(crate) kills: u32,
    pub(crate) damage_dealt: f32,
    pub(crate) invested: u32,
}

impl Tower {
    pub(crate) fn position(&self) -> Position {
        let mut center = cell_center(self.cell);
        center.y = MUZZLE_HEIGHT;
        center
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Enemy {
    pub(crate) id: EnemyId,
    pub(crate) kind: EnemyKind,
    pub(crate) health: f32,
    pub(crate) max_health: f32,
    pub(crate) armor: f32,
    pub(crate) base_speed: f32,
    pub(crate) position: Position,
    pub(crate) waypoint: usize,
    pub(crate) progress: f32,
    pub(crate) effects: Vec<StatusEffect>,
    pub(crate) flying: bool,
    pub(crate) dead: bool,
}

impl Enemy {
    pub(crate) fn materialize(
        id: EnemyId,
        kind: EnemyKind,
        spawn: Position,
        health_multiplier: f32,
        speed_multiplier: f32,
    ) -> Self {
        let mut position = spawn;
        if kind.is_flying() {
            position.y = FLYING_ALTITUDE;
        }
        let max_health = kind.max_health() * health_multiplier;
        Self {
            id,
            kind,
            health: max_health,
            max_health,
            armor: kind.armor(),
            base_speed: kind.speed() * speed_multiplier,
            position,
            waypoint: 0,
            progress: 0.0,
            effects: Vec::new(),
            flying: kind.is_flying(),
            dead: false,
        }
    }

    /// Applies or refreshes a status effect; one instance per kind.
    pub(crate) fn apply_effect(&mut self, effect: OnHitEffect, source: Option<TowerId>) {
        for existing in &mut self.effects {
            if existing.kind == effect.kind {
                existing.magnitude = effect.magnitude;
                existing.remaining = effect.duration;
                existing.source = source;
                return;
            }
        }
        self.effects.push(StatusEffect {
            kind: effect.kind,
            magnitude: effect.magnitude,
            remaining: effect.duration,
            source,
        });
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Projectile {
    pub(crate) id: ProjectileId,
    pub(crate) tower: TowerId,
    pub(crate) target: EnemyId,
    pub(crate) position: Position,
    pub(crate) damage: f32,
    pub(crate) speed: f32,
    pub(crate) aoe_radius: f32,
    pub(crate) effect: Option<OnHitEffect>,
    pub(crate) chain_jumps: u32,
    pub(crate) ignores_armor: bool,
}

/// One player's authoritative board state.
#[derive(Clone, Debug)]
pub struct GameState {
    map: MapBlueprint,
    phase: Phase,
    paused_from: Option<Phase>,
    gold: u32,
    lives: u32,
    score: u32,
    wave_number: u32,
    towers: BTreeMap<TowerId, Tower>,
    enemies: BTreeMap<EnemyId, Enemy>,
    projectiles: BTreeMap<ProjectileId, Projectile>,
    occupancy: Vec<Option<TowerId>>,
    tracker: Option<SpawnTracker>,
    next_tower_id: u32,
    next_enemy_id: u32,
    next_projectile_id: u32,
}

impl GameState {
    /// Creates a fresh board in build phase on the provided map.
    #[must_use]
    pub fn new(map: MapBlueprint) -> Self {
        let occupancy = vec![None; map.cell_count()];
        Self {
            map,
            phase: Phase::Build,
            paused_from: None,
            gold: STARTING_GOLD,
            lives: STARTING_LIVES,
            score: 0,
            wave_number: 0,
            towers: BTreeMap::new(),
            enemies: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            occupancy,
            tracker: None,
            next_tower_id: 0,
            next_enemy_id: 0,
            next_projectile_id: 0,
        }
    }

    fn allocate_enemy_id(&mut self) -> EnemyId {
        let id = EnemyId::new(self.next_enemy_id);
        self.next_enemy_id = self.next_enemy_id.wrapping_add(1);
        id
    }

    fn allocate_projectile_id(&mut self) -> ProjectileId {
        let id = ProjectileId::new(self.next_projectile_id);
        self.next_projectile_id = self.next_projectile_id.wrapping_add(1);
        id
    }

    fn set_phase(&mut self, phase: Phase, out_events: &mut Vec<Event>) {
        if self.phase != phase {
            self.phase = phase;
            out_events.push(Event::PhaseChanged { phase });
        }
    }

    pub(crate) fn spawn_enemy(
        &mut self,
        kind: EnemyKind,
        health_multiplier: f32,
        speed_multiplier: f32,
        out_events: &mut Vec<Event>,
    ) -> EnemyId {
        let id = self.allocate_enemy_id();
        let enemy = Enemy::materialize(
            id,
            kind,
            self.map.spawn_position(),
            health_multiplier,
            speed_multiplier,
        );
        let _ = self.enemies.insert(id, enemy);
        out_events.push(Event::EnemySpawned { enemy: id, kind });
        id
    }
}

/// Advances one board by a single time slice.
///
/// Only a board in wave phase simulates; build, paused, and terminal phases
/// ignore the call entirely.
pub fn advance(state: &mut GameState, dt: Duration, out_events: &mut Vec<Event>) {
    if state.phase != Phase::Wave {
        return;
    }

    spawning::run(state, dt, out_events);
    run_movement(state, dt, out_events);
    combat::run_targeting(state);
    combat::run_firing(state, dt);
    combat::run_projectiles(state, dt, out_events);
    effects::run_status_ticks(state, dt, out_events);
    effects::run_support_auras(state, dt);
    run_cleanup(state);
    run_wave_complete(state, out_events);
}

fn run_movement(state: &mut GameState, dt: Duration, out_events: &mut Vec<Event>) {
    let waypoints: Vec<Position> = state.map.waypoints().to_vec();
    if waypoints.len() < 2 {
        return;
    }

    let mut breaches: Vec<EnemyId> = Vec::new();
    for enemy in state.enemies.values_mut() {
        if enemy.dead {
            continue;
        }

        let speed = effects::effective_speed(enemy);
        if speed <= 0.0 {
            continue;
        }

        let mut travelled = speed * dt.as_secs_f32();
        while travelled > 0.0 {
            let Some(segment_end) = waypoints.get(enemy.waypoint + 1) else {
                break;
            };
            let segment_start = waypoints[enemy.waypoint];
            let segment_length = segment_start.distance_to(*segment_end).max(f32::EPSILON);
            let remaining = (1.0 - enemy.progress) * segment_length;

            if travelled < remaining {
                enemy.progress += travelled / segment_length;
                travelled = 0.0;
            } else {
                travelled -= remaining;
                enemy.waypoint += 1;
                enemy.progress = 0.0;
                if enemy.waypoint + 1 >= waypoints.len() {
                    breaches.push(enemy.id);
                    break;
                }
            }
        }

        let segment_start = waypoints[enemy.waypoint.min(waypoints.len() - 1)];
        let segment_end = waypoints[(enemy.waypoint + 1).min(waypoints.len() - 1)];
        let mut position = segment_start.lerp(segment_end, enemy.progress);
        if enemy.flying {
            position.y = FLYING_ALTITUDE;
        }
        enemy.position = position;
    }

    for id in breaches {
        if let Some(enemy) = state.enemies.get_mut(&id) {
            enemy.dead = true;
        }
        state.lives = state.lives.saturating_sub(1);
        out_events.push(Event::LifeLost {
            enemy: id,
            lives_remaining: state.lives,
        });
    }
}

fn run_cleanup(state: &mut GameState) {
    state.enemies.retain(|_, enemy| !enemy.dead);
    let enemies = &state.enemies;
    state
        .projectiles
        .retain(|_, projectile| enemies.contains_key(&projectile.target));
}

fn run_wave_complete(state: &mut GameState, out_events: &mut Vec<Event>) {
    if state.lives == 0 {
        state.tracker = None;
        state.set_phase(Phase::Lost, out_events);
        return;
    }

    let exhausted = state
        .tracker
        .as_ref()
        .map_or(true, SpawnTracker::is_exhausted);
    if !exhausted || !state.enemies.is_empty() {
        return;
    }

    if state.tracker.take().is_some() {
        if let Some(wave) = waves::wave(state.wave_number) {
            state.gold = state.gold.saturating_add(wave.reward_gold);
            state.score = state.score.saturating_add(wave.reward_score);
            out_events.push(Event::WaveCompleted {
                wave: wave.number,
                reward: wave.reward_gold,
            });
        }
    }

    if state.wave_number >= waves::FINAL_WAVE {
        state.set_phase(Phase::Won, out_events);
    } else {
        state.set_phase(Phase::Build, out_events);
    }
}

/// Places a tower of the provided kind on a buildable cell.
pub fn place_tower(
    state: &mut GameState,
    kind: TowerKind,
    cell: CellCoord,
) -> Result<TowerId, PlacementError> {
    if !matches!(state.phase, Phase::Build | Phase::Wave) {
        return Err(PlacementError::InvalidPhase);
    }
    let Some(index) = state.map.index(cell) else {
        return Err(PlacementError::OutOfBounds);
    };
    if !state.map.is_buildable(cell) {
        return Err(PlacementError::NotBuildable);
    }
    if state.occupancy[index].is_some() {
        return Err(PlacementError::Occupied);
    }
    let cost = kind.cost();
    if state.gold < cost {
        return Err(PlacementError::InsufficientGold);
    }

    state.gold -= cost;
    let id = TowerId::new(state.next_tower_id);
    state.next_tower_id = state.next_tower_id.wrapping_add(1);
    state.occupancy[index] = Some(id);
    let _ = state.towers.insert(
        id,
        Tower {
            id,
            kind,
            cell,
            level: 1,
            cooldown: Duration::ZERO,
            target: None,
            kills: 0,
            damage_dealt: 0.0,
            invested: cost,
        },
    );
    Ok(id)
}

/// Sells a tower, refunding part of its cumulative spend and freeing its
/// cell. Returns the refund amount.
pub fn sell_tower(state: &mut GameState, tower: TowerId) -> Result<u32, SellError> {
    if !matches!(state.phase, Phase::Build | Phase::Wave) {
        return Err(SellError::InvalidPhase);
    }
    let Some(removed) = state.towers.remove(&tower) else {
        return Err(SellError::MissingTower);
    };

    let refund = removed.invested * SELL_REFUND_NUMERATOR / SELL_REFUND_DENOMINATOR;
    state.gold = state.gold.saturating_add(refund);
    if let Some(index) = state.map.index(removed.cell) {
        state.occupancy[index] = None;
    }
    Ok(refund)
}

/// Upgrades a tower one level. Returns the new level.
pub fn upgrade_tower(state: &mut GameState, tower: TowerId) -> Result<u32, UpgradeError> {
    if !matches!(state.phase, Phase::Build | Phase::Wave) {
        return Err(UpgradeError::InvalidPhase);
    }
    let Some(entry) = state.towers.get_mut(&tower) else {
        return Err(UpgradeError::MissingTower);
    };
    if entry.level >= entry.kind.max_level() {
        return Err(UpgradeError::LevelMaxed);
    }
    let cost = entry.kind.upgrade_cost(entry.level);
    if state.gold < cost {
        return Err(UpgradeError::InsufficientGold);
    }

    state.gold -= cost;
    entry.level += 1;
    entry.invested = entry.invested.saturating_add(cost);
    Ok(entry.level)
}

/// Starts the next configured wave. Returns the wave number started.
pub fn start_wave(state: &mut GameState, out_events: &mut Vec<Event>) -> Result<u32, WaveError> {
    match state.phase {
        Phase::Build => {}
        Phase::Wave => return Err(WaveError::WaveActive),
        _ => return Err(WaveError::InvalidPhase),
    }

    let next = state.wave_number + 1;
    let Some(wave) = waves::wave(next) else {
        return Err(WaveError::WavesExhausted);
    };

    state.wave_number = next;
    state.tracker = Some(SpawnTracker::new(&wave));
    out_events.push(Event::WaveStarted { wave: next });
    state.set_phase(Phase::Wave, out_events);
    Ok(next)
}

/// Suspends simulation, remembering the phase to resume into.
pub fn pause(state: &mut GameState) -> Result<(), PauseError> {
    if !matches!(state.phase, Phase::Build | Phase::Wave) {
        return Err(PauseError::InvalidPhase);
    }
    state.paused_from = Some(state.phase);
    state.phase = Phase::Paused;
    Ok(())
}

/// Returns a paused board to the phase it paused from.
pub fn resume(state: &mut GameState) -> Result<(), PauseError> {
    if state.phase != Phase::Paused {
        return Err(PauseError::InvalidPhase);
    }
    state.phase = state.paused_from.take().unwrap_or(Phase::Build);
    Ok(())
}

/// Materializes a hostile enemy at this board's spawn point, bypassing the
/// wave tracker. Used by the room manager for cross-player attacks. A board
/// sitting in build phase flips into wave phase so the arrival simulates.
pub fn inject_enemy(
    state: &mut GameState,
    kind: EnemyKind,
    health_multiplier: f32,
    out_events: &mut Vec<Event>,
) -> Result<EnemyId, InjectError> {
    match state.phase {
        Phase::Wave => {}
        Phase::Build => state.set_phase(Phase::Wave, out_events),
        _ => return Err(InjectError::InvalidPhase),
    }
    Ok(state.spawn_enemy(kind, health_multiplier, 1.0, out_events))
}

/// Query functions that provide read-only access to one board's state.
pub mod query {
    use super::{GameState, SpawnTracker};
    use outpost_defence_core::{
        CellCoord, EnemyId, EnemyKind, Phase, Position, ProjectileId, StatusKind, TowerId,
        TowerKind,
    };
    use serde::{Deserialize, Serialize};

    /// Current lifecycle phase of the board.
    #[must_use]
    pub fn phase(state: &GameState) -> Phase {
        state.phase
    }

    /// Gold currently held by the player.
    #[must_use]
    pub fn gold(state: &GameState) -> u32 {
        state.gold
    }

    /// Lives remaining before the board is lost.
    #[must_use]
    pub fn lives(state: &GameState) -> u32 {
        state.lives
    }

    /// Score accumulated so far.
    #[must_use]
    pub fn score(state: &GameState) -> u32 {
        state.score
    }

    /// Number of the most recently started wave; zero before the first.
    #[must_use]
    pub fn wave_number(state: &GameState) -> u32 {
        state.wave_number
    }

    /// Number of enemies currently alive on the board.
    #[must_use]
    pub fn enemy_count(state: &GameState) -> usize {
        state.enemies.values().filter(|enemy| !enemy.dead).count()
    }

    /// The spawn tracker for the active wave, if one is running.
    #[must_use]
    pub fn spawn_tracker(state: &GameState) -> Option<&SpawnTracker> {
        state.tracker.as_ref()
    }

    /// Reports whether a tower occupies the provided cell.
    #[must_use]
    pub fn cell_occupied(state: &GameState, cell: CellCoord) -> bool {
        state
            .map
            .index(cell)
            .is_some_and(|index| state.occupancy[index].is_some())
    }

    /// Cumulative kills credited to a tower, if it exists.
    #[must_use]
    pub fn tower_kills(state: &GameState, tower: TowerId) -> Option<u32> {
        state.towers.get(&tower).map(|entry| entry.kills)
    }

    /// Captures the serializable snapshot broadcast to spectators.
    #[must_use]
    pub fn snapshot(state: &GameState) -> BoardSnapshot {
        BoardSnapshot {
            phase: state.phase,
            gold: state.gold,
            lives: state.lives,
            score: state.score,
            wave: state.wave_number,
            towers: state
                .towers
                .values()
                .map(|tower| TowerSnapshot {
                    id: tower.id,
                    kind: tower.kind,
                    cell: tower.cell,
                    level: tower.level,
                    kills: tower.kills,
                    damage_dealt: tower.damage_dealt,
                })
                .collect(),
            enemies: state
                .enemies
                .values()
                .filter(|enemy| !enemy.dead)
                .map(|enemy| EnemySnapshot {
                    id: enemy.id,
                    kind: enemy.kind,
                    health: enemy.health,
                    max_health: enemy.max_health,
                    position: enemy.position,
                    flying: enemy.flying,
                    statuses: enemy.effects.iter().map(|effect| effect.kind).collect(),
                })
                .collect(),
            projectiles: state
                .projectiles
                .values()
                .map(|projectile| ProjectileSnapshot {
                    id: projectile.id,
                    position: projectile.position,
                    target: projectile.target,
                })
                .collect(),
        }
    }

    /// Immutable representation of a single tower used for broadcast.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct TowerSnapshot {
        /// Identifier allocated by the board.
        pub id: TowerId,
        /// Kind of tower constructed.
        pub kind: TowerKind,
        /// Cell occupied by the tower.
        pub cell: CellCoord,
        /// Current upgrade level.
        pub level: u32,
        /// Cumulative kills credited to the tower.
        pub kills: u32,
        /// Cumulative damage credited to the tower.
        pub damage_dealt: f32,
    }

    /// Immutable representation of a single enemy used for broadcast.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct EnemySnapshot {
        /// Identifier allocated by the board.
        pub id: EnemyId,
        /// Kind of enemy.
        pub kind: EnemyKind,
        /// Current health.
        pub health: f32,
        /// Health the enemy spawned with.
        pub max_health: f32,
        /// World position.
        pub position: Position,
        /// Whether the enemy travels above the board.
        pub flying: bool,
        /// Kinds of status effects currently active.
        pub statuses: Vec<StatusKind>,
    }

    /// Immutable representation of an in-flight projectile used for
    /// broadcast.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct ProjectileSnapshot {
        /// Identifier allocated by the board.
        pub id: ProjectileId,
        /// World position.
        pub position: Position,
        /// Enemy the projectile homes toward.
        pub target: EnemyId,
    }

    /// Full serializable view of one board.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct BoardSnapshot {
        /// Current lifecycle phase.
        pub phase: Phase,
        /// Gold held by the player.
        pub gold: u32,
        /// Lives remaining.
        pub lives: u32,
        /// Score accumulated.
        pub score: u32,
        /// Most recently started wave number.
        pub wave: u32,
        /// All towers on the board.
        pub towers: Vec<TowerSnapshot>,
        /// All living enemies on the board.
        pub enemies: Vec<EnemySnapshot>,
        /// All in-flight projectiles.
        pub projectiles: Vec<ProjectileSnapshot>,
    }
}
