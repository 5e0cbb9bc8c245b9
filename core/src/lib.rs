#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Outpost Defence engine.
//!
//! This crate defines the vocabulary that connects the map catalog, the
//! per-player simulation engine, and the multiplayer room manager: entity
//! identifiers, tower and enemy kind tables, status effects, command error
//! enums, and the tagged [`Event`] log the engine emits alongside every tick.
//! Commands never signal failure by panicking; each rejection is a dedicated
//! error variant so callers can always produce a response.

use std::time::Duration;

use serde::{Deserialize, Serialize};

mod kinds;

pub use kinds::{
    EnemyKind, OnHitEffect, TowerKind, SELL_REFUND_DENOMINATOR, SELL_REFUND_NUMERATOR,
};

/// Unique identifier assigned to a tower within one player's board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TowerId(u32);

impl TowerId {
    /// Creates a new tower identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to an enemy within one player's board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnemyId(u32);

impl EnemyId {
    /// Creates a new enemy identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to an in-flight projectile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectileId(u32);

impl ProjectileId {
    /// Creates a new projectile identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier a connected player carries across every room command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(u64);

impl PlayerId {
    /// Creates a new player identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }
}

/// Point in world space. Boards lie in the XZ plane; Y is height and only
/// flying enemies leave the ground.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// East-west world coordinate.
    pub x: f32,
    /// Height above the board plane.
    pub y: f32,
    /// North-south world coordinate.
    pub z: f32,
}

impl Position {
    /// Creates a new position from explicit components.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position.
    #[must_use]
    pub fn distance_to(&self, other: Position) -> f32 {
        self.distance_sq(other).sqrt()
    }

    /// Squared Euclidean distance, cheaper when only comparing.
    #[must_use]
    pub fn distance_sq(&self, other: Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Linear interpolation between two positions.
    #[must_use]
    pub fn lerp(&self, other: Position, t: f32) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }

    /// Moves this position toward a destination by at most `step` units.
    ///
    /// Returns the new position and whether the destination was reached.
    #[must_use]
    pub fn step_toward(&self, destination: Position, step: f32) -> (Self, bool) {
        let remaining = self.distance_to(destination);
        if remaining <= step {
            return (destination, true);
        }
        (self.lerp(destination, step / remaining), false)
    }
}

/// Lifecycle phase of a single player's board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Interlude between waves; towers may be managed, nothing moves.
    Build,
    /// A wave is active and the tick pipeline runs in full.
    Wave,
    /// Simulation suspended; resuming returns to the prior phase.
    Paused,
    /// Every configured wave was cleared. Terminal.
    Won,
    /// Lives reached zero. Terminal.
    Lost,
}

impl Phase {
    /// Reports whether this phase accepts no further simulation.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

/// Kind of timed modifier an enemy can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    /// Multiplies movement speed down by the magnitude fraction.
    Slow,
    /// Deals magnitude damage per second.
    Burn,
    /// Zeroes movement speed entirely; magnitude unused.
    Stun,
    /// Deals magnitude damage per second.
    Poison,
    /// Multiplies incoming final damage by the magnitude factor.
    Amplify,
}

/// Timed modifier attached to an enemy. A reapplied kind refreshes the
/// existing instance instead of stacking a second copy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusEffect {
    /// Kind of modifier.
    pub kind: StatusKind,
    /// Kind-specific strength: speed fraction removed, damage per second,
    /// or damage multiplier.
    pub magnitude: f32,
    /// Time left before the effect is pruned.
    pub remaining: Duration,
    /// Tower that applied the effect, credited for damage-over-time kills.
    pub source: Option<TowerId>,
}

/// Reasons a tower placement request is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementError {
    /// The board is paused or in a terminal phase.
    InvalidPhase,
    /// The requested cell lies outside the map grid.
    OutOfBounds,
    /// The requested cell is path, scenery, spawn, or base terrain.
    NotBuildable,
    /// Another tower already occupies the cell.
    Occupied,
    /// The player cannot afford the tower's cost.
    InsufficientGold,
}

/// Reasons a tower sale request is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SellError {
    /// The board is paused or in a terminal phase.
    InvalidPhase,
    /// No tower with the provided identifier exists.
    MissingTower,
}

/// Reasons a tower upgrade request is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpgradeError {
    /// The board is paused or in a terminal phase.
    InvalidPhase,
    /// No tower with the provided identifier exists.
    MissingTower,
    /// The tower already reached its kind's maximum level.
    LevelMaxed,
    /// The player cannot afford the upgrade cost.
    InsufficientGold,
}

/// Reasons a wave start request is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaveError {
    /// The board is not in build phase.
    InvalidPhase,
    /// A wave is already in progress.
    WaveActive,
    /// Every configured wave was already cleared.
    WavesExhausted,
}

/// Reasons a pause or resume request is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PauseError {
    /// The board is in a terminal phase, or not paused when resuming.
    InvalidPhase,
}

/// Reasons an externally sent enemy cannot materialize on a board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InjectError {
    /// The board is paused or in a terminal phase.
    InvalidPhase,
}

/// Discrete consequences of one simulation step, emitted in the order they
/// occurred. The room manager consumes these instead of diffing counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// A wave began on this board.
    WaveStarted {
        /// One-based wave number that started.
        wave: u32,
    },
    /// An enemy materialized at the spawn point.
    EnemySpawned {
        /// Identifier assigned to the enemy.
        enemy: EnemyId,
        /// Kind of enemy that spawned.
        kind: EnemyKind,
    },
    /// An enemy's health reached zero.
    EnemyKilled {
        /// Identifier of the dead enemy.
        enemy: EnemyId,
        /// Kind of enemy that died.
        kind: EnemyKind,
        /// Tower credited with the kill, if damage was attributable.
        killer: Option<TowerId>,
        /// Gold awarded for the kill.
        bounty: u32,
    },
    /// An enemy breached the base and cost a life.
    LifeLost {
        /// Identifier of the breaching enemy.
        enemy: EnemyId,
        /// Lives left after the breach.
        lives_remaining: u32,
    },
    /// The active wave finished and its reward was paid.
    WaveCompleted {
        /// One-based wave number that completed.
        wave: u32,
        /// Gold paid out for clearing the wave.
        reward: u32,
    },
    /// The board transitioned into a new phase.
    PhaseChanged {
        /// Phase that became active.
        phase: Phase,
    },
}

#[cfg(test)]
mod tests {
    use super::{
        CellCoord, EnemyId, Phase, PlacementError, PlayerId, Position, SellError, TowerId,
        UpgradeError, WaveError,
    };
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn identifiers_round_trip_through_bincode() {
        assert_round_trip(&TowerId::new(42));
        assert_round_trip(&EnemyId::new(7));
        assert_round_trip(&PlayerId::new(0xdead_beef));
    }

    #[test]
    fn command_errors_round_trip_through_bincode() {
        assert_round_trip(&PlacementError::Occupied);
        assert_round_trip(&SellError::MissingTower);
        assert_round_trip(&UpgradeError::LevelMaxed);
        assert_round_trip(&WaveError::WaveActive);
    }

    #[test]
    fn cell_coord_round_trips_through_bincode() {
        assert_round_trip(&CellCoord::new(5, 7));
    }

    #[test]
    fn step_toward_clamps_at_destination() {
        let origin = Position::new(0.0, 0.0, 0.0);
        let destination = Position::new(3.0, 0.0, 4.0);

        let (midway, arrived) = origin.step_toward(destination, 2.5);
        assert!(!arrived);
        assert!((midway.distance_to(origin) - 2.5).abs() < 1e-4);

        let (end, arrived) = midway.step_toward(destination, 10.0);
        assert!(arrived);
        assert_eq!(end, destination);
    }

    #[test]
    fn terminal_phases_are_flagged() {
        assert!(Phase::Won.is_terminal());
        assert!(Phase::Lost.is_terminal());
        assert!(!Phase::Build.is_terminal());
        assert!(!Phase::Wave.is_terminal());
        assert!(!Phase::Paused.is_terminal());
    }
}
