//! Tower and enemy kind tables.
//!
//! All balance numbers live here so the engine and the room manager share a
//! single source of truth. Ranges, radii, and speeds are expressed in world
//! units; rates are per second.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::StatusKind;

/// Fraction of cumulative tower spend refunded on sale.
pub const SELL_REFUND_NUMERATOR: u32 = 7;
/// Denominator of the sell refund fraction.
pub const SELL_REFUND_DENOMINATOR: u32 = 10;

/// Types of towers that can be constructed on a board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TowerKind {
    /// Cheap single-target tower; hits ground and air.
    Archer,
    /// Slow area-of-effect tower; cannot track flying enemies.
    Cannon,
    /// Applies a movement slow on hit.
    Frost,
    /// Applies a burning damage-over-time on hit.
    Flame,
    /// Long-range shot that ignores armor entirely.
    Sniper,
    /// Hit chains to up to two additional nearby enemies.
    Tesla,
    /// Applies a damage-amplification mark on hit.
    Hex,
}

/// Status payload a projectile applies when it connects.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OnHitEffect {
    /// Kind of status applied to the struck enemy.
    pub kind: StatusKind,
    /// Kind-specific strength.
    pub magnitude: f32,
    /// How long the status persists.
    pub duration: Duration,
}

impl TowerKind {
    /// Every constructible tower kind, in display order.
    pub const ALL: [TowerKind; 7] = [
        Self::Archer,
        Self::Cannon,
        Self::Frost,
        Self::Flame,
        Self::Sniper,
        Self::Tesla,
        Self::Hex,
    ];

    /// Gold consumed by placing this tower.
    #[must_use]
    pub const fn cost(self) -> u32 {
        match self {
            Self::Archer => 100,
            Self::Cannon => 150,
            Self::Frost => 120,
            Self::Flame => 140,
            Self::Sniper => 200,
            Self::Tesla => 180,
            Self::Hex => 160,
        }
    }

    /// Highest upgrade level reachable for this kind.
    #[must_use]
    pub const fn max_level(self) -> u32 {
        match self {
            Self::Sniper => 2,
            _ => 3,
        }
    }

    /// Gold consumed by upgrading from `level` to `level + 1`.
    #[must_use]
    pub const fn upgrade_cost(self, level: u32) -> u32 {
        self.cost() / 2 * level
    }

    /// Targeting radius in world units.
    #[must_use]
    pub const fn range(self) -> f32 {
        match self {
            Self::Archer => 7.0,
            Self::Cannon => 6.0,
            Self::Frost => 6.5,
            Self::Flame => 5.5,
            Self::Sniper => 11.0,
            Self::Tesla => 6.0,
            Self::Hex => 6.5,
        }
    }

    /// Projectile damage before level scaling.
    #[must_use]
    pub const fn base_damage(self) -> f32 {
        match self {
            Self::Archer => 12.0,
            Self::Cannon => 26.0,
            Self::Frost => 6.0,
            Self::Flame => 8.0,
            Self::Sniper => 40.0,
            Self::Tesla => 14.0,
            Self::Hex => 5.0,
        }
    }

    /// Projectile damage at the provided level; each level past the first
    /// adds half the base again.
    #[must_use]
    pub fn damage(self, level: u32) -> f32 {
        self.base_damage() * (1.0 + 0.5 * level.saturating_sub(1) as f32)
    }

    /// Shots per second before level scaling.
    #[must_use]
    pub const fn base_fire_rate(self) -> f32 {
        match self {
            Self::Archer => 1.2,
            Self::Cannon => 0.5,
            Self::Frost => 0.8,
            Self::Flame => 1.0,
            Self::Sniper => 0.35,
            Self::Tesla => 0.9,
            Self::Hex => 0.7,
        }
    }

    /// Shots per second at the provided level; the rate scales mildly so
    /// upgrades favor damage over cadence.
    #[must_use]
    pub fn fire_rate(self, level: u32) -> f32 {
        self.base_fire_rate() * (1.0 + 0.15 * level.saturating_sub(1) as f32)
    }

    /// Flight speed of this tower's projectiles in world units per second.
    #[must_use]
    pub const fn projectile_speed(self) -> f32 {
        match self {
            Self::Archer => 14.0,
            Self::Cannon => 9.0,
            Self::Frost => 12.0,
            Self::Flame => 12.0,
            Self::Sniper => 22.0,
            Self::Tesla => 16.0,
            Self::Hex => 12.0,
        }
    }

    /// Splash radius applied on impact; zero means single target.
    #[must_use]
    pub const fn aoe_radius(self) -> f32 {
        match self {
            Self::Cannon => 2.2,
            _ => 0.0,
        }
    }

    /// Whether this kind can target flying enemies.
    #[must_use]
    pub const fn hits_flying(self) -> bool {
        !matches!(self, Self::Cannon)
    }

    /// Whether this kind's damage bypasses armor.
    #[must_use]
    pub const fn ignores_armor(self) -> bool {
        matches!(self, Self::Sniper)
    }

    /// Number of additional enemies a hit arcs to.
    #[must_use]
    pub const fn chain_jumps(self) -> u32 {
        match self {
            Self::Tesla => 2,
            _ => 0,
        }
    }

    /// Status payload applied on impact, if this kind carries one.
    #[must_use]
    pub fn on_hit(self) -> Option<OnHitEffect> {
        match self {
            Self::Frost => Some(OnHitEffect {
                kind: StatusKind::Slow,
                magnitude: 0.45,
                duration: Duration::from_millis(2000),
            }),
            Self::Flame => Some(OnHitEffect {
                kind: StatusKind::Burn,
                magnitude: 6.0,
                duration: Duration::from_millis(3000),
            }),
            Self::Hex => Some(OnHitEffect {
                kind: StatusKind::Amplify,
                magnitude: 1.35,
                duration: Duration::from_millis(2500),
            }),
            _ => None,
        }
    }
}

/// Types of enemies that walk or fly the path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EnemyKind {
    /// Baseline ground walker.
    Basic,
    /// Fragile but quick.
    Fast,
    /// Armored and slow.
    Tank,
    /// Airborne; ignored by towers that cannot track the air.
    Flying,
    /// Restores health to nearby enemies while alive.
    Healer,
    /// Heavily armored wave anchor; towers prioritize it.
    Boss,
}

impl EnemyKind {
    /// Every spawnable enemy kind.
    pub const ALL: [EnemyKind; 6] = [
        Self::Basic,
        Self::Fast,
        Self::Tank,
        Self::Flying,
        Self::Healer,
        Self::Boss,
    ];

    /// Health pool before wave or send multipliers.
    #[must_use]
    pub const fn max_health(self) -> f32 {
        match self {
            Self::Basic => 30.0,
            Self::Fast => 20.0,
            Self::Tank => 90.0,
            Self::Flying => 26.0,
            Self::Healer => 40.0,
            Self::Boss => 400.0,
        }
    }

    /// Flat damage reduction applied to non-piercing hits.
    #[must_use]
    pub const fn armor(self) -> f32 {
        match self {
            Self::Basic => 0.0,
            Self::Fast => 0.0,
            Self::Tank => 4.0,
            Self::Flying => 0.0,
            Self::Healer => 1.0,
            Self::Boss => 6.0,
        }
    }

    /// Movement speed in world units per second before modifiers.
    #[must_use]
    pub const fn speed(self) -> f32 {
        match self {
            Self::Basic => 1.6,
            Self::Fast => 2.8,
            Self::Tank => 1.1,
            Self::Flying => 2.2,
            Self::Healer => 1.4,
            Self::Boss => 0.9,
        }
    }

    /// Gold awarded to the defender on a kill.
    #[must_use]
    pub const fn bounty(self) -> u32 {
        match self {
            Self::Basic => 8,
            Self::Fast => 10,
            Self::Tank => 18,
            Self::Flying => 12,
            Self::Healer => 16,
            Self::Boss => 80,
        }
    }

    /// Score awarded to the defender on a kill.
    #[must_use]
    pub const fn score(self) -> u32 {
        match self {
            Self::Basic => 10,
            Self::Fast => 12,
            Self::Tank => 20,
            Self::Flying => 14,
            Self::Healer => 18,
            Self::Boss => 100,
        }
    }

    /// Whether this kind travels above the board.
    #[must_use]
    pub const fn is_flying(self) -> bool {
        matches!(self, Self::Flying)
    }

    /// Penalty added to raw distance during target selection. Lower values
    /// win ties, so bosses outrank tanks which outrank everything else.
    #[must_use]
    pub const fn priority_bias(self) -> f32 {
        match self {
            Self::Boss => 0.0,
            Self::Tank => 2.0,
            _ => 4.0,
        }
    }

    /// Fraction of a neighbor's max health restored per second, when this
    /// kind is a support unit.
    #[must_use]
    pub const fn heal_fraction(self) -> f32 {
        match self {
            Self::Healer => 0.03,
            _ => 0.0,
        }
    }

    /// Radius of the support aura in world units.
    #[must_use]
    pub const fn heal_radius(self) -> f32 {
        match self {
            Self::Healer => 3.0,
            _ => 0.0,
        }
    }
}
