//! Tunable parameters for the room manager and the attack economy.

use std::time::Duration;

use outpost_defence_core::EnemyKind;
use serde::{Deserialize, Serialize};

/// Externally tunable room-manager constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Simulation steps per second for every room.
    pub tick_rate: u32,
    /// Minimum players required to start a game.
    pub min_players: usize,
    /// Maximum players a room accepts.
    pub max_players: usize,
    /// Seconds of pre-game countdown after the host starts.
    pub countdown: Duration,
    /// Build-phase pause before the next wave auto-starts.
    pub wave_prep: Duration,
    /// How long an empty or ended room survives before the sweep removes it.
    pub idle_timeout: Duration,
    /// Broadcast a full state snapshot every this many ticks.
    pub snapshot_interval: u64,
    /// Send points earned per enemy killed on a player's own board.
    pub points_per_kill: u32,
}

impl RoomConfig {
    /// Duration of a single simulation step at the configured tick rate.
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.tick_rate.max(1)))
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            min_players: 2,
            max_players: 4,
            countdown: Duration::from_secs(3),
            wave_prep: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(120),
            snapshot_interval: 4,
            points_per_kill: 1,
        }
    }
}

/// Cost and payload of one cross-player enemy send.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SendTier {
    /// Send points charged for the tier.
    pub cost: u32,
    /// Number of enemies materialized on the target's board.
    pub count: u32,
    /// Health multiplier applied to each sent enemy.
    pub health_multiplier: f32,
}

/// Send tier for the provided enemy kind.
#[must_use]
pub fn send_tier(kind: EnemyKind) -> SendTier {
    match kind {
        EnemyKind::Basic => SendTier {
            cost: 8,
            count: 3,
            health_multiplier: 1.0,
        },
        EnemyKind::Fast => SendTier {
            cost: 10,
            count: 1,
            health_multiplier: 1.25,
        },
        EnemyKind::Tank => SendTier {
            cost: 25,
            count: 1,
            health_multiplier: 1.5,
        },
        EnemyKind::Flying => SendTier {
            cost: 18,
            count: 2,
            health_multiplier: 1.2,
        },
        EnemyKind::Healer => SendTier {
            cost: 20,
            count: 1,
            health_multiplier: 1.3,
        },
        EnemyKind::Boss => SendTier {
            cost: 80,
            count: 1,
            health_multiplier: 1.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{send_tier, RoomConfig};
    use outpost_defence_core::EnemyKind;
    use std::time::Duration;

    #[test]
    fn default_tick_rate_is_twenty_hertz() {
        let config = RoomConfig::default();
        assert_eq!(config.tick_rate, 20);
        assert_eq!(config.tick_duration(), Duration::from_millis(50));
    }

    #[test]
    fn every_kind_has_a_purchasable_tier() {
        for kind in EnemyKind::ALL {
            let tier = send_tier(kind);
            assert!(tier.cost > 0);
            assert!(tier.count > 0);
            assert!(tier.health_multiplier > 0.0);
        }
    }

    #[test]
    fn fast_tier_matches_the_classic_price() {
        let tier = send_tier(EnemyKind::Fast);
        assert_eq!(tier.cost, 10);
        assert_eq!(tier.count, 1);
    }
}
