//! Wave composition tables.
//!
//! A wave is an immutable list of spawn groups; the engine keeps its own
//! mutable tracker while a wave runs. Composition is a pure function of the
//! wave number so every board facing wave N sees identical configuration.

use std::time::Duration;

use outpost_defence_core::EnemyKind;

/// Last configured wave; clearing it wins the board.
pub const FINAL_WAVE: u32 = 20;

/// One batch of identical enemies inside a wave.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnGroup {
    /// Kind of enemy the group releases.
    pub kind: EnemyKind,
    /// Total enemies the group releases before it is exhausted.
    pub count: u32,
    /// Delay between consecutive spawns within the group.
    pub spawn_delay: Duration,
    /// Delay between wave start and the group's first spawn.
    pub start_offset: Duration,
    /// Multiplier applied to the kind's base health.
    pub health_multiplier: f32,
    /// Multiplier applied to the kind's base speed.
    pub speed_multiplier: f32,
}

/// Immutable configuration for one wave.
#[derive(Clone, Debug, PartialEq)]
pub struct Wave {
    /// One-based wave number.
    pub number: u32,
    /// Spawn groups in start-offset order.
    pub groups: Vec<SpawnGroup>,
    /// Gold paid out when the wave is cleared.
    pub reward_gold: u32,
    /// Score paid out when the wave is cleared.
    pub reward_score: u32,
}

/// Builds the configuration for the provided one-based wave number.
///
/// Returns `None` for wave zero and for numbers past [`FINAL_WAVE`].
#[must_use]
pub fn wave(number: u32) -> Option<Wave> {
    if number == 0 || number > FINAL_WAVE {
        return None;
    }

    let health_multiplier = 1.0 + 0.12 * (number - 1) as f32;
    let speed_multiplier = (1.0 + 0.015 * (number - 1) as f32).min(1.3);
    let group = |kind: EnemyKind, count: u32, delay_ms: u64, offset_ms: u64| SpawnGroup {
        kind,
        count,
        spawn_delay: Duration::from_millis(delay_ms),
        start_offset: Duration::from_millis(offset_ms),
        health_multiplier,
        speed_multiplier,
    };

    let mut groups = Vec::new();
    if number == 1 {
        groups.push(group(EnemyKind::Basic, 8, 1200, 0));
    } else {
        let basic_delay = (1200u64.saturating_sub(40 * u64::from(number))).max(400);
        groups.push(group(EnemyKind::Basic, 6 + number, basic_delay, 0));
        groups.push(group(EnemyKind::Fast, number, 800, 4000));
    }
    if number >= 3 {
        groups.push(group(EnemyKind::Tank, number / 3, 2000, 8000));
    }
    if number % 4 == 0 {
        groups.push(group(EnemyKind::Flying, number / 2, 700, 6000));
    }
    if number >= 6 {
        groups.push(group(EnemyKind::Healer, number / 6, 2500, 10_000));
    }
    if number % 10 == 0 {
        groups.push(group(EnemyKind::Boss, number / 10, 5000, 12_000));
    }

    Some(Wave {
        number,
        groups,
        reward_gold: 40 + 10 * number,
        reward_score: 100 + 25 * number,
    })
}
