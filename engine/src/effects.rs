//! Status-effect ticking and enemy support auras.

use std::time::Duration;

use outpost_defence_core::{EnemyId, Event, Position, StatusKind, TowerId};

use crate::{combat, Enemy, GameState};

/// Movement speed after slow and stun modifiers. Stun wins outright; the
/// strongest slow applies otherwise.
pub(crate) fn effective_speed(enemy: &Enemy) -> f32 {
    let mut slow: f32 = 0.0;
    for effect in &enemy.effects {
        match effect.kind {
            StatusKind::Stun => return 0.0,
            StatusKind::Slow => slow = slow.max(effect.magnitude),
            _ => {}
        }
    }
    enemy.base_speed * (1.0 - slow).max(0.0)
}

/// Applies damage-over-time, winds down durations, and prunes expired
/// effects. Deaths settled here award bounty and score exactly like
/// projectile kills.
pub(crate) fn run_status_ticks(state: &mut GameState, dt: Duration, out_events: &mut Vec<Event>) {
    let seconds = dt.as_secs_f32();
    let mut settled: Vec<(EnemyId, Option<TowerId>)> = Vec::new();

    for enemy in state.enemies.values_mut() {
        if enemy.dead {
            continue;
        }

        let mut dot = 0.0;
        let mut dot_source = None;
        for effect in &enemy.effects {
            if matches!(effect.kind, StatusKind::Burn | StatusKind::Poison) {
                dot += effect.magnitude;
                dot_source = effect.source.or(dot_source);
            }
        }
        if dot > 0.0 {
            enemy.health -= dot * seconds;
            if enemy.health <= 0.0 {
                enemy.dead = true;
                settled.push((enemy.id, dot_source));
            }
        }

        for effect in &mut enemy.effects {
            effect.remaining = effect.remaining.saturating_sub(dt);
        }
        enemy.effects.retain(|effect| !effect.remaining.is_zero());
    }

    for (enemy, killer) in settled {
        combat::settle_kill(state, enemy, killer, out_events);
    }
}

/// Healer enemies restore a fraction of max health per second to nearby
/// non-healer enemies.
pub(crate) fn run_support_auras(state: &mut GameState, dt: Duration) {
    let seconds = dt.as_secs_f32();
    let auras: Vec<(Position, f32, f32)> = state
        .enemies
        .values()
        .filter(|enemy| !enemy.dead && enemy.kind.heal_fraction() > 0.0)
        .map(|enemy| {
            (
                enemy.position,
                enemy.kind.heal_fraction(),
                enemy.kind.heal_radius(),
            )
        })
        .collect();
    if auras.is_empty() {
        return;
    }

    for enemy in state.enemies.values_mut() {
        if enemy.dead || enemy.kind.heal_fraction() > 0.0 {
            continue;
        }
        for (origin, fraction, radius) in &auras {
            if enemy.position.distance_to(*origin) <= *radius {
                enemy.health =
                    (enemy.health + enemy.max_health * fraction * seconds).min(enemy.max_health);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{effective_speed, run_status_ticks, run_support_auras};
    use crate::GameState;
    use outpost_defence_core::{EnemyKind, Event, OnHitEffect, StatusKind};
    use outpost_defence_map::blueprint;
    use std::time::Duration;

    fn state_with_enemy(kind: EnemyKind) -> (GameState, outpost_defence_core::EnemyId) {
        let mut state = GameState::new(blueprint(0).expect("map"));
        let mut events = Vec::new();
        let id = state.spawn_enemy(kind, 1.0, 1.0, &mut events);
        (state, id)
    }

    fn effect(kind: StatusKind, magnitude: f32, millis: u64) -> OnHitEffect {
        OnHitEffect {
            kind,
            magnitude,
            duration: Duration::from_millis(millis),
        }
    }

    #[test]
    fn stun_zeroes_speed_and_slow_scales_it() {
        let (mut state, id) = state_with_enemy(EnemyKind::Basic);
        let base = EnemyKind::Basic.speed();

        {
            let enemy = state.enemies.get_mut(&id).expect("enemy");
            assert_eq!(effective_speed(enemy), base);
            enemy.apply_effect(effect(StatusKind::Slow, 0.45, 2000), None);
            assert!((effective_speed(enemy) - base * 0.55).abs() < 1e-5);
            enemy.apply_effect(effect(StatusKind::Stun, 0.0, 500), None);
            assert_eq!(effective_speed(enemy), 0.0);
        }
    }

    #[test]
    fn reapplied_effects_refresh_instead_of_stacking() {
        let (mut state, id) = state_with_enemy(EnemyKind::Basic);
        let enemy = state.enemies.get_mut(&id).expect("enemy");
        enemy.apply_effect(effect(StatusKind::Slow, 0.2, 1000), None);
        enemy.apply_effect(effect(StatusKind::Slow, 0.45, 2000), None);
        assert_eq!(enemy.effects.len(), 1);
        assert_eq!(enemy.effects[0].remaining, Duration::from_millis(2000));
    }

    #[test]
    fn burn_drains_health_and_expires() {
        let (mut state, id) = state_with_enemy(EnemyKind::Basic);
        let start = state.enemies[&id].health;
        state
            .enemies
            .get_mut(&id)
            .expect("enemy")
            .apply_effect(effect(StatusKind::Burn, 6.0, 1000), None);

        let mut events = Vec::new();
        run_status_ticks(&mut state, Duration::from_millis(500), &mut events);
        let enemy = &state.enemies[&id];
        assert!((start - enemy.health - 3.0).abs() < 1e-4);
        assert_eq!(enemy.effects.len(), 1);

        run_status_ticks(&mut state, Duration::from_millis(500), &mut events);
        assert!(state.enemies[&id].effects.is_empty());
    }

    #[test]
    fn lethal_burn_settles_like_a_combat_kill() {
        let (mut state, id) = state_with_enemy(EnemyKind::Fast);
        let gold_before = state.gold;
        state
            .enemies
            .get_mut(&id)
            .expect("enemy")
            .apply_effect(effect(StatusKind::Burn, 1000.0, 1000), None);

        let mut events = Vec::new();
        run_status_ticks(&mut state, Duration::from_millis(100), &mut events);

        assert!(state.enemies[&id].dead);
        assert_eq!(state.gold, gold_before + EnemyKind::Fast.bounty());
        assert!(events
            .iter()
            .any(|event| matches!(event, Event::EnemyKilled { enemy, .. } if *enemy == id)));
    }

    #[test]
    fn healer_restores_wounded_neighbors_but_not_itself() {
        let (mut state, healer) = state_with_enemy(EnemyKind::Healer);
        let mut events = Vec::new();
        let wounded = state.spawn_enemy(EnemyKind::Basic, 1.0, 1.0, &mut events);

        state.enemies.get_mut(&healer).expect("healer").health = 10.0;
        state.enemies.get_mut(&wounded).expect("enemy").health = 10.0;

        run_support_auras(&mut state, Duration::from_secs(1));

        let healed = EnemyKind::Basic.max_health() * EnemyKind::Healer.heal_fraction();
        assert!((state.enemies[&wounded].health - (10.0 + healed)).abs() < 1e-4);
        assert_eq!(state.enemies[&healer].health, 10.0);
    }
}
