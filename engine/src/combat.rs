//! Targeting, firing, and projectile resolution.

use std::time::Duration;

use outpost_defence_core::{EnemyId, Event, Position, StatusKind, TowerId};

use crate::{
    GameState, Projectile, ARRIVAL_EPSILON, CHAIN_FALLOFF, CHAIN_RADIUS, MINIMUM_DAMAGE,
    SPLASH_FALLOFF, SPLASH_INNER_RADIUS,
};

/// Re-evaluates every tower's target against the current enemy set.
///
/// Distance plus the enemy kind's priority bias decides the winner, lower
/// scoring first, so bosses and tanks pull fire ahead of closer chaff.
/// Strict comparison keeps the lowest enemy id on exact ties.
pub(crate) fn run_targeting(state: &mut GameState) {
    let candidates: Vec<(EnemyId, Position, f32, bool)> = state
        .enemies
        .values()
        .filter(|enemy| !enemy.dead)
        .map(|enemy| {
            (
                enemy.id,
                enemy.position,
                enemy.kind.priority_bias(),
                enemy.flying,
            )
        })
        .collect();

    for tower in state.towers.values_mut() {
        let origin = tower.position();
        let range = tower.kind.range();
        let hits_flying = tower.kind.hits_flying();

        let mut best: Option<(f32, EnemyId)> = None;
        for (enemy, position, bias, flying) in &candidates {
            if *flying && !hits_flying {
                continue;
            }
            let distance = origin.distance_to(*position);
            if distance > range {
                continue;
            }
            let score = distance + bias;
            if best.map_or(true, |(best_score, _)| score < best_score) {
                best = Some((score, *enemy));
            }
        }
        tower.target = best.map(|(_, enemy)| enemy);
    }
}

/// Launches projectiles from every tower whose cooldown elapsed and whose
/// target is still alive and in range.
pub(crate) fn run_firing(state: &mut GameState, dt: Duration) {
    let mut launches: Vec<(TowerId, EnemyId)> = Vec::new();

    for tower in state.towers.values_mut() {
        tower.cooldown = tower.cooldown.saturating_sub(dt);
        if !tower.cooldown.is_zero() {
            continue;
        }
        let Some(target) = tower.target else {
            continue;
        };
        let valid = state.enemies.get(&target).is_some_and(|enemy| {
            !enemy.dead
                && tower.position().distance_to(enemy.position) <= tower.kind.range()
                && (!enemy.flying || tower.kind.hits_flying())
        });
        if !valid {
            continue;
        }

        tower.cooldown = Duration::from_secs_f32(1.0 / tower.kind.fire_rate(tower.level));
        launches.push((tower.id, target));
    }

    for (tower_id, target) in launches {
        let Some((position, kind, level)) = state
            .towers
            .get(&tower_id)
            .map(|tower| (tower.position(), tower.kind, tower.level))
        else {
            continue;
        };
        let projectile = Projectile {
            id: state.allocate_projectile_id(),
            tower: tower_id,
            target,
            position,
            damage: kind.damage(level),
            speed: kind.projectile_speed(),
            aoe_radius: kind.aoe_radius(),
            effect: kind.on_hit(),
            chain_jumps: kind.chain_jumps(),
            ignores_armor: kind.ignores_armor(),
        };
        let _ = state.projectiles.insert(projectile.id, projectile);
    }
}

/// Moves projectiles toward their targets and detonates arrivals.
pub(crate) fn run_projectiles(state: &mut GameState, dt: Duration, out_events: &mut Vec<Event>) {
    let ids: Vec<_> = state.projectiles.keys().copied().collect();
    for id in ids {
        let Some(projectile) = state.projectiles.get(&id) else {
            continue;
        };
        let Some(target) = state.enemies.get(&projectile.target) else {
            continue;
        };
        if target.dead {
            continue;
        }

        let destination = target.position;
        let step = projectile.speed * dt.as_secs_f32();
        let (next, reached) = projectile.position.step_toward(destination, step);
        let arrived = reached || next.distance_to(destination) <= ARRIVAL_EPSILON;

        if let Some(projectile) = state.projectiles.get_mut(&id) {
            projectile.position = next;
        }
        if !arrived {
            continue;
        }

        if let Some(projectile) = state.projectiles.remove(&id) {
            detonate(state, &projectile, destination, out_events);
        }
    }
}

fn detonate(
    state: &mut GameState,
    projectile: &Projectile,
    impact_point: Position,
    out_events: &mut Vec<Event>,
) {
    deal_damage(
        state,
        projectile.target,
        projectile.damage,
        projectile.ignores_armor,
        Some(projectile.tower),
        out_events,
    );

    if let Some(effect) = projectile.effect {
        if let Some(enemy) = state.enemies.get_mut(&projectile.target) {
            if !enemy.dead {
                enemy.apply_effect(effect, Some(projectile.tower));
            }
        }
    }

    if projectile.aoe_radius > 0.0 {
        splash(state, projectile, impact_point, out_events);
    }
    if projectile.chain_jumps > 0 {
        chain(state, projectile, impact_point, out_events);
    }
}

fn splash(
    state: &mut GameState,
    projectile: &Projectile,
    impact_point: Position,
    out_events: &mut Vec<Event>,
) {
    let victims: Vec<(EnemyId, f32)> = state
        .enemies
        .values()
        .filter(|enemy| !enemy.dead && enemy.id != projectile.target)
        .map(|enemy| (enemy.id, enemy.position.distance_to(impact_point)))
        .filter(|(_, distance)| *distance <= projectile.aoe_radius)
        .collect();

    for (victim, distance) in victims {
        let fraction = if distance <= SPLASH_INNER_RADIUS {
            1.0
        } else {
            SPLASH_FALLOFF
        };
        deal_damage(
            state,
            victim,
            projectile.damage * fraction,
            projectile.ignores_armor,
            Some(projectile.tower),
            out_events,
        );
    }
}

fn chain(
    state: &mut GameState,
    projectile: &Projectile,
    impact_point: Position,
    out_events: &mut Vec<Event>,
) {
    let mut struck = vec![projectile.target];
    let mut arc_origin = impact_point;
    let mut damage = projectile.damage * CHAIN_FALLOFF;

    for _ in 0..projectile.chain_jumps {
        let next = state
            .enemies
            .values()
            .filter(|enemy| !enemy.dead && !struck.contains(&enemy.id))
            .map(|enemy| (enemy.id, enemy.position, enemy.position.distance_to(arc_origin)))
            .filter(|(_, _, distance)| *distance <= CHAIN_RADIUS)
            .min_by(|a, b| a.2.total_cmp(&b.2));

        let Some((victim, position, _)) = next else {
            break;
        };
        deal_damage(
            state,
            victim,
            damage,
            projectile.ignores_armor,
            Some(projectile.tower),
            out_events,
        );
        struck.push(victim);
        arc_origin = position;
        damage *= CHAIN_FALLOFF;
    }
}

/// Applies damage to a live enemy, enforcing the armor rules and the
/// minimum-damage floor, and settles the kill if health is depleted.
pub(crate) fn deal_damage(
    state: &mut GameState,
    enemy_id: EnemyId,
    amount: f32,
    ignores_armor: bool,
    source: Option<TowerId>,
    out_events: &mut Vec<Event>,
) {
    let Some(enemy) = state.enemies.get_mut(&enemy_id) else {
        return;
    };
    if enemy.dead {
        return;
    }

    let mut inflicted = if ignores_armor {
        amount
    } else {
        (amount - enemy.armor).max(MINIMUM_DAMAGE)
    };
    if let Some(mark) = enemy
        .effects
        .iter()
        .find(|effect| effect.kind == StatusKind::Amplify)
    {
        inflicted *= mark.magnitude;
    }

    enemy.health -= inflicted;
    let killed = enemy.health <= 0.0;
    if killed {
        enemy.dead = true;
    }

    if let Some(tower) = source.and_then(|id| state.towers.get_mut(&id)) {
        tower.damage_dealt += inflicted;
    }
    if killed {
        settle_kill(state, enemy_id, source, out_events);
    }
}

/// Pays out bounty and score for a freshly flagged combat death and credits
/// the killing tower.
pub(crate) fn settle_kill(
    state: &mut GameState,
    enemy_id: EnemyId,
    killer: Option<TowerId>,
    out_events: &mut Vec<Event>,
) {
    let Some(enemy) = state.enemies.get(&enemy_id) else {
        return;
    };
    let kind = enemy.kind;
    state.gold = state.gold.saturating_add(kind.bounty());
    state.score = state.score.saturating_add(kind.score());
    if let Some(tower) = killer.and_then(|id| state.towers.get_mut(&id)) {
        tower.kills += 1;
    }
    out_events.push(Event::EnemyKilled {
        enemy: enemy_id,
        kind,
        killer,
        bounty: kind.bounty(),
    });
}
