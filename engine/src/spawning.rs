//! Wave spawn scheduling.
//!
//! The tracker is owned by the board it spawns for; concurrent boards never
//! share one. `start_wave` creates it and wave completion clears it.

use std::time::Duration;

use outpost_defence_core::{EnemyKind, Event};
use outpost_defence_map::waves::{SpawnGroup, Wave};

use crate::GameState;

/// Mutable bookkeeping for the active wave's spawn groups.
#[derive(Clone, Debug)]
pub struct SpawnTracker {
    groups: Vec<GroupTracker>,
}

#[derive(Clone, Debug)]
struct GroupTracker {
    group: SpawnGroup,
    spawned: u32,
    start_delay: Duration,
    next_spawn: Duration,
}

impl SpawnTracker {
    /// Creates a tracker covering every group of the provided wave.
    #[must_use]
    pub fn new(wave: &Wave) -> Self {
        Self {
            groups: wave
                .groups
                .iter()
                .map(|group| GroupTracker {
                    group: *group,
                    spawned: 0,
                    start_delay: group.start_offset,
                    next_spawn: Duration::ZERO,
                })
                .collect(),
        }
    }

    /// Reports whether every group released its full count.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.groups
            .iter()
            .all(|tracker| tracker.spawned >= tracker.group.count)
    }

    /// Total enemies released so far across all groups.
    #[must_use]
    pub fn spawned(&self) -> u32 {
        self.groups.iter().map(|tracker| tracker.spawned).sum()
    }

    /// Consumes a time slice, collecting the spawns that came due.
    fn collect_due(&mut self, dt: Duration, due: &mut Vec<(EnemyKind, f32, f32)>) {
        for tracker in &mut self.groups {
            let mut remaining = dt;

            if !tracker.start_delay.is_zero() {
                if tracker.start_delay > remaining {
                    tracker.start_delay -= remaining;
                    continue;
                }
                remaining -= tracker.start_delay;
                tracker.start_delay = Duration::ZERO;
            }

            while tracker.spawned < tracker.group.count {
                if tracker.next_spawn > remaining {
                    tracker.next_spawn -= remaining;
                    break;
                }
                remaining -= tracker.next_spawn;
                tracker.next_spawn = tracker.group.spawn_delay;
                tracker.spawned += 1;
                due.push((
                    tracker.group.kind,
                    tracker.group.health_multiplier,
                    tracker.group.speed_multiplier,
                ));
            }
        }
    }
}

pub(crate) fn run(state: &mut GameState, dt: Duration, out_events: &mut Vec<Event>) {
    let mut due = Vec::new();
    if let Some(tracker) = state.tracker.as_mut() {
        tracker.collect_due(dt, &mut due);
    }
    for (kind, health_multiplier, speed_multiplier) in due {
        let _ = state.spawn_enemy(kind, health_multiplier, speed_multiplier, out_events);
    }
}
