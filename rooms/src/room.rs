//! One multiplayer session: its players, lifecycle, and per-tick step.

use std::time::{Duration, Instant};

use outpost_defence_core::{CellCoord, EnemyKind, Event, Phase, PlayerId, TowerId, TowerKind};
use outpost_defence_engine::{self as engine, query, GameState};
use outpost_defence_map::{waves, MapBlueprint};
use serde::{Deserialize, Serialize};

use crate::codes::RoomCode;
use crate::config::{send_tier, RoomConfig};
use crate::protocol::{Gateway, PlayerSnapshot, RankEntry, RoomSnapshot, ServerEvent};
use crate::RoomError;

/// Lifecycle status of a room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    /// Gathering players; joins are accepted.
    Waiting,
    /// Pre-game countdown is running.
    Countdown,
    /// Boards are live and the tick loop is advancing them.
    Playing,
    /// The game finished; the room lingers until swept.
    Ended,
}

/// Outcome of a join request, distinguishing fresh joins from reconnects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum JoinOutcome {
    Joined,
    Reconnected,
}

#[derive(Debug)]
pub(crate) struct Player {
    pub(crate) id: PlayerId,
    pub(crate) name: String,
    pub(crate) state: GameState,
    pub(crate) ready: bool,
    pub(crate) connected: bool,
    pub(crate) send_points: u32,
    pub(crate) total_sent: u32,
    pub(crate) total_received: u32,
    pub(crate) eliminated: bool,
    pub(crate) elimination_order: Option<u32>,
    pub(crate) default_target: Option<PlayerId>,
}

impl Player {
    fn new(id: PlayerId, name: String, map: &MapBlueprint) -> Self {
        Self {
            id,
            name,
            state: GameState::new(map.clone()),
            ready: false,
            connected: true,
            send_points: 0,
            total_sent: 0,
            total_received: 0,
            eliminated: false,
            elimination_order: None,
            default_target: None,
        }
    }

    fn reset_for_new_game(&mut self, map: &MapBlueprint) {
        self.state = GameState::new(map.clone());
        self.send_points = 0;
        self.total_sent = 0;
        self.total_received = 0;
        self.eliminated = false;
        self.elimination_order = None;
    }

    fn in_play(&self) -> bool {
        !self.eliminated
    }
}

#[derive(Debug)]
pub(crate) struct Room {
    pub(crate) code: RoomCode,
    pub(crate) host: PlayerId,
    pub(crate) status: RoomStatus,
    pub(crate) map_index: u32,
    map: MapBlueprint,
    pub(crate) players: Vec<Player>,
    wave_number: u32,
    wave_active: bool,
    countdown_remaining: Duration,
    prep_remaining: Option<Duration>,
    elimination_counter: u32,
    tick_counter: u64,
    pub(crate) ticker_started: bool,
    pub(crate) ended_at: Option<Instant>,
    pub(crate) empty_since: Option<Instant>,
    scratch_events: Vec<Event>,
}

impl Room {
    pub(crate) fn new(
        code: RoomCode,
        host: PlayerId,
        host_name: String,
        map_index: u32,
        map: MapBlueprint,
    ) -> Self {
        let host_player = Player::new(host, host_name, &map);
        Self {
            code,
            host,
            status: RoomStatus::Waiting,
            map_index,
            map,
            players: vec![host_player],
            wave_number: 0,
            wave_active: false,
            countdown_remaining: Duration::ZERO,
            prep_remaining: None,
            elimination_counter: 0,
            tick_counter: 0,
            ticker_started: false,
            ended_at: None,
            empty_since: None,
            scratch_events: Vec::new(),
        }
    }

    pub(crate) fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    pub(crate) fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|player| player.id == id)
    }

    pub(crate) fn alive_count(&self) -> usize {
        self.players.iter().filter(|player| player.in_play()).count()
    }

    pub(crate) fn connected_count(&self) -> usize {
        self.players.iter().filter(|player| player.connected).count()
    }

    pub(crate) fn wave_number(&self) -> u32 {
        self.wave_number
    }

    fn require_playing(&self) -> Result<(), RoomError> {
        if self.status == RoomStatus::Playing {
            Ok(())
        } else {
            Err(RoomError::NotPlaying)
        }
    }

    fn active_board(&mut self, id: PlayerId) -> Result<&mut Player, RoomError> {
        let player = self
            .players
            .iter_mut()
            .find(|player| player.id == id)
            .ok_or(RoomError::PlayerNotFound)?;
        if player.eliminated {
            return Err(RoomError::Eliminated);
        }
        Ok(player)
    }

    // ------------------------------------------------------------------
    // Lobby transitions
    // ------------------------------------------------------------------

    pub(crate) fn join(
        &mut self,
        id: PlayerId,
        name: String,
        config: &RoomConfig,
        gateway: &dyn Gateway,
    ) -> Result<JoinOutcome, RoomError> {
        if let Some(player) = self.player_mut(id) {
            player.connected = true;
            let display = player.name.clone();
            self.empty_since = None;
            gateway.broadcast(
                &self.code,
                &ServerEvent::PlayerJoined {
                    player: id,
                    name: display,
                },
            );
            return Ok(JoinOutcome::Reconnected);
        }

        if self.status != RoomStatus::Waiting {
            return Err(RoomError::AlreadyStarted);
        }
        if self.players.len() >= config.max_players {
            return Err(RoomError::RoomFull);
        }

        self.players.push(Player::new(id, name.clone(), &self.map));
        self.empty_since = None;
        gateway.broadcast(&self.code, &ServerEvent::PlayerJoined { player: id, name });
        Ok(JoinOutcome::Joined)
    }

    /// Removes or eliminates a departing player. Returns true when the room
    /// should be torn down entirely.
    pub(crate) fn leave(&mut self, id: PlayerId, gateway: &dyn Gateway) -> bool {
        match self.status {
            RoomStatus::Waiting | RoomStatus::Countdown | RoomStatus::Ended => {
                self.players.retain(|player| player.id != id);
                gateway.broadcast(&self.code, &ServerEvent::PlayerLeft { player: id });
                if self.status == RoomStatus::Countdown {
                    // Losing a player cancels the countdown.
                    self.status = RoomStatus::Waiting;
                }
                if self.host == id {
                    if let Some(next) = self.players.iter().find(|player| player.connected) {
                        self.host = next.id;
                    }
                }
            }
            RoomStatus::Playing => {
                // Leaving mid-game is an immediate elimination, not a pause.
                if let Some(player) = self.player_mut(id) {
                    player.connected = false;
                }
                gateway.broadcast(&self.code, &ServerEvent::PlayerLeft { player: id });
                self.eliminate(id, gateway);
                self.check_game_over(gateway);
            }
        }

        if self.connected_count() == 0 {
            self.empty_since = Some(Instant::now());
        }
        if self.players.is_empty() {
            // Nobody is left to hear a game-over; silently stop the ticker.
            self.status = RoomStatus::Ended;
            return true;
        }
        false
    }

    pub(crate) fn set_ready(
        &mut self,
        id: PlayerId,
        ready: bool,
        gateway: &dyn Gateway,
    ) -> Result<(), RoomError> {
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::AlreadyStarted);
        }
        let player = self.player_mut(id).ok_or(RoomError::PlayerNotFound)?;
        player.ready = ready;
        gateway.broadcast(&self.code, &ServerEvent::PlayerReady { player: id, ready });
        Ok(())
    }

    pub(crate) fn start_game(
        &mut self,
        id: PlayerId,
        config: &RoomConfig,
        gateway: &dyn Gateway,
    ) -> Result<(), RoomError> {
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::AlreadyStarted);
        }
        if id != self.host {
            return Err(RoomError::NotHost);
        }
        if self.connected_count() < config.min_players {
            return Err(RoomError::NotEnoughPlayers);
        }
        let all_ready = self
            .players
            .iter()
            .filter(|player| player.connected && player.id != self.host)
            .all(|player| player.ready);
        if !all_ready {
            return Err(RoomError::NotReady);
        }

        self.status = RoomStatus::Countdown;
        self.countdown_remaining = config.countdown;
        gateway.broadcast(
            &self.code,
            &ServerEvent::CountdownTick {
                seconds: config.countdown.as_secs() as u32,
            },
        );
        Ok(())
    }

    fn begin_playing(&mut self, config: &RoomConfig, gateway: &dyn Gateway) {
        for player in &mut self.players {
            player.reset_for_new_game(&self.map);
        }
        self.wave_number = 0;
        self.wave_active = false;
        self.elimination_counter = 0;
        self.tick_counter = 0;
        self.prep_remaining = Some(config.wave_prep);
        self.status = RoomStatus::Playing;
        gateway.broadcast(
            &self.code,
            &ServerEvent::GameStarted {
                map: self.map_index,
            },
        );
    }

    // ------------------------------------------------------------------
    // In-game commands
    // ------------------------------------------------------------------

    pub(crate) fn place_tower(
        &mut self,
        id: PlayerId,
        kind: TowerKind,
        cell: CellCoord,
        gateway: &dyn Gateway,
    ) -> Result<TowerId, RoomError> {
        self.require_playing()?;
        let player = self.active_board(id)?;
        let tower = engine::place_tower(&mut player.state, kind, cell)
            .map_err(RoomError::Placement)?;
        gateway.broadcast(
            &self.code,
            &ServerEvent::TowerPlaced {
                player: id,
                tower,
                kind,
                cell,
            },
        );
        Ok(tower)
    }

    pub(crate) fn sell_tower(
        &mut self,
        id: PlayerId,
        tower: TowerId,
        gateway: &dyn Gateway,
    ) -> Result<u32, RoomError> {
        self.require_playing()?;
        let player = self.active_board(id)?;
        let refund = engine::sell_tower(&mut player.state, tower).map_err(RoomError::Sell)?;
        gateway.broadcast(
            &self.code,
            &ServerEvent::TowerSold {
                player: id,
                tower,
                refund,
            },
        );
        Ok(refund)
    }

    pub(crate) fn upgrade_tower(
        &mut self,
        id: PlayerId,
        tower: TowerId,
        gateway: &dyn Gateway,
    ) -> Result<u32, RoomError> {
        self.require_playing()?;
        let player = self.active_board(id)?;
        let level = engine::upgrade_tower(&mut player.state, tower).map_err(RoomError::Upgrade)?;
        gateway.broadcast(
            &self.code,
            &ServerEvent::TowerUpgraded {
                player: id,
                tower,
                level,
            },
        );
        Ok(level)
    }

    pub(crate) fn start_wave(
        &mut self,
        id: PlayerId,
        gateway: &dyn Gateway,
    ) -> Result<u32, RoomError> {
        self.require_playing()?;
        if id != self.host {
            return Err(RoomError::NotHost);
        }
        self.start_shared_wave(gateway)
    }

    fn start_shared_wave(&mut self, gateway: &dyn Gateway) -> Result<u32, RoomError> {
        if self.wave_active {
            return Err(RoomError::WaveInProgress);
        }
        if self.wave_number >= waves::FINAL_WAVE {
            return Err(RoomError::WavesExhausted);
        }

        self.wave_number += 1;
        let mut events = Vec::new();
        for player in self.players.iter_mut().filter(|player| player.in_play()) {
            // Terminal boards simply skip the wave; everyone else advances
            // to the same wave number at the same moment.
            let _ = engine::start_wave(&mut player.state, &mut events);
            events.clear();
        }
        self.wave_active = true;
        self.prep_remaining = None;
        gateway.broadcast(
            &self.code,
            &ServerEvent::WaveStarted {
                wave: self.wave_number,
            },
        );
        Ok(self.wave_number)
    }

    pub(crate) fn select_target(
        &mut self,
        id: PlayerId,
        target: PlayerId,
    ) -> Result<(), RoomError> {
        if id == target {
            return Err(RoomError::SelfTarget);
        }
        if self.player(target).is_none() {
            return Err(RoomError::TargetUnavailable);
        }
        let player = self.player_mut(id).ok_or(RoomError::PlayerNotFound)?;
        player.default_target = Some(target);
        Ok(())
    }

    pub(crate) fn send_enemy(
        &mut self,
        from: PlayerId,
        explicit_target: Option<PlayerId>,
        kind: EnemyKind,
        gateway: &dyn Gateway,
    ) -> Result<u32, RoomError> {
        self.require_playing()?;

        let sender_index = self
            .players
            .iter()
            .position(|player| player.id == from)
            .ok_or(RoomError::PlayerNotFound)?;
        if self.players[sender_index].eliminated {
            return Err(RoomError::Eliminated);
        }

        let target_id = explicit_target
            .or(self.players[sender_index].default_target)
            .ok_or(RoomError::NoTarget)?;
        if target_id == from {
            return Err(RoomError::SelfTarget);
        }
        let target_index = self
            .players
            .iter()
            .position(|player| player.id == target_id)
            .ok_or(RoomError::TargetUnavailable)?;
        let target = &self.players[target_index];
        if target.eliminated || query::phase(&target.state).is_terminal() {
            return Err(RoomError::TargetUnavailable);
        }

        let tier = send_tier(kind);
        if self.players[sender_index].send_points < tier.cost {
            return Err(RoomError::InsufficientPoints);
        }

        self.players[sender_index].send_points -= tier.cost;
        self.players[sender_index].total_sent += tier.count;

        self.scratch_events.clear();
        let mut delivered = 0;
        for _ in 0..tier.count {
            let target = &mut self.players[target_index];
            if engine::inject_enemy(
                &mut target.state,
                kind,
                tier.health_multiplier,
                &mut self.scratch_events,
            )
            .is_ok()
            {
                delivered += 1;
            }
        }
        self.players[target_index].total_received += delivered;

        gateway.broadcast(
            &self.code,
            &ServerEvent::EnemySent {
                from,
                to: target_id,
                kind,
                count: delivered,
            },
        );
        gateway.direct(
            &self.code,
            target_id,
            &ServerEvent::IncomingAttack {
                from,
                kind,
                count: delivered,
            },
        );
        Ok(delivered)
    }

    // ------------------------------------------------------------------
    // Tick step
    // ------------------------------------------------------------------

    pub(crate) fn step(&mut self, dt: Duration, config: &RoomConfig, gateway: &dyn Gateway) {
        match self.status {
            RoomStatus::Countdown => self.step_countdown(dt, config, gateway),
            RoomStatus::Playing => self.step_playing(dt, config, gateway),
            RoomStatus::Waiting | RoomStatus::Ended => {}
        }
    }

    fn step_countdown(&mut self, dt: Duration, config: &RoomConfig, gateway: &dyn Gateway) {
        let before = self.countdown_remaining.as_secs_f64().ceil() as u32;
        self.countdown_remaining = self.countdown_remaining.saturating_sub(dt);
        let after = self.countdown_remaining.as_secs_f64().ceil() as u32;
        if after < before && after > 0 {
            gateway.broadcast(&self.code, &ServerEvent::CountdownTick { seconds: after });
        }
        if self.countdown_remaining.is_zero() {
            self.begin_playing(config, gateway);
        }
    }

    fn step_playing(&mut self, dt: Duration, config: &RoomConfig, gateway: &dyn Gateway) {
        // Advance every live board and convert kill events to send points.
        let mut events = std::mem::take(&mut self.scratch_events);
        for player in &mut self.players {
            if !player.in_play() {
                continue;
            }
            events.clear();
            engine::advance(&mut player.state, dt, &mut events);
            for event in &events {
                if matches!(event, Event::EnemyKilled { .. }) {
                    player.send_points = player.send_points.saturating_add(config.points_per_kill);
                }
            }
        }
        events.clear();
        self.scratch_events = events;

        // Detect boards that just reached their terminal loss.
        let lost: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|player| player.in_play() && query::phase(&player.state) == Phase::Lost)
            .map(|player| player.id)
            .collect();
        for id in lost {
            self.eliminate(id, gateway);
        }

        // Room-wide wave completion: every living board settled out of wave
        // phase.
        if self.wave_active
            && self
                .players
                .iter()
                .filter(|player| player.in_play())
                .all(|player| {
                    matches!(query::phase(&player.state), Phase::Build | Phase::Won)
                })
        {
            self.wave_active = false;
            gateway.broadcast(
                &self.code,
                &ServerEvent::WaveComplete {
                    wave: self.wave_number,
                },
            );
            self.prep_remaining = Some(config.wave_prep);
        }

        // Build-phase countdown toward the next auto-started wave.
        if !self.wave_active {
            if let Some(remaining) = self.prep_remaining {
                let remaining = remaining.saturating_sub(dt);
                if remaining.is_zero() {
                    self.prep_remaining = None;
                    let _ = self.start_shared_wave(gateway);
                } else {
                    self.prep_remaining = Some(remaining);
                }
            }
        }

        self.check_game_over(gateway);

        self.tick_counter += 1;
        if self.status == RoomStatus::Playing
            && config.snapshot_interval > 0
            && self.tick_counter % config.snapshot_interval == 0
        {
            let snapshot = self.snapshot();
            gateway.broadcast(&self.code, &ServerEvent::StateUpdate { snapshot });
        }
    }

    pub(crate) fn eliminate(&mut self, id: PlayerId, gateway: &dyn Gateway) {
        let total = self.players.len() as u32;
        let Some(index) = self.players.iter().position(|player| player.id == id) else {
            return;
        };
        if self.players[index].eliminated {
            return;
        }
        self.elimination_counter += 1;
        let order = self.elimination_counter;
        let player = &mut self.players[index];
        player.eliminated = true;
        player.elimination_order = Some(order);
        let rank = total - order + 1;
        tracing::info!(room = %self.code, player = id.get(), rank, "player eliminated");
        gateway.broadcast(&self.code, &ServerEvent::PlayerEliminated { player: id, rank });
    }

    pub(crate) fn check_game_over(&mut self, gateway: &dyn Gateway) {
        if self.status != RoomStatus::Playing {
            return;
        }
        let alive = self.alive_count();
        let all_won = alive > 0
            && self
                .players
                .iter()
                .filter(|player| player.in_play())
                .all(|player| query::phase(&player.state) == Phase::Won);
        // Solo rooms only end when their single board terminates; with the
        // minimum-player floor in effect one survivor is the winner.
        let survivor_floor = usize::from(self.players.len() > 1);
        if alive > survivor_floor && !all_won {
            return;
        }
        self.finish(gateway);
    }

    /// Transitions the room to ended and emits final rankings. Safe to call
    /// repeatedly; only the first call has any effect.
    pub(crate) fn finish(&mut self, gateway: &dyn Gateway) {
        if self.status == RoomStatus::Ended {
            return;
        }
        self.status = RoomStatus::Ended;
        self.ended_at = Some(Instant::now());
        let rankings = self.final_rankings();
        tracing::info!(room = %self.code, "game over");
        gateway.broadcast(&self.code, &ServerEvent::GameOver { rankings });
    }

    fn final_rankings(&self) -> Vec<RankEntry> {
        let mut rankings = Vec::with_capacity(self.players.len());

        // Survivors rank by score; stable sort keeps join order on ties.
        let mut survivors: Vec<&Player> = self
            .players
            .iter()
            .filter(|player| player.in_play())
            .collect();
        survivors.sort_by(|a, b| query::score(&b.state).cmp(&query::score(&a.state)));

        // Eliminated players rank by how long they lasted.
        let mut fallen: Vec<&Player> = self
            .players
            .iter()
            .filter(|player| player.eliminated)
            .collect();
        fallen.sort_by_key(|player| std::cmp::Reverse(player.elimination_order.unwrap_or(0)));

        for (index, player) in survivors.iter().chain(fallen.iter()).enumerate() {
            rankings.push(RankEntry {
                player: player.id,
                name: player.name.clone(),
                rank: index as u32 + 1,
                score: query::score(&player.state),
                eliminated: player.eliminated,
            });
        }
        rankings
    }

    pub(crate) fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            wave: self.wave_number,
            wave_active: self.wave_active,
            players: self
                .players
                .iter()
                .map(|player| PlayerSnapshot {
                    id: player.id,
                    name: player.name.clone(),
                    eliminated: player.eliminated,
                    send_points: player.send_points,
                    total_sent: player.total_sent,
                    total_received: player.total_received,
                    board: query::snapshot(&player.state),
                })
                .collect(),
        }
    }
}
