//! Broadcast surface between the room manager and connected sockets.
//!
//! The manager never talks to a transport directly; it emits
//! [`ServerEvent`] values through a [`Gateway`]. Sends are fire-and-forget:
//! delivery latency must never stall a room's tick, so implementations queue
//! and drop rather than block.

use outpost_defence_core::{CellCoord, EnemyKind, PlayerId, TowerId, TowerKind};
use outpost_defence_engine::query::BoardSnapshot;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::codes::RoomCode;

/// One player's slice of a room snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Player identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Whether the player has been eliminated.
    pub eliminated: bool,
    /// Send points available for attacks.
    pub send_points: u32,
    /// Total enemies sent at other players.
    pub total_sent: u32,
    /// Total enemies received from other players.
    pub total_received: u32,
    /// The player's full board state.
    pub board: BoardSnapshot,
}

/// Periodic full-room state broadcast on a reduced cadence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    /// Shared wave number across the room.
    pub wave: u32,
    /// Whether a wave is currently active room-wide.
    pub wave_active: bool,
    /// Every player's slice, in join order.
    pub players: Vec<PlayerSnapshot>,
}

/// Final placement of one player in an ended room.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    /// Player identifier.
    pub player: PlayerId,
    /// Display name.
    pub name: String,
    /// One-based final rank; one is the winner.
    pub rank: u32,
    /// Final score.
    pub score: u32,
    /// Whether the player was eliminated before the room ended.
    pub eliminated: bool,
}

/// Events the manager broadcasts to room sockets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ServerEvent {
    /// A player joined or reconnected.
    PlayerJoined {
        /// Player identifier.
        player: PlayerId,
        /// Display name.
        name: String,
    },
    /// A player left the room.
    PlayerLeft {
        /// Player identifier.
        player: PlayerId,
    },
    /// A player toggled their ready flag.
    PlayerReady {
        /// Player identifier.
        player: PlayerId,
        /// New ready state.
        ready: bool,
    },
    /// Pre-game countdown progress.
    CountdownTick {
        /// Whole seconds remaining.
        seconds: u32,
    },
    /// The countdown finished and every board was reset.
    GameStarted {
        /// Map index shared by all boards.
        map: u32,
    },
    /// A tower was placed on a player's board.
    TowerPlaced {
        /// Owning player.
        player: PlayerId,
        /// Tower identifier on that board.
        tower: TowerId,
        /// Kind of tower placed.
        kind: TowerKind,
        /// Cell the tower occupies.
        cell: CellCoord,
    },
    /// A tower was sold.
    TowerSold {
        /// Owning player.
        player: PlayerId,
        /// Tower identifier on that board.
        tower: TowerId,
        /// Gold refunded.
        refund: u32,
    },
    /// A tower was upgraded.
    TowerUpgraded {
        /// Owning player.
        player: PlayerId,
        /// Tower identifier on that board.
        tower: TowerId,
        /// New level after the upgrade.
        level: u32,
    },
    /// A shared wave started for every living player.
    WaveStarted {
        /// One-based wave number.
        wave: u32,
    },
    /// Every living player cleared the shared wave.
    WaveComplete {
        /// One-based wave number.
        wave: u32,
    },
    /// A player paid points to attack another board.
    EnemySent {
        /// Attacking player.
        from: PlayerId,
        /// Defending player.
        to: PlayerId,
        /// Kind of enemy sent.
        kind: EnemyKind,
        /// Number of enemies materialized.
        count: u32,
    },
    /// Private notice delivered only to the attacked player.
    IncomingAttack {
        /// Attacking player.
        from: PlayerId,
        /// Kind of enemy inbound.
        kind: EnemyKind,
        /// Number of enemies inbound.
        count: u32,
    },
    /// A player's board was lost and they dropped out of play.
    PlayerEliminated {
        /// Eliminated player.
        player: PlayerId,
        /// Final rank assigned at elimination.
        rank: u32,
    },
    /// Periodic full state snapshot.
    StateUpdate {
        /// Snapshot of every board in the room.
        snapshot: RoomSnapshot,
    },
    /// The room finished; final placements are attached.
    GameOver {
        /// Final rankings, winner first.
        rankings: Vec<RankEntry>,
    },
}

/// Outbound transport seam.
///
/// Implementations must not block: the tick loop calls these while holding
/// the room lock.
pub trait Gateway: Send + Sync {
    /// Delivers an event to every socket in the room.
    fn broadcast(&self, room: &RoomCode, event: &ServerEvent);

    /// Delivers an event to a single player's socket.
    fn direct(&self, room: &RoomCode, player: PlayerId, event: &ServerEvent);
}

/// Gateway that drops everything; useful for headless simulations.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullGateway;

impl Gateway for NullGateway {
    fn broadcast(&self, _room: &RoomCode, _event: &ServerEvent) {}

    fn direct(&self, _room: &RoomCode, _player: PlayerId, _event: &ServerEvent) {}
}

/// Addressing of one outbound delivery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Audience {
    /// Every socket in the room.
    Room,
    /// A single player's socket.
    Player(PlayerId),
}

/// One delivery emitted by a [`ChannelGateway`].
#[derive(Clone, Debug, PartialEq)]
pub struct Outbound {
    /// Room the event belongs to.
    pub room: RoomCode,
    /// Who should receive the event.
    pub audience: Audience,
    /// The event payload.
    pub event: ServerEvent,
}

/// Gateway that forwards deliveries into an unbounded channel, for adapters
/// that drain events onto real sockets. Sending never blocks and delivery
/// failures are ignored, keeping tick timing independent of consumers.
#[derive(Clone, Debug)]
pub struct ChannelGateway {
    sender: mpsc::UnboundedSender<Outbound>,
}

impl ChannelGateway {
    /// Creates a gateway and the receiving half adapters drain.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Gateway for ChannelGateway {
    fn broadcast(&self, room: &RoomCode, event: &ServerEvent) {
        let _ = self.sender.send(Outbound {
            room: room.clone(),
            audience: Audience::Room,
            event: event.clone(),
        });
    }

    fn direct(&self, room: &RoomCode, player: PlayerId, event: &ServerEvent) {
        let _ = self.sender.send(Outbound {
            room: room.clone(),
            audience: Audience::Player(player),
            event: event.clone(),
        });
    }
}
