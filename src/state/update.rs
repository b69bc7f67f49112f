use indexmap::IndexMap;

use super::{
    objective::{Objective, SpawnPayload},
    session::{PlayerId, Players, SessionStatus},
};

/// Discrete notification from the fast channel.
///
/// Delivery is at-least-once, so every variant must be safe to apply twice.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// The backend started the match.
    Started,
    /// A new objective was placed.
    ObjectiveSpawned(SpawnPayload),
    /// A round was decided.
    ScoreUpdated {
        /// Player who took the round, when reported.
        winner: Option<PlayerId>,
        /// Scores after the round, possibly partial.
        scores: IndexMap<PlayerId, u32>,
        /// Round that just ended.
        round: u32,
    },
    /// Seat list changed in the lobby.
    PlayerJoined {
        /// Seated players.
        players: Players,
        /// Reported player count.
        player_count: u8,
    },
    /// Match is over.
    Ended {
        /// Winner named by the backend, when present.
        champion: Option<PlayerId>,
        /// Final scores.
        scores: IndexMap<PlayerId, u32>,
    },
}

impl GameEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::ObjectiveSpawned(_) => "objective_spawned",
            Self::ScoreUpdated { .. } => "score_updated",
            Self::PlayerJoined { .. } => "player_joined",
            Self::Ended { .. } => "ended",
        }
    }
}

/// Full authoritative room description from the slow channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    /// Display code.
    pub room_code: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Seated players.
    pub players: Players,
    /// Scores of the seated players.
    pub scores: IndexMap<PlayerId, u32>,
    /// Completed rounds.
    pub round: u32,
    /// Rounds in the match.
    pub max_rounds: u32,
    /// Players in the room.
    pub player_count: u8,
    /// Objective on screen, `None` meaning none is active.
    pub current_objective: Option<Objective>,
}

/// Anything that can move the session state forward.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomUpdate {
    /// Incremental event.
    Event(GameEvent),
    /// Full snapshot.
    Snapshot(RoomSnapshot),
}

impl From<GameEvent> for RoomUpdate {
    fn from(event: GameEvent) -> Self {
        Self::Event(event)
    }
}

impl From<RoomSnapshot> for RoomUpdate {
    fn from(snapshot: RoomSnapshot) -> Self {
        Self::Snapshot(snapshot)
    }
}
