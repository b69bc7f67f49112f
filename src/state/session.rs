use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::objective::Objective;

/// Identifier of a player account on the backend.
pub type PlayerId = String;
/// Backend identifier of a room (not the 4-digit display code).
pub type RoomId = String;

/// Round budget assumed when the backend omits it.
pub const DEFAULT_MAX_ROUNDS: u32 = 5;
/// Players a room can hold.
pub const ROOM_CAPACITY: u8 = 2;

/// Lifecycle of a room as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Waiting for the second player or for the start signal.
    Lobby,
    /// Rounds are being played.
    InGame,
    /// Final scores are known.
    Finished,
}

impl SessionStatus {
    /// Parse the backend's status string.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "lobby" => Some(Self::Lobby),
            "in_game" => Some(Self::InGame),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }

    /// Backend spelling of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::InGame => "in_game",
            Self::Finished => "finished",
        }
    }

    /// Whether game truth is already flowing (the lobby poller is no longer needed).
    pub fn is_past_lobby(&self) -> bool {
        !matches!(self, Self::Lobby)
    }
}

/// Ordered pair of seats; the second one stays empty until someone joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Players {
    first: PlayerId,
    second: Option<PlayerId>,
}

impl Players {
    /// Room holding a single player.
    pub fn solo(first: impl Into<PlayerId>) -> Self {
        Self {
            first: first.into(),
            second: None,
        }
    }

    /// Room holding both players.
    pub fn pair(first: impl Into<PlayerId>, second: impl Into<PlayerId>) -> Self {
        Self {
            first: first.into(),
            second: Some(second.into()),
        }
    }

    /// Build from a backend list, keeping at most two entries.
    ///
    /// An empty list yields `placeholder` in the first seat.
    pub fn from_list<I>(list: I, placeholder: &str) -> Self
    where
        I: IntoIterator<Item = PlayerId>,
    {
        let mut ids = list.into_iter().filter(|id| !id.is_empty());
        let first = ids.next().unwrap_or_else(|| placeholder.to_string());
        Self {
            first,
            second: ids.next(),
        }
    }

    /// Player in the first seat (the room creator).
    pub fn first(&self) -> &str {
        &self.first
    }

    /// Player in the second seat, if any.
    pub fn second(&self) -> Option<&str> {
        self.second.as_deref()
    }

    /// Seated players in seat order.
    pub fn iter(&self) -> impl Iterator<Item = &PlayerId> {
        std::iter::once(&self.first).chain(self.second.iter())
    }

    /// Number of occupied seats.
    pub fn len(&self) -> u8 {
        1 + u8::from(self.second.is_some())
    }

    /// Always false; the first seat is never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `player` holds one of the seats.
    pub fn contains(&self, player: &str) -> bool {
        self.iter().any(|id| id == player)
    }
}

/// Which seat a player occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat {
    /// Room creator.
    First,
    /// Player who joined.
    Second,
}

/// Sub-state shown while the room is still in the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyPhase {
    /// Fewer than two players are present.
    WaitingForPlayers,
    /// Both seats are taken; the start event is pending.
    RoomFull,
}

/// Local view of one room.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// Display code, fixed once known.
    pub room_code: String,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Seated players.
    pub players: Players,
    /// Score per seated player.
    pub scores: IndexMap<PlayerId, u32>,
    /// Target currently on screen.
    pub current_objective: Option<Objective>,
    /// Rounds completed according to the last snapshot.
    pub round: u32,
    /// Rounds in the match.
    pub max_rounds: u32,
    /// Players the backend reports in the room.
    pub player_count: u8,
}

impl SessionState {
    /// State used before the first snapshot arrives: a lobby holding only the
    /// local player.
    pub fn placeholder(local_player: impl Into<PlayerId>) -> Self {
        let players = Players::solo(local_player);
        let scores = players.iter().map(|id| (id.clone(), 0)).collect();
        Self {
            room_code: String::new(),
            status: SessionStatus::Lobby,
            players,
            scores,
            current_objective: None,
            round: 0,
            max_rounds: DEFAULT_MAX_ROUNDS,
            player_count: 0,
        }
    }

    /// Score of `player`, zero when unknown.
    pub fn score_of(&self, player: &str) -> u32 {
        self.scores.get(player).copied().unwrap_or(0)
    }

    /// Seat held by `player`, if seated.
    pub fn seat_of(&self, player: &str) -> Option<Seat> {
        if self.players.first() == player {
            Some(Seat::First)
        } else if self.players.second() == Some(player) {
            Some(Seat::Second)
        } else {
            None
        }
    }

    /// The other seated player, from `player`'s point of view.
    pub fn opponent_of(&self, player: &str) -> Option<&str> {
        match self.seat_of(player)? {
            Seat::First => self.players.second(),
            Seat::Second => Some(self.players.first()),
        }
    }

    /// Lobby sub-state, `None` once the game started.
    pub fn lobby_phase(&self) -> Option<LobbyPhase> {
        if self.status != SessionStatus::Lobby {
            return None;
        }
        if self.player_count >= ROOM_CAPACITY {
            Some(LobbyPhase::RoomFull)
        } else {
            Some(LobbyPhase::WaitingForPlayers)
        }
    }
}
