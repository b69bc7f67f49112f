use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{DefaultOnError, serde_as};
use tracing::debug;

use crate::{
    dto::{event::SpawnPayloadDto, lenient},
    state::{
        DEFAULT_MAX_ROUNDS, Objective, Players, ROOM_CAPACITY, ReferenceCanvas, RoomSnapshot,
        SessionStatus,
    },
};

/// Room document as returned by the state fetch and pushed on room updates.
///
/// Every field is optional on the wire; unreadable values fall back to the
/// defaults applied in [`RoomSnapshotDto::to_snapshot`].
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshotDto {
    /// Backend room id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    /// Display code.
    #[serde(default)]
    pub code: Value,
    /// Lifecycle status. Stored rooms call it `state`.
    #[serde_as(as = "DefaultOnError")]
    #[serde(default, alias = "state")]
    pub status: Option<String>,
    /// Seated players in seat order.
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    pub players: Option<Vec<Value>>,
    /// Score per player.
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    pub score: IndexMap<String, Value>,
    /// Completed rounds.
    #[serde(default)]
    pub round: Value,
    /// Rounds in the match.
    #[serde(default)]
    pub max_rounds: Value,
    /// Players in the room.
    #[serde(default)]
    pub player_count: Value,
    /// Objective currently on screen.
    #[serde_as(as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_spawn: Option<SpawnPayloadDto>,
    /// Last modification time, used to detect changes.
    #[serde_as(as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl RoomSnapshotDto {
    /// Lobby room with the given code and seat list.
    pub fn lobby(code: impl Into<String>, players: &[&str]) -> Self {
        Self {
            code: Value::String(code.into()),
            status: Some(SessionStatus::Lobby.as_str().into()),
            players: Some(players.iter().map(|id| Value::from(*id)).collect()),
            score: players.iter().map(|id| (id.to_string(), Value::from(0))).collect(),
            round: Value::from(0),
            max_rounds: Value::from(DEFAULT_MAX_ROUNDS),
            player_count: Value::from(players.len()),
            ..Self::default()
        }
    }

    /// Status as understood by this client; unknown or missing reads as lobby.
    pub fn session_status(&self) -> SessionStatus {
        self.status
            .as_deref()
            .and_then(SessionStatus::from_wire)
            .unwrap_or(SessionStatus::Lobby)
    }

    /// Reported player count, or the listed player count when a list is present.
    pub fn reported_player_count(&self) -> u8 {
        let listed = self.listed_players();
        if !listed.is_empty() {
            return listed.len().min(usize::from(ROOM_CAPACITY)) as u8;
        }
        lenient::count(&self.player_count)
            .unwrap_or(0)
            .min(u32::from(ROOM_CAPACITY)) as u8
    }

    fn listed_players(&self) -> Vec<String> {
        self.players.as_deref().map(lenient::ids).unwrap_or_default()
    }

    /// Convert into the domain snapshot.
    pub fn to_snapshot(
        &self,
        canvas: ReferenceCanvas,
        local_player: &str,
        received_at: SystemTime,
    ) -> RoomSnapshot {
        let status = self.session_status();
        let max_rounds = lenient::count(&self.max_rounds)
            .filter(|rounds| *rounds > 0)
            .unwrap_or(DEFAULT_MAX_ROUNDS);
        let current_objective = match (&self.last_spawn, status) {
            (_, SessionStatus::Finished) | (None, _) => None,
            (Some(spawn), _) => match spawn.resolve(canvas, received_at) {
                Ok(spawn) => Some(Objective::from_spawn(&spawn)),
                Err(err) => {
                    debug!(error = %err, "ignoring unreadable lastSpawn");
                    None
                }
            },
        };

        RoomSnapshot {
            room_code: lenient::text(&self.code).unwrap_or_default(),
            status,
            players: Players::from_list(self.listed_players(), local_player),
            scores: lenient::scores(&self.score),
            round: lenient::count(&self.round).unwrap_or(0).min(max_rounds),
            max_rounds,
            player_count: self.reported_player_count(),
            current_objective,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn snapshot(value: Value) -> RoomSnapshot {
        let dto: RoomSnapshotDto = serde_json::from_value(value).unwrap();
        dto.to_snapshot(ReferenceCanvas::V1, "me", SystemTime::UNIX_EPOCH)
    }

    #[test]
    fn empty_document_reads_as_placeholder_lobby() {
        let snapshot = snapshot(json!({}));
        assert_eq!(snapshot.status, SessionStatus::Lobby);
        assert_eq!(snapshot.players, Players::solo("me"));
        assert_eq!(snapshot.max_rounds, DEFAULT_MAX_ROUNDS);
        assert_eq!(snapshot.player_count, 0);
        assert_eq!(snapshot.current_objective, None);
    }

    #[test]
    fn stored_room_uses_state_key() {
        let snapshot = snapshot(json!({
            "objectId": "r1",
            "code": 4821,
            "state": "in_game",
            "players": ["A", "B"],
            "score": {"A": "2", "B": 1},
            "round": 3,
            "maxRounds": 5,
            "playerCount": 2
        }));
        assert_eq!(snapshot.room_code, "4821");
        assert_eq!(snapshot.status, SessionStatus::InGame);
        assert_eq!(snapshot.players, Players::pair("A", "B"));
        assert_eq!(snapshot.scores.get("A"), Some(&2));
        assert_eq!(snapshot.round, 3);
    }

    #[test]
    fn player_count_follows_the_list_when_present() {
        let counted = snapshot(json!({"status": "lobby", "playerCount": 1}));
        assert_eq!(counted.player_count, 1);

        let listed = snapshot(json!({"playerCount": 1, "players": ["A", "B", "C"]}));
        assert_eq!(listed.player_count, 2);
    }

    #[test]
    fn rounds_are_bounded() {
        let snapshot = snapshot(json!({"round": 9, "maxRounds": 0, "status": "paused"}));
        assert_eq!(snapshot.max_rounds, DEFAULT_MAX_ROUNDS);
        assert_eq!(snapshot.round, DEFAULT_MAX_ROUNDS);
        assert_eq!(snapshot.status, SessionStatus::Lobby);
    }

    #[test]
    fn last_spawn_becomes_objective_until_finished() {
        let spawn = json!({"spawnId": "s1", "cx": 540, "cy": 960, "r": 108});
        let live = snapshot(json!({"status": "in_game", "lastSpawn": spawn}));
        let objective = live.current_objective.unwrap();
        assert_eq!(objective.id, "s1");
        assert_eq!(objective.normalized_x, 0.5);

        let done = snapshot(json!({"status": "finished", "lastSpawn": spawn}));
        assert_eq!(done.current_objective, None);

        let broken = snapshot(json!({"status": "in_game", "lastSpawn": {"cx": 1}}));
        assert_eq!(broken.current_objective, None);
    }
}
