use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{DefaultOnError, serde_as};
use tracing::debug;

use crate::{
    dto::lenient,
    error::WireError,
    state::{GameEvent, Players, ReferenceCanvas, SpawnPayload},
};

/// Event kinds understood by this client, as spelled on the wire.
pub const START: &str = "START";
/// See [`START`].
pub const SPAWN: &str = "SPAWN";
/// See [`START`].
pub const SCORE: &str = "SCORE";
/// See [`START`].
pub const END: &str = "END";
/// See [`START`].
pub const PLAYER_JOINED: &str = "PLAYER_JOINED";

/// Event record as stored by the backend: a type tag and a free-form payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Event type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific payload; absent payloads read as `null`.
    #[serde(default)]
    pub payload: Value,
    /// Backend object id, when the transport exposes one.
    #[serde(default, rename = "objectId", skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    /// Backend creation timestamp, when the transport exposes one.
    #[serde(default, rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Spawn coordinates in reference-canvas pixels.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnPayloadDto {
    /// Identifier to echo back on a hit.
    #[serde(default)]
    pub spawn_id: Value,
    /// Center x.
    #[serde(default)]
    pub cx: Value,
    /// Center y.
    #[serde(default)]
    pub cy: Value,
    /// Radius.
    #[serde(default)]
    pub r: Value,
    /// Coordinate space, when the backend states it.
    #[serde_as(as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas: Option<ReferenceCanvas>,
}

impl SpawnPayloadDto {
    /// Spawn expressed against `canvas`.
    pub fn new(spawn_id: impl Into<String>, cx: f64, cy: f64, r: f64) -> Self {
        Self {
            spawn_id: Value::String(spawn_id.into()),
            cx: cx.into(),
            cy: cy.into(),
            r: r.into(),
            canvas: None,
        }
    }

    /// Resolve into a [`SpawnPayload`], attaching `fallback` when no canvas was sent.
    pub(crate) fn resolve(
        &self,
        fallback: ReferenceCanvas,
        received_at: SystemTime,
    ) -> Result<SpawnPayload, WireError> {
        let missing = |field| WireError::MissingField {
            event: SPAWN,
            field,
        };
        let canvas = self
            .canvas
            .filter(ReferenceCanvas::is_valid)
            .unwrap_or(fallback);
        Ok(SpawnPayload {
            spawn_id: lenient::text(&self.spawn_id).ok_or_else(|| missing("spawnId"))?,
            cx: lenient::float(&self.cx).ok_or_else(|| missing("cx"))?,
            cy: lenient::float(&self.cy).ok_or_else(|| missing("cy"))?,
            r: lenient::float(&self.r).ok_or_else(|| missing("r"))?,
            canvas,
            received_at,
        })
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
struct ScorePayload {
    #[serde(default)]
    winner: Value,
    #[serde(default)]
    champion: Value,
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    score: IndexMap<String, Value>,
    #[serde(default)]
    round: Value,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerJoinedPayload {
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    players: Option<Vec<Value>>,
    #[serde(default)]
    player_count: Value,
}

impl EventEnvelope {
    /// Envelope with the given tag and payload.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            object_id: None,
            created_at: None,
        }
    }

    /// Decode into a domain event.
    ///
    /// `canvas` is attached to spawns that do not carry their own, and
    /// `local_player` fills an empty seat list.
    pub fn decode(
        &self,
        canvas: ReferenceCanvas,
        local_player: &str,
        received_at: SystemTime,
    ) -> Result<GameEvent, WireError> {
        match self.kind.as_str() {
            START => Ok(GameEvent::Started),
            SPAWN => {
                let spawn = SpawnPayloadDto::deserialize(&self.payload)?;
                Ok(GameEvent::ObjectiveSpawned(spawn.resolve(canvas, received_at)?))
            }
            SCORE => {
                let payload = self.payload_or_default::<ScorePayload>()?;
                Ok(GameEvent::ScoreUpdated {
                    winner: lenient::text(&payload.winner),
                    scores: lenient::scores(&payload.score),
                    round: lenient::count(&payload.round).unwrap_or(0),
                })
            }
            END => {
                let payload = self.payload_or_default::<ScorePayload>()?;
                Ok(GameEvent::Ended {
                    champion: lenient::text(&payload.champion),
                    scores: lenient::scores(&payload.score),
                })
            }
            PLAYER_JOINED => {
                let payload = self.payload_or_default::<PlayerJoinedPayload>()?;
                let ids = payload
                    .players
                    .as_deref()
                    .map(lenient::ids)
                    .filter(|ids| !ids.is_empty())
                    .ok_or(WireError::MissingField {
                        event: PLAYER_JOINED,
                        field: "players",
                    })?;
                let players = Players::from_list(ids, local_player);
                let reported = lenient::count(&payload.player_count);
                if reported.is_some_and(|count| count != u32::from(players.len())) {
                    debug!(
                        reported,
                        listed = players.len(),
                        "player count disagrees with the player list; trusting the list"
                    );
                }
                Ok(GameEvent::PlayerJoined {
                    player_count: players.len(),
                    players,
                })
            }
            other => Err(WireError::UnknownEventType(other.to_string())),
        }
    }

    fn payload_or_default<T>(&self) -> Result<T, WireError>
    where
        T: Default + for<'de> Deserialize<'de>,
    {
        if self.payload.is_null() {
            return Ok(T::default());
        }
        Ok(T::deserialize(&self.payload)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn decode(value: Value) -> Result<GameEvent, WireError> {
        let envelope: EventEnvelope = serde_json::from_value(value).unwrap();
        envelope.decode(ReferenceCanvas::V1, "me", SystemTime::UNIX_EPOCH)
    }

    #[test]
    fn start_ignores_payload() {
        assert_eq!(decode(json!({"type": "START"})).unwrap(), GameEvent::Started);
    }

    #[test]
    fn spawn_attaches_reference_canvas() {
        let event = decode(json!({
            "type": "SPAWN",
            "payload": {"spawnId": "s9", "cx": 540, "cy": "960", "r": 108.0}
        }))
        .unwrap();
        let GameEvent::ObjectiveSpawned(spawn) = event else {
            panic!("unexpected event: {event:?}");
        };
        assert_eq!(spawn.spawn_id, "s9");
        assert_eq!(spawn.cy, 960.0);
        assert_eq!(spawn.canvas, ReferenceCanvas::V1);
    }

    #[test]
    fn spawn_keeps_its_own_canvas() {
        let event = decode(json!({
            "type": "SPAWN",
            "payload": {
                "spawnId": "s9", "cx": 1, "cy": 1, "r": 1,
                "canvas": {"version": 2, "width": 720.0, "height": 1280.0}
            }
        }))
        .unwrap();
        let GameEvent::ObjectiveSpawned(spawn) = event else {
            panic!("unexpected event: {event:?}");
        };
        assert_eq!(spawn.canvas.version, 2);
    }

    #[test]
    fn spawn_without_id_is_rejected() {
        let err = decode(json!({"type": "SPAWN", "payload": {"cx": 1, "cy": 1, "r": 1}}))
            .unwrap_err();
        assert!(matches!(
            err,
            WireError::MissingField {
                event: SPAWN,
                field: "spawnId"
            }
        ));
    }

    #[test]
    fn score_defaults_missing_fields() {
        let event = decode(json!({
            "type": "SCORE",
            "payload": {"winner": "A", "score": {"A": 3, "B": -1}}
        }))
        .unwrap();
        assert_eq!(
            event,
            GameEvent::ScoreUpdated {
                winner: Some("A".into()),
                scores: IndexMap::from([("A".to_string(), 3), ("B".to_string(), 0)]),
                round: 0,
            }
        );
    }

    #[test]
    fn end_with_malformed_scores_reads_empty() {
        let event = decode(json!({"type": "END", "payload": {"champion": "", "score": [1, 2]}}))
            .unwrap();
        assert_eq!(
            event,
            GameEvent::Ended {
                champion: None,
                scores: IndexMap::new(),
            }
        );
    }

    #[test]
    fn player_joined_trusts_the_list() {
        let event = decode(json!({
            "type": "PLAYER_JOINED",
            "payload": {"playerCount": 5, "players": ["A", "B"]}
        }))
        .unwrap();
        assert_eq!(
            event,
            GameEvent::PlayerJoined {
                players: Players::pair("A", "B"),
                player_count: 2,
            }
        );
    }

    #[test]
    fn player_joined_requires_players() {
        for payload in [json!({"playerCount": 2}), json!({"players": "A"}), json!({"players": []})] {
            let err = decode(json!({"type": "PLAYER_JOINED", "payload": payload})).unwrap_err();
            assert!(matches!(err, WireError::MissingField { field: "players", .. }));
        }
    }

    #[test]
    fn unknown_type_is_reported() {
        let err = decode(json!({"type": "PAUSE"})).unwrap_err();
        assert!(matches!(err, WireError::UnknownEventType(kind) if kind == "PAUSE"));
    }
}
