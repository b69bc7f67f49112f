//! Pure merge of the local session state with one incoming update.
//!
//! Snapshots are the only input allowed to replace or remove the active
//! objective and the round counter. Events touch just the fields they name.

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::{
    objective::{Objective, SpawnPayload},
    outcome::GameEnded,
    session::{PlayerId, Players, ROOM_CAPACITY, SessionState, SessionStatus},
    update::{GameEvent, RoomSnapshot, RoomUpdate},
};

/// Result of one reconciliation step.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    /// Next session state.
    pub state: SessionState,
    /// Set when the update ended the match.
    pub ended: Option<GameEnded>,
}

impl Reconciled {
    fn quiet(state: SessionState) -> Self {
        Self { state, ended: None }
    }
}

/// Compute the state that follows `previous` once `update` is applied.
pub fn reconcile(previous: &SessionState, update: RoomUpdate) -> Reconciled {
    match update {
        RoomUpdate::Snapshot(snapshot) => Reconciled::quiet(apply_snapshot(previous, snapshot)),
        RoomUpdate::Event(event) => apply_event(previous, event),
    }
}

fn apply_snapshot(previous: &SessionState, snapshot: RoomSnapshot) -> SessionState {
    let RoomSnapshot {
        room_code,
        status,
        players,
        scores,
        round,
        max_rounds,
        player_count,
        current_objective,
    } = snapshot;

    let current_objective = match (current_objective, &previous.current_objective) {
        _ if status == SessionStatus::Finished => None,
        // Same target re-announced: keep its local age so the timer does not restart.
        (Some(next), Some(existing)) if next.id == existing.id => Some(Objective {
            created_at: existing.created_at,
            ..next
        }),
        (next, _) => next,
    };

    let room_code = if previous.room_code.is_empty() {
        room_code
    } else {
        previous.room_code.clone()
    };
    let max_rounds = max_rounds.max(1);

    SessionState {
        room_code,
        status,
        scores: seat_scores(&players, |id| scores.get(id).copied().unwrap_or(0)),
        players,
        current_objective,
        round: round.min(max_rounds),
        max_rounds,
        player_count: player_count.min(ROOM_CAPACITY),
    }
}

fn apply_event(previous: &SessionState, event: GameEvent) -> Reconciled {
    let mut next = previous.clone();
    match event {
        GameEvent::Started => {
            if previous.status == SessionStatus::Finished {
                debug!("ignoring start event for a finished session");
            } else {
                next.status = SessionStatus::InGame;
            }
        }
        GameEvent::ObjectiveSpawned(spawn) => {
            next.current_objective = spawned_objective(previous, &spawn);
        }
        GameEvent::ScoreUpdated { scores, round, .. } => {
            debug!(round, "round scored; objective kept until the next snapshot");
            // Players the event names are kept even before they are seated.
            let mut merged = seat_scores(&previous.players, |id| previous.score_of(id));
            for (id, score) in previous.scores.iter().chain(&scores) {
                merged.insert(id.clone(), *score);
            }
            next.scores = merged;
        }
        GameEvent::PlayerJoined {
            players,
            player_count,
        } => {
            next.scores = seat_scores(&players, |id| previous.score_of(id));
            next.players = players;
            next.player_count = player_count.min(ROOM_CAPACITY);
        }
        GameEvent::Ended { champion, scores } => {
            let ended = settle(previous, champion, &scores);
            next.status = SessionStatus::Finished;
            next.current_objective = None;
            next.scores = seat_scores(&previous.players, |id| final_score(previous, &scores, id));
            return Reconciled {
                state: next,
                ended: Some(ended),
            };
        }
    }
    Reconciled::quiet(next)
}

fn spawned_objective(previous: &SessionState, spawn: &SpawnPayload) -> Option<Objective> {
    match &previous.current_objective {
        Some(existing) if existing.id == spawn.spawn_id => {
            debug!(objective_id = %spawn.spawn_id, "duplicate spawn ignored");
            Some(existing.clone())
        }
        _ => Some(Objective::from_spawn(spawn)),
    }
}

fn seat_scores<F>(players: &Players, mut score: F) -> IndexMap<PlayerId, u32>
where
    F: FnMut(&str) -> u32,
{
    players.iter().map(|id| (id.clone(), score(id))).collect()
}

fn final_score(previous: &SessionState, finals: &IndexMap<PlayerId, u32>, id: &str) -> u32 {
    finals
        .get(id)
        .copied()
        .unwrap_or_else(|| previous.score_of(id))
}

/// Decide the winner of a finished match.
///
/// The backend's champion is trusted when it holds a top score. Otherwise the
/// top scorer wins; ties go to the earlier seat, then to the earlier entry of
/// the final score map.
fn settle(
    previous: &SessionState,
    champion: Option<PlayerId>,
    finals: &IndexMap<PlayerId, u32>,
) -> GameEnded {
    let mut candidates: Vec<&str> = previous.players.iter().map(String::as_str).collect();
    candidates.extend(
        finals
            .keys()
            .map(String::as_str)
            .filter(|id| !previous.players.contains(id)),
    );

    let score = |id: &str| final_score(previous, finals, id);
    let top = candidates.iter().map(|id| score(*id)).max().unwrap_or(0);
    let top_scorer = candidates
        .iter()
        .copied()
        .find(|id| score(*id) == top)
        .unwrap_or(previous.players.first());

    let winner_id = match champion.filter(|id| !id.is_empty()) {
        Some(id) if score(id.as_str()) >= top => id,
        Some(id) => {
            warn!(
                champion = %id,
                top_scorer,
                "champion does not hold the top score; crediting the top scorer"
            );
            top_scorer.to_string()
        }
        None => top_scorer.to_string(),
    };

    let winner_score = score(winner_id.as_str());
    let loser_score = candidates
        .iter()
        .filter(|id| **id != winner_id)
        .map(|id| score(*id))
        .max()
        .unwrap_or(0);

    GameEnded {
        winner_id,
        winner_score,
        loser_score,
    }
}
