use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::debug;

use super::{
    outcome::GameEnded,
    reconcile::{Reconciled, reconcile},
    session::{SessionState, SessionStatus},
    update::RoomUpdate,
};

/// What an accepted update left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// Status after the update.
    pub status: SessionStatus,
    /// End-of-match result, reported at most once per cell.
    pub ended: Option<GameEnded>,
    /// Whether the stored state actually changed.
    pub changed: bool,
}

/// Single-writer holder of the session state.
///
/// Every producer goes through [`SessionCell::apply`], which runs the
/// reconciler while holding the watch channel's write lock. Readers never see
/// a half-applied update, and nothing is accepted after [`SessionCell::close`].
pub struct SessionCell {
    state: watch::Sender<SessionState>,
    closed: AtomicBool,
    end_reported: AtomicBool,
}

impl SessionCell {
    /// Create a cell seeded with `initial`.
    pub fn new(initial: SessionState) -> Self {
        let (state, _rx) = watch::channel(initial);
        Self {
            state,
            closed: AtomicBool::new(false),
            end_reported: AtomicBool::new(false),
        }
    }

    /// Merge `update` into the current state.
    ///
    /// Returns `None` when the cell is closed and the update was discarded.
    pub fn apply(&self, update: impl Into<RoomUpdate>) -> Option<Applied> {
        self.apply_if(|_| true, update)
    }

    /// Merge `update` only if `accept` holds for the state it would replace.
    ///
    /// The check runs under the same write lock as the merge, so no other
    /// producer can slip in between. Returns `None` when the cell is closed or
    /// `accept` refused the update.
    pub fn apply_if<P>(&self, accept: P, update: impl Into<RoomUpdate>) -> Option<Applied>
    where
        P: FnOnce(&SessionState) -> bool,
    {
        let update = update.into();
        let mut applied = None;
        let mut refused = false;
        self.state.send_if_modified(|state| {
            if self.closed.load(Ordering::Acquire) {
                return false;
            }
            if !accept(state) {
                refused = true;
                return false;
            }
            let Reconciled { state: next, ended } = reconcile(state, update);
            let changed = *state != next;
            *state = next;
            // Duplicate end events must not surface the result twice.
            let ended = ended.filter(|_| !self.end_reported.swap(true, Ordering::AcqRel));
            applied = Some(Applied {
                status: state.status,
                ended,
                changed,
            });
            changed
        });
        if refused {
            debug!("update refused by its precondition");
        } else if applied.is_none() {
            debug!("update discarded after close");
        }
        applied
    }

    /// Clone of the current state.
    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Current status without cloning the whole state.
    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status
    }

    /// Receiver notified after every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Refuse all further updates. Idempotent.
    pub fn close(&self) {
        // Taken under the write lock so no apply straddles the close.
        self.state.send_if_modified(|_| {
            self.closed.store(true, Ordering::Release);
            false
        });
    }

    /// Whether [`SessionCell::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use indexmap::IndexMap;

    use super::*;
    use crate::state::{
        session::Players,
        update::{GameEvent, RoomSnapshot},
    };

    fn joined() -> GameEvent {
        GameEvent::PlayerJoined {
            players: Players::pair("A", "B"),
            player_count: 2,
        }
    }

    fn lobby_snapshot() -> RoomSnapshot {
        RoomSnapshot {
            room_code: "4821".into(),
            status: SessionStatus::Lobby,
            players: Players::pair("A", "B"),
            scores: IndexMap::new(),
            round: 0,
            max_rounds: 5,
            player_count: 2,
            current_objective: None,
        }
    }

    fn ended() -> GameEvent {
        GameEvent::Ended {
            champion: Some("A".into()),
            scores: IndexMap::from([("A".to_string(), 3), ("B".to_string(), 1)]),
        }
    }

    #[test]
    fn apply_reports_change_and_notifies_watchers() {
        let cell = SessionCell::new(SessionState::placeholder("A"));
        let mut rx = cell.subscribe();

        let applied = cell.apply(joined()).expect("open cell accepts updates");
        assert!(applied.changed);
        assert_eq!(applied.status, SessionStatus::Lobby);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().player_count, 2);

        let again = cell.apply(joined()).expect("open cell accepts updates");
        assert!(!again.changed);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn end_result_is_reported_once() {
        let cell = SessionCell::new(SessionState::placeholder("A"));
        cell.apply(joined());

        let first = cell.apply(ended()).unwrap();
        assert_eq!(first.status, SessionStatus::Finished);
        assert_eq!(first.ended.map(|e| e.winner_id), Some("A".to_string()));

        let duplicate = cell.apply(ended()).unwrap();
        assert_eq!(duplicate.ended, None);
    }

    #[test]
    fn closed_cell_discards_updates() {
        let cell = SessionCell::new(SessionState::placeholder("A"));
        cell.close();
        cell.close();

        assert!(cell.is_closed());
        assert_eq!(cell.apply(GameEvent::Started), None);
        assert_eq!(cell.status(), SessionStatus::Lobby);
    }

    #[test]
    fn conditional_apply_checks_the_state_it_replaces() {
        let cell = SessionCell::new(SessionState::placeholder("A"));
        cell.apply(GameEvent::Started);

        let in_lobby = |state: &SessionState| !state.status.is_past_lobby();
        assert_eq!(cell.apply_if(in_lobby, lobby_snapshot()), None);
        assert_eq!(cell.current().player_count, 1);
        assert_eq!(cell.status(), SessionStatus::InGame);

        let fresh = SessionCell::new(SessionState::placeholder("A"));
        let applied = fresh.apply_if(in_lobby, lobby_snapshot()).unwrap();
        assert!(applied.changed);
        assert_eq!(fresh.current().player_count, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn lobby_update_never_reverts_a_concurrent_start() {
        for _ in 0..200 {
            let cell = Arc::new(SessionCell::new(SessionState::placeholder("A")));
            let starter = {
                let cell = cell.clone();
                tokio::spawn(async move { cell.apply(GameEvent::Started) })
            };
            let poller = {
                let cell = cell.clone();
                tokio::spawn(async move {
                    cell.apply_if(|state| !state.status.is_past_lobby(), lobby_snapshot())
                })
            };
            starter.await.unwrap();
            poller.await.unwrap();
            assert_eq!(cell.status(), SessionStatus::InGame);
        }
    }

    #[tokio::test]
    async fn concurrent_producers_are_serialized() {
        let cell = Arc::new(SessionCell::new(SessionState::placeholder("A")));
        cell.apply(joined());

        let mut handles = Vec::new();
        for score in 0..64u32 {
            let cell = cell.clone();
            handles.push(tokio::spawn(async move {
                cell.apply(GameEvent::ScoreUpdated {
                    winner: None,
                    scores: IndexMap::from([("A".to_string(), score), ("B".to_string(), score)]),
                    round: score,
                })
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let state = cell.current();
        // Both entries always come from the same update.
        assert_eq!(state.score_of("A"), state.score_of("B"));
        assert_eq!(state.round, 0);
    }
}
