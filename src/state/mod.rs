//! Session model and the rules that keep it consistent with the backend.

mod cell;
mod objective;
mod outcome;
mod reconcile;
mod session;
mod update;

pub use self::cell::{Applied, SessionCell};
pub use self::objective::{Objective, ReferenceCanvas, SpawnPayload};
pub use self::outcome::{GameEnded, MatchOutcome, MatchResult};
pub use self::reconcile::{Reconciled, reconcile};
pub use self::session::{
    DEFAULT_MAX_ROUNDS, LobbyPhase, PlayerId, Players, ROOM_CAPACITY, RoomId, Seat, SessionState,
    SessionStatus,
};
pub use self::update::{GameEvent, RoomSnapshot, RoomUpdate};
