//! Seam between the session engine and whatever hosts the rooms.

mod error;
pub mod memory;
#[cfg(feature = "parse-backend")]
pub mod parse;
mod subscription;

use futures::future::BoxFuture;

pub use self::error::{BackendError, BackendResult};
pub use self::memory::MemoryBackend;
pub use self::subscription::Subscription;

use crate::{
    dto::{EventEnvelope, RoomSnapshotDto},
    state::{PlayerId, RoomId},
};

/// Remote authority for rooms, scoring and round progression.
///
/// Implementations are cheap to clone behind an [`std::sync::Arc`] and every
/// call returns an owned future so it can be spawned.
pub trait RoomBackend: Send + Sync {
    /// Create the room `code`, or join it when it already exists.
    fn create_or_join_room(&self, code: String) -> BoxFuture<'static, BackendResult<RoomId>>;
    /// Join an existing room; fails when it is missing or full.
    fn join_existing_room(&self, code: String) -> BoxFuture<'static, BackendResult<RoomId>>;
    /// Fetch the full room state.
    fn fetch_snapshot(&self, room_id: RoomId) -> BoxFuture<'static, BackendResult<RoomSnapshotDto>>;
    /// Open the event channel of a room.
    fn subscribe_events(
        &self,
        room_id: RoomId,
    ) -> BoxFuture<'static, BackendResult<Subscription<EventEnvelope>>>;
    /// Open the room update channel.
    fn subscribe_snapshots(
        &self,
        room_id: RoomId,
    ) -> BoxFuture<'static, BackendResult<Subscription<RoomSnapshotDto>>>;
    /// Report that `player_id` hit `objective_id`.
    fn submit_hit(
        &self,
        room_id: RoomId,
        objective_id: String,
        player_id: PlayerId,
    ) -> BoxFuture<'static, BackendResult<()>>;
}
