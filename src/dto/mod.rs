//! Backend payloads and their conversion into domain values.

use std::time::SystemTime;

pub mod event;
mod lenient;
pub mod snapshot;

pub use self::event::{EventEnvelope, SpawnPayloadDto};
pub use self::snapshot::RoomSnapshotDto;

use crate::{
    error::WireError,
    state::{GameEvent, PlayerId, ReferenceCanvas, RoomSnapshot},
};

/// Decoding context shared by every payload of one session.
#[derive(Debug, Clone)]
pub struct WireDecoder {
    canvas: ReferenceCanvas,
    local_player: PlayerId,
}

impl WireDecoder {
    /// Decoder attaching `canvas` to bare spawns and using `local_player` as
    /// the seat placeholder.
    pub fn new(canvas: ReferenceCanvas, local_player: impl Into<PlayerId>) -> Self {
        Self {
            canvas,
            local_player: local_player.into(),
        }
    }

    /// Player the decoder fills empty seat lists with.
    pub fn local_player(&self) -> &str {
        &self.local_player
    }

    /// Decode an event received now.
    pub fn event(&self, envelope: &EventEnvelope) -> Result<GameEvent, WireError> {
        self.event_at(envelope, SystemTime::now())
    }

    /// Decode an event received at `received_at`.
    pub fn event_at(
        &self,
        envelope: &EventEnvelope,
        received_at: SystemTime,
    ) -> Result<GameEvent, WireError> {
        envelope.decode(self.canvas, &self.local_player, received_at)
    }

    /// Decode a snapshot received now.
    pub fn snapshot(&self, dto: &RoomSnapshotDto) -> RoomSnapshot {
        self.snapshot_at(dto, SystemTime::now())
    }

    /// Decode a snapshot received at `received_at`.
    pub fn snapshot_at(&self, dto: &RoomSnapshotDto, received_at: SystemTime) -> RoomSnapshot {
        dto.to_snapshot(self.canvas, &self.local_player, received_at)
    }
}
