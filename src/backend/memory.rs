//! In-process backend holding rooms in memory.
//!
//! Rooms are scripted by the caller: events and snapshots are published
//! explicitly, and fetch or hit failures can be injected. Scoring is never
//! computed here.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
};

use dashmap::DashMap;
use futures::{
    future::{self, BoxFuture},
    stream::StreamExt,
};
use serde_json::json;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;
use uuid::Uuid;

use super::{BackendError, BackendResult, RoomBackend, Subscription};
use crate::{
    dto::{EventEnvelope, RoomSnapshotDto, event::PLAYER_JOINED},
    state::{PlayerId, ROOM_CAPACITY, RoomId},
};

const CHANNEL_CAPACITY: usize = 64;

/// Hit reported through [`RoomBackend::submit_hit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitRecord {
    /// Room the hit was sent to.
    pub room_id: RoomId,
    /// Objective the player claims to have hit.
    pub objective_id: String,
    /// Reporting player.
    pub player_id: PlayerId,
}

struct Room {
    snapshot: RoomSnapshotDto,
    events: broadcast::Sender<EventEnvelope>,
    snapshots: broadcast::Sender<RoomSnapshotDto>,
}

impl Room {
    fn new(snapshot: RoomSnapshotDto) -> Self {
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (snapshots, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            snapshot,
            events,
            snapshots,
        }
    }
}

#[derive(Default)]
struct Inner {
    rooms: DashMap<RoomId, Room>,
    codes: DashMap<String, RoomId>,
    fetches: AtomicUsize,
    failing_fetches: AtomicU32,
    reject_hits: AtomicBool,
    live_subscriptions: Arc<AtomicUsize>,
    hits: Mutex<Vec<HitRecord>>,
}

/// [`RoomBackend`] kept entirely in process memory.
///
/// Clones share the same rooms. [`MemoryBackend::as_player`] yields a handle
/// acting on behalf of another player, the way separate devices would.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
    player: Option<PlayerId>,
}

impl MemoryBackend {
    /// Empty backend with no acting player.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle sharing this backend's rooms, acting as `player`.
    pub fn as_player(&self, player: impl Into<PlayerId>) -> Self {
        Self {
            inner: self.inner.clone(),
            player: Some(player.into()),
        }
    }

    /// Register a room with the given initial document and return its id.
    pub fn open_room(&self, code: impl Into<String>, snapshot: RoomSnapshotDto) -> RoomId {
        let room_id = Uuid::new_v4().simple().to_string();
        let mut snapshot = snapshot;
        snapshot.object_id = Some(room_id.clone());
        self.inner.codes.insert(code.into(), room_id.clone());
        self.inner.rooms.insert(room_id.clone(), Room::new(snapshot));
        room_id
    }

    /// Replace the stored document without notifying subscribers.
    pub fn set_snapshot(&self, room_id: &str, snapshot: RoomSnapshotDto) {
        if let Some(mut room) = self.inner.rooms.get_mut(room_id) {
            room.snapshot = snapshot;
        }
    }

    /// Current stored document of a room.
    pub fn snapshot(&self, room_id: &str) -> Option<RoomSnapshotDto> {
        self.inner
            .rooms
            .get(room_id)
            .map(|room| room.snapshot.clone())
    }

    /// Store `snapshot` and push it to room subscribers.
    pub fn publish_snapshot(&self, room_id: &str, snapshot: RoomSnapshotDto) {
        if let Some(mut room) = self.inner.rooms.get_mut(room_id) {
            room.snapshot = snapshot.clone();
            let receivers = room.snapshots.send(snapshot).unwrap_or(0);
            debug!(room_id, receivers, "published snapshot");
        }
    }

    /// Push an event to room subscribers.
    pub fn publish_event(&self, room_id: &str, event: EventEnvelope) {
        if let Some(room) = self.inner.rooms.get(room_id) {
            let receivers = room.events.send(event).unwrap_or(0);
            debug!(room_id, receivers, "published event");
        }
    }

    /// Number of snapshot fetches served or failed so far.
    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    /// Make the next `count` fetches fail with a transient error.
    pub fn fail_next_fetches(&self, count: u32) {
        self.inner.failing_fetches.store(count, Ordering::SeqCst);
    }

    /// Reject every hit while `reject` is set.
    pub fn reject_hits(&self, reject: bool) {
        self.inner.reject_hits.store(reject, Ordering::SeqCst);
    }

    /// Hits received so far, in arrival order.
    pub fn hits(&self) -> Vec<HitRecord> {
        self.inner
            .hits
            .lock()
            .map(|hits| hits.clone())
            .unwrap_or_default()
    }

    /// Subscriptions currently open on any room.
    pub fn live_subscriptions(&self) -> usize {
        self.inner.live_subscriptions.load(Ordering::SeqCst)
    }

    fn acting_player(&self) -> BackendResult<PlayerId> {
        self.player
            .clone()
            .ok_or_else(|| BackendError::Rejected("no player session".into()))
    }

    fn seat(&self, code: &str, player: PlayerId) -> BackendResult<RoomId> {
        let room_id = self
            .inner
            .codes
            .get(code)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BackendError::RoomNotFound(code.to_string()))?;
        let mut room = self
            .inner
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| BackendError::RoomNotFound(code.to_string()))?;

        let mut players = room.snapshot.players.clone().unwrap_or_default();
        if players.iter().any(|id| id.as_str() == Some(player.as_str())) {
            return Ok(room_id);
        }
        if players.len() >= usize::from(ROOM_CAPACITY) {
            return Err(BackendError::RoomFull(code.to_string()));
        }

        players.push(player.clone().into());
        let snapshot = &mut room.snapshot;
        snapshot.player_count = players.len().into();
        snapshot.score.insert(player, 0.into());
        snapshot.players = Some(players.clone());

        let joined = EventEnvelope::new(
            PLAYER_JOINED,
            json!({"playerCount": players.len(), "players": players}),
        );
        let _ = room.events.send(joined);
        let _ = room.snapshots.send(room.snapshot.clone());
        Ok(room_id)
    }

    fn subscribe<T, F>(&self, room_id: &str, channel: F) -> BackendResult<Subscription<T>>
    where
        T: Clone + Send + 'static,
        F: FnOnce(&Room) -> broadcast::Receiver<T>,
    {
        let receiver = self
            .inner
            .rooms
            .get(room_id)
            .map(|room| channel(room.value()))
            .ok_or_else(|| BackendError::RoomNotFound(room_id.to_string()))?;

        let live = self.inner.live_subscriptions.clone();
        live.fetch_add(1, Ordering::SeqCst);
        // Lagged receivers skip what they missed; snapshots catch them up.
        let stream = BroadcastStream::new(receiver)
            .filter_map(|item| future::ready(item.ok().map(Ok)));
        Ok(Subscription::new(stream).with_cancel(move || {
            live.fetch_sub(1, Ordering::SeqCst);
        }))
    }
}

impl RoomBackend for MemoryBackend {
    fn create_or_join_room(&self, code: String) -> BoxFuture<'static, BackendResult<RoomId>> {
        let backend = self.clone();
        Box::pin(async move {
            let player = backend.acting_player()?;
            if !backend.inner.codes.contains_key(&code) {
                let lobby = RoomSnapshotDto::lobby(code.as_str(), &[player.as_str()]);
                let room_id = backend.open_room(code.clone(), lobby);
                debug!(%room_id, %code, "created room");
                return Ok(room_id);
            }
            backend.seat(&code, player)
        })
    }

    fn join_existing_room(&self, code: String) -> BoxFuture<'static, BackendResult<RoomId>> {
        let backend = self.clone();
        Box::pin(async move {
            let player = backend.acting_player()?;
            backend.seat(&code, player)
        })
    }

    fn fetch_snapshot(&self, room_id: RoomId) -> BoxFuture<'static, BackendResult<RoomSnapshotDto>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.inner.fetches.fetch_add(1, Ordering::SeqCst);
            let failing = backend
                .inner
                .failing_fetches
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if failing {
                return Err(BackendError::unavailable(
                    format!("fetch of room {room_id} failed"),
                    std::io::Error::other("injected fetch failure"),
                ));
            }
            backend
                .snapshot(&room_id)
                .ok_or(BackendError::RoomNotFound(room_id))
        })
    }

    fn subscribe_events(
        &self,
        room_id: RoomId,
    ) -> BoxFuture<'static, BackendResult<Subscription<EventEnvelope>>> {
        let backend = self.clone();
        Box::pin(async move { backend.subscribe(&room_id, |room| room.events.subscribe()) })
    }

    fn subscribe_snapshots(
        &self,
        room_id: RoomId,
    ) -> BoxFuture<'static, BackendResult<Subscription<RoomSnapshotDto>>> {
        let backend = self.clone();
        Box::pin(async move { backend.subscribe(&room_id, |room| room.snapshots.subscribe()) })
    }

    fn submit_hit(
        &self,
        room_id: RoomId,
        objective_id: String,
        player_id: PlayerId,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            if backend.inner.reject_hits.load(Ordering::SeqCst) {
                return Err(BackendError::Rejected(format!(
                    "hit on {objective_id} not accepted"
                )));
            }
            if !backend.inner.rooms.contains_key(&room_id) {
                return Err(BackendError::RoomNotFound(room_id));
            }
            if let Ok(mut hits) = backend.inner.hits.lock() {
                hits.push(HitRecord {
                    room_id,
                    objective_id,
                    player_id,
                });
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::state::SessionStatus;

    #[tokio::test]
    async fn second_player_joins_and_third_is_refused() {
        let backend = MemoryBackend::new();
        let room_id = backend
            .as_player("A")
            .create_or_join_room("4821".into())
            .await
            .unwrap();
        let mut events = backend.subscribe_events(room_id.clone()).await.unwrap();

        let joined = backend
            .as_player("B")
            .join_existing_room("4821".into())
            .await
            .unwrap();
        assert_eq!(joined, room_id);

        let event = events.next().await.unwrap().unwrap();
        assert_eq!(event.kind, PLAYER_JOINED);
        assert_eq!(event.payload["players"], json!(["A", "B"]));

        let full = backend.as_player("C").join_existing_room("4821".into()).await;
        assert!(matches!(full, Err(BackendError::RoomFull(_))));

        let missing = backend.as_player("C").join_existing_room("1111".into()).await;
        assert!(matches!(missing, Err(BackendError::RoomNotFound(_))));

        let snapshot = backend.fetch_snapshot(room_id).await.unwrap();
        assert_eq!(snapshot.session_status(), SessionStatus::Lobby);
        assert_eq!(snapshot.reported_player_count(), 2);
    }

    #[tokio::test]
    async fn injected_fetch_failures_are_transient() {
        let backend = MemoryBackend::new();
        let room_id = backend.open_room("1234", RoomSnapshotDto::lobby("1234", &["A"]));
        backend.fail_next_fetches(1);

        let err = backend.fetch_snapshot(room_id.clone()).await.unwrap_err();
        assert!(err.is_transient());
        assert!(backend.fetch_snapshot(room_id).await.is_ok());
        assert_eq!(backend.fetch_count(), 2);
    }

    #[tokio::test]
    async fn subscriptions_are_counted_until_cancelled() {
        let backend = MemoryBackend::new();
        let room_id = backend.open_room("1234", RoomSnapshotDto::lobby("1234", &["A"]));

        let mut events = backend.subscribe_events(room_id.clone()).await.unwrap();
        let snapshots = backend.subscribe_snapshots(room_id).await.unwrap();
        assert_eq!(backend.live_subscriptions(), 2);

        events.cancel();
        drop(snapshots);
        assert_eq!(backend.live_subscriptions(), 0);
    }

    #[tokio::test]
    async fn hits_are_recorded_or_rejected() {
        let backend = MemoryBackend::new();
        let room_id = backend.open_room("1234", RoomSnapshotDto::lobby("1234", &["A"]));

        backend
            .submit_hit(room_id.clone(), "s1".into(), "A".into())
            .await
            .unwrap();
        backend.reject_hits(true);
        let err = backend
            .submit_hit(room_id.clone(), "s2".into(), "A".into())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));

        assert_eq!(
            backend.hits(),
            vec![HitRecord {
                room_id,
                objective_id: "s1".into(),
                player_id: "A".into(),
            }]
        );
    }
}
