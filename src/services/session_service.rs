use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use futures::StreamExt;
use tokio::{sync::watch, task::JoinHandle, time::sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    backend::{RoomBackend, Subscription},
    config::EngineConfig,
    dto::{EventEnvelope, RoomSnapshotDto, WireDecoder},
    error::SessionError,
    render::ObjectiveTapped,
    services::{
        notifications::{FaultKind, Notification, NotificationQueue},
        poller::PollingFallback,
    },
    state::{
        Applied, GameEvent, PlayerId, RoomId, RoomSnapshot, SessionCell, SessionState,
        SessionStatus,
    },
};

const HIT_REJECTED_MESSAGE: &str = "could not register the hit";
const SEED_FAILED_MESSAGE: &str = "could not load the room state";

/// Owner of one room session on the client.
///
/// Merges the event stream, the room update stream and the lobby poller into
/// a single [`SessionState`], and queues end-of-match and error notifications
/// for the UI. Clones share the same session; the session is torn down when
/// [`SessionController::leave_session`] is called or the last clone drops.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

struct Inner {
    session_id: Uuid,
    backend: Arc<dyn RoomBackend>,
    config: EngineConfig,
    pipeline: Pipeline,
    room_id: OnceLock<RoomId>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// The pieces producers need to push updates. Holds no reference back to
/// [`Inner`], so background tasks never keep the controller alive.
#[derive(Clone)]
struct Pipeline {
    session_id: Uuid,
    cell: Arc<SessionCell>,
    poller: Arc<PollingFallback>,
    notifications: Arc<NotificationQueue>,
    decoder: WireDecoder,
}

impl Pipeline {
    fn on_event(&self, event: GameEvent) -> Option<Applied> {
        let kind = event.kind();
        let applied = self.cell.apply(event)?;
        debug!(
            session_id = %self.session_id,
            kind,
            status = applied.status.as_str(),
            changed = applied.changed,
            "applied event"
        );
        if let Some(ended) = applied.ended.clone() {
            info!(
                session_id = %self.session_id,
                winner = %ended.winner_id,
                winner_score = ended.winner_score,
                loser_score = ended.loser_score,
                "game ended"
            );
            self.notifications.push(Notification::GameEnded(ended));
        }
        self.stop_polling_past_lobby(&applied);
        Some(applied)
    }

    fn on_snapshot(&self, snapshot: RoomSnapshot) -> Option<Applied> {
        let applied = self.cell.apply(snapshot)?;
        debug!(
            session_id = %self.session_id,
            status = applied.status.as_str(),
            changed = applied.changed,
            "applied snapshot"
        );
        self.stop_polling_past_lobby(&applied);
        Some(applied)
    }

    fn stop_polling_past_lobby(&self, applied: &Applied) {
        if applied.status.is_past_lobby() {
            self.poller.stop();
        }
    }

    fn fault(&self, kind: FaultKind, message: &str) {
        self.notifications.push(Notification::error(kind, message));
    }
}

impl SessionController {
    /// Controller for `local_player`, talking to `backend`.
    pub fn new(
        backend: Arc<dyn RoomBackend>,
        config: EngineConfig,
        local_player: impl Into<PlayerId>,
    ) -> Self {
        let local_player = local_player.into();
        let session_id = Uuid::new_v4();
        let pipeline = Pipeline {
            session_id,
            cell: Arc::new(SessionCell::new(SessionState::placeholder(
                local_player.clone(),
            ))),
            poller: Arc::new(PollingFallback::new(config.poll_interval)),
            notifications: Arc::new(NotificationQueue::new()),
            decoder: WireDecoder::new(config.reference_canvas, local_player),
        };
        Self {
            inner: Arc::new(Inner {
                session_id,
                backend,
                config,
                pipeline,
                room_id: OnceLock::new(),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Attach to `room_id`: open both push channels, then seed the state.
    ///
    /// The seed fetch waits for the configured settle delay so that pushes
    /// racing the fetch are not missed. A lobby seed starts the poller.
    pub async fn init_session(&self, room_id: impl Into<RoomId>) -> Result<(), SessionError> {
        let room_id = room_id.into();
        let inner = &self.inner;
        if inner.pipeline.cell.is_closed() {
            return Err(SessionError::Closed);
        }
        if let Err(room_id) = inner.room_id.set(room_id.clone()) {
            let current = inner.room_id.get().cloned().unwrap_or(room_id);
            return Err(SessionError::AlreadyStarted(current));
        }
        info!(session_id = %inner.session_id, %room_id, "session started");

        match inner.backend.subscribe_events(room_id.clone()).await {
            Ok(events) => self.track(tokio::spawn(consume_events(
                events,
                inner.pipeline.clone(),
                room_id.clone(),
            ))),
            Err(err) => {
                warn!(%room_id, error = %err, "event subscription failed");
                inner
                    .pipeline
                    .fault(FaultKind::SubscriptionFailed, "live events unavailable");
            }
        }
        match inner.backend.subscribe_snapshots(room_id.clone()).await {
            Ok(snapshots) => self.track(tokio::spawn(consume_snapshots(
                snapshots,
                inner.pipeline.clone(),
                room_id.clone(),
            ))),
            Err(err) => {
                warn!(%room_id, error = %err, "room subscription failed");
                inner
                    .pipeline
                    .fault(FaultKind::SubscriptionFailed, "live room updates unavailable");
            }
        }

        self.track(tokio::spawn(seed(
            inner.backend.clone(),
            inner.pipeline.clone(),
            inner.config.clone(),
            room_id,
        )));
        Ok(())
    }

    /// Merge an incoming event. `None` when the session is closed.
    pub fn on_remote_event(&self, event: GameEvent) -> Option<Applied> {
        self.inner.pipeline.on_event(event)
    }

    /// Merge an incoming snapshot, stopping the poller once past the lobby.
    pub fn on_remote_snapshot(&self, snapshot: RoomSnapshot) -> Option<Applied> {
        self.inner.pipeline.on_snapshot(snapshot)
    }

    /// Report a hit to the backend without touching local state.
    ///
    /// Returns once the request is dispatched. A rejection later shows up as
    /// a [`FaultKind::HitRejected`] notification; the score change itself
    /// arrives through the push channels.
    pub fn submit_hit(
        &self,
        objective_id: impl Into<String>,
        player_id: impl Into<PlayerId>,
    ) -> Result<(), SessionError> {
        let inner = &self.inner;
        if inner.pipeline.cell.is_closed() {
            return Err(SessionError::Closed);
        }
        let room_id = inner.room_id.get().cloned().ok_or(SessionError::NotStarted)?;
        let objective_id = objective_id.into();
        let player_id = player_id.into();
        debug!(session_id = %inner.session_id, %objective_id, %player_id, "submitting hit");

        let request = inner
            .backend
            .submit_hit(room_id.clone(), objective_id.clone(), player_id);
        let pipeline = inner.pipeline.clone();
        self.track(tokio::spawn(async move {
            if let Err(err) = request.await {
                warn!(%room_id, %objective_id, error = %err, "hit rejected");
                pipeline.fault(FaultKind::HitRejected, HIT_REJECTED_MESSAGE);
            }
        }));
        Ok(())
    }

    /// Submit a hit for the local player on the tapped objective.
    pub fn on_objective_tapped(&self, tap: ObjectiveTapped) -> Result<(), SessionError> {
        let player = self.local_player().to_string();
        self.submit_hit(tap.objective_id, player)
    }

    /// Tear down both subscriptions and the poller. Idempotent.
    pub fn leave_session(&self) {
        if self.inner.shutdown() {
            info!(session_id = %self.inner.session_id, room_id = ?self.room_id(), "left session");
        }
    }

    /// Copy of the current state.
    pub fn state(&self) -> SessionState {
        self.inner.pipeline.cell.current()
    }

    /// Current status.
    pub fn status(&self) -> SessionStatus {
        self.inner.pipeline.cell.status()
    }

    /// Receiver notified on every state change.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.inner.pipeline.cell.subscribe()
    }

    /// Wait for the next notification; `None` after leaving once the queue is drained.
    pub async fn next_notification(&self) -> Option<Notification> {
        self.inner.pipeline.notifications.next().await
    }

    /// Next notification if one is already queued.
    pub fn try_notification(&self) -> Option<Notification> {
        self.inner.pipeline.notifications.try_next()
    }

    /// Room this session is attached to.
    pub fn room_id(&self) -> Option<&str> {
        self.inner.room_id.get().map(String::as_str)
    }

    /// Player this client acts for.
    pub fn local_player(&self) -> &str {
        self.inner.pipeline.decoder.local_player()
    }

    /// Whether the lobby poller is currently running.
    pub fn is_polling(&self) -> bool {
        self.inner.pipeline.poller.is_running()
    }

    /// Whether the session was left.
    pub fn is_closed(&self) -> bool {
        self.inner.pipeline.cell.is_closed()
    }

    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = self
            .inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }
}

impl Inner {
    /// Returns `true` the first time it runs.
    fn shutdown(&self) -> bool {
        let first = !self.pipeline.cell.is_closed();
        self.pipeline.cell.close();
        self.pipeline.poller.stop();
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            task.abort();
        }
        self.pipeline.notifications.close();
        first
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn consume_events(
    mut events: Subscription<EventEnvelope>,
    pipeline: Pipeline,
    room_id: RoomId,
) {
    while let Some(item) = events.next().await {
        let envelope = match item {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%room_id, error = %err, "event stream error");
                continue;
            }
        };
        match pipeline.decoder.event(&envelope) {
            Ok(event) => {
                if pipeline.on_event(event).is_none() {
                    break;
                }
            }
            Err(err) => warn!(%room_id, kind = %envelope.kind, error = %err, "skipping event"),
        }
    }
    debug!(%room_id, "event stream finished");
}

async fn consume_snapshots(
    mut snapshots: Subscription<RoomSnapshotDto>,
    pipeline: Pipeline,
    room_id: RoomId,
) {
    while let Some(item) = snapshots.next().await {
        match item {
            Ok(dto) => {
                if pipeline.on_snapshot(pipeline.decoder.snapshot(&dto)).is_none() {
                    break;
                }
            }
            Err(err) => warn!(%room_id, error = %err, "room stream error"),
        }
    }
    debug!(%room_id, "room stream finished");
}

async fn seed(
    backend: Arc<dyn RoomBackend>,
    pipeline: Pipeline,
    config: EngineConfig,
    room_id: RoomId,
) {
    sleep(config.settle_delay).await;

    let mut attempt = 0;
    loop {
        attempt += 1;
        match backend.fetch_snapshot(room_id.clone()).await {
            Ok(dto) => {
                let snapshot = pipeline.decoder.snapshot(&dto);
                let seeded = snapshot.status;
                if pipeline.on_snapshot(snapshot).is_none() {
                    return;
                }
                info!(%room_id, attempt, status = seeded.as_str(), "session seeded");
                if seeded == SessionStatus::Lobby {
                    pipeline.poller.start(
                        backend,
                        room_id,
                        pipeline.cell.clone(),
                        pipeline.decoder.clone(),
                    );
                }
                return;
            }
            Err(err) if attempt < config.seed_attempts => {
                warn!(%room_id, attempt, error = %err, "seed fetch failed; retrying");
                sleep(config.seed_retry_delay).await;
            }
            Err(err) => {
                warn!(%room_id, attempt, error = %err, "seed fetch failed; giving up");
                pipeline.fault(FaultKind::SeedFailed, SEED_FAILED_MESSAGE);
                return;
            }
        }
    }
}
