use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, info, warn};

use crate::{
    backend::RoomBackend,
    dto::WireDecoder,
    state::{RoomId, SessionCell},
};

/// Periodic snapshot fetch that keeps the lobby fresh until push channels take over.
///
/// At most one polling task exists per instance; starting again replaces it.
pub struct PollingFallback {
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollingFallback {
    /// Poller fetching once per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            task: Mutex::new(None),
        }
    }

    /// Begin polling `room_id`, cancelling any previous loop.
    ///
    /// Fetched snapshots are applied to `cell` only when the player count or
    /// status differs from the current state. The loop ends on its own once
    /// the cell leaves the lobby or is closed.
    pub fn start(
        &self,
        backend: Arc<dyn RoomBackend>,
        room_id: RoomId,
        cell: Arc<SessionCell>,
        decoder: WireDecoder,
    ) {
        let mut guard = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = guard.take() {
            previous.abort();
        }
        if cell.is_closed() {
            debug!(%room_id, "session closed; not starting lobby polling");
            return;
        }
        info!(
            %room_id,
            interval_ms = self.interval.as_millis() as u64,
            "lobby polling started"
        );
        *guard = Some(tokio::spawn(poll_lobby(
            backend,
            room_id,
            cell,
            decoder,
            self.interval,
        )));
    }

    /// Cancel the loop. Safe to call when nothing is running.
    pub fn stop(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if !task.is_finished() {
                info!("lobby polling stopped");
            }
            task.abort();
        }
    }

    /// Whether a loop is currently alive.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for PollingFallback {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_lobby(
    backend: Arc<dyn RoomBackend>,
    room_id: RoomId,
    cell: Arc<SessionCell>,
    decoder: WireDecoder,
    interval: Duration,
) {
    let mut poll = 0u32;
    loop {
        sleep(interval).await;
        poll += 1;

        if cell.is_closed() {
            debug!(%room_id, "session closed; lobby polling ends");
            break;
        }
        let status = cell.status();
        if status.is_past_lobby() {
            debug!(%room_id, status = status.as_str(), "left the lobby; lobby polling ends");
            break;
        }

        let dto = match backend.fetch_snapshot(room_id.clone()).await {
            Ok(dto) => dto,
            Err(err) => {
                warn!(%room_id, poll, error = %err, "lobby poll failed");
                continue;
            }
        };
        let snapshot = decoder.snapshot(&dto);
        let fetched_status = snapshot.status;

        let player_count = snapshot.player_count;
        // Pushes may have landed while the fetch was in flight; the check runs
        // under the cell's write lock.
        let applied = cell.apply_if(
            |latest| {
                !latest.status.is_past_lobby()
                    && (player_count != latest.player_count || fetched_status != latest.status)
            },
            snapshot,
        );
        if applied.is_some() {
            debug!(
                %room_id,
                poll,
                player_count,
                status = fetched_status.as_str(),
                "lobby change applied"
            );
        } else if cell.status().is_past_lobby() {
            break;
        }
        if fetched_status.is_past_lobby() {
            info!(%room_id, status = fetched_status.as_str(), "game started; lobby polling ends");
            break;
        }
    }
}
