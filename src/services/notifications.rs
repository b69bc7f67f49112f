use std::sync::{Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::debug;

use crate::state::GameEnded;

/// Non-fatal failure categories surfaced to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The initial snapshot could not be fetched within the retry budget.
    SeedFailed,
    /// The backend did not accept a hit.
    HitRejected,
    /// A push channel could not be opened.
    SubscriptionFailed,
}

/// One-shot message for the UI, consumed in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// The match is over.
    GameEnded(GameEnded),
    /// Something failed without breaking the session.
    Error {
        /// Failure category.
        kind: FaultKind,
        /// Text suitable for a toast.
        message: String,
    },
}

impl Notification {
    pub(crate) fn error(kind: FaultKind, message: impl Into<String>) -> Self {
        Notification::Error {
            kind,
            message: message.into(),
        }
    }
}

/// Unbounded FIFO of notifications with a single logical consumer.
pub(crate) struct NotificationQueue {
    tx: Mutex<Option<mpsc::UnboundedSender<Notification>>>,
    rx: AsyncMutex<mpsc::UnboundedReceiver<Notification>>,
}

impl NotificationQueue {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: AsyncMutex::new(rx),
        }
    }

    pub(crate) fn push(&self, notification: Notification) {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) => {
                let _ = tx.send(notification);
            }
            None => debug!(?notification, "dropping notification for a closed session"),
        }
    }

    /// Wait for the next notification; `None` once closed and drained.
    pub(crate) async fn next(&self) -> Option<Notification> {
        self.rx.lock().await.recv().await
    }

    /// Next notification if one is already queued.
    pub(crate) fn try_next(&self) -> Option<Notification> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }

    /// Stop accepting notifications; queued ones stay readable.
    pub(crate) fn close(&self) {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
