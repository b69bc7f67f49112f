/// Room codes and room creation or joining.
pub mod lobby_service;
/// One-shot messages queued for the UI.
pub mod notifications;
/// Lobby polling until push channels take over.
pub mod poller;
/// Session lifecycle and update merging.
pub mod session_service;

pub use lobby_service::RoomCode;
pub use notifications::{FaultKind, Notification};
pub use poller::PollingFallback;
pub use session_service::SessionController;
