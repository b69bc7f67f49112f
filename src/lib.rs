//! Client engine for two-player tap duels: keeps a local room view consistent
//! with the backend and animates the objective players race to hit.

pub mod backend;
pub mod config;
pub mod dto;
pub mod error;
pub mod render;
pub mod services;
pub mod state;

pub use config::EngineConfig;
pub use error::{SessionError, WireError};
pub use services::{Notification, SessionController};
