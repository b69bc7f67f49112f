//! Room creation and joining ahead of a session.

use std::{fmt, str::FromStr};

use rand::Rng;
use tracing::info;

use crate::{backend::RoomBackend, error::SessionError, state::RoomId};

const CODE_LEN: usize = 4;

/// Four-digit code players type to meet in a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    /// Accept exactly four ASCII digits, surrounding whitespace ignored.
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let code = raw.trim();
        if code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(code.to_string()))
        } else {
            Err(SessionError::InvalidRoomCode(raw.to_string()))
        }
    }

    /// Uniformly random code in `1000..=9999`.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rng())
    }

    /// Random code drawn from `rng`.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.random_range(1000..=9999u16).to_string())
    }

    /// The digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoomCode {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for RoomCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Create the room for `code`, or take the free seat if it already exists.
pub async fn create_room(
    backend: &dyn RoomBackend,
    code: &RoomCode,
) -> Result<RoomId, SessionError> {
    let room_id = backend.create_or_join_room(code.to_string()).await?;
    info!(%room_id, %code, "room ready");
    Ok(room_id)
}

/// Create a room under a freshly generated code.
pub async fn create_random_room(
    backend: &dyn RoomBackend,
) -> Result<(RoomCode, RoomId), SessionError> {
    let code = RoomCode::generate();
    let room_id = create_room(backend, &code).await?;
    Ok((code, room_id))
}

/// Join a room someone else created. Fails when it is missing or full.
pub async fn join_room(backend: &dyn RoomBackend, raw_code: &str) -> Result<RoomId, SessionError> {
    let code = RoomCode::parse(raw_code)?;
    let room_id = backend.join_existing_room(code.to_string()).await?;
    info!(%room_id, %code, "joined room");
    Ok(room_id)
}

/// Open a new room for another match after one finished.
pub async fn request_rematch(
    backend: &dyn RoomBackend,
    previous: &RoomId,
) -> Result<(RoomCode, RoomId), SessionError> {
    let (code, room_id) = create_random_room(backend).await?;
    info!(%previous, %room_id, %code, "rematch room created");
    Ok((code, room_id))
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::backend::{BackendError, MemoryBackend};

    #[test]
    fn codes_are_four_digits() {
        assert_eq!(RoomCode::parse(" 0427 ").unwrap().as_str(), "0427");
        for bad in ["", "123", "12345", "12a4", "１２３４"] {
            assert!(matches!(
                RoomCode::parse(bad),
                Err(SessionError::InvalidRoomCode(_))
            ));
        }
        assert!("9999".parse::<RoomCode>().is_ok());
    }

    #[test]
    fn generated_codes_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let code = RoomCode::generate_with(&mut rng);
            let value: u16 = code.as_str().parse().unwrap();
            assert!((1000..=9999).contains(&value));
            assert!(RoomCode::parse(code.as_str()).is_ok());
        }
    }

    #[tokio::test]
    async fn create_then_join_then_full() {
        let backend = MemoryBackend::new();
        let code = RoomCode::parse("4821").unwrap();

        let host = backend.as_player("A");
        let room_id = create_room(&host, &code).await.unwrap();
        let joined = join_room(&backend.as_player("B"), "4821").await.unwrap();
        assert_eq!(room_id, joined);

        let full = join_room(&backend.as_player("C"), "4821").await;
        assert!(matches!(
            full,
            Err(SessionError::Backend(BackendError::RoomFull(_)))
        ));
    }

    #[tokio::test]
    async fn joining_needs_a_valid_existing_room() {
        let backend = MemoryBackend::new().as_player("B");
        assert!(matches!(
            join_room(&backend, "12").await,
            Err(SessionError::InvalidRoomCode(_))
        ));
        assert!(matches!(
            join_room(&backend, "1234").await,
            Err(SessionError::Backend(BackendError::RoomNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn rematch_opens_a_different_room() {
        let backend = MemoryBackend::new().as_player("A");
        let (first_code, first) = create_random_room(&backend).await.unwrap();
        let (code, second) = request_rematch(&backend, &first).await.unwrap();
        assert!(backend.snapshot(&second).is_some());
        if code != first_code {
            assert_ne!(first, second);
        }
    }
}
