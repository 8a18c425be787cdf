//! Room registry: owns every active room and its join code.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use reelroom_protocol::{Player, PlayerId, RoomCode, RoomId};
use tokio::sync::Mutex;

use crate::room::{Room, RoomHandle};
use crate::{RegistryConfig, RoomError, now_millis};

#[derive(Default)]
struct Index {
    rooms: HashMap<RoomId, RoomHandle>,
    codes: HashMap<RoomCode, RoomId>,
}

/// Tracks all active rooms by id and by code.
///
/// Codes are unique among active rooms and become reusable as soon as a
/// room is removed. Ids are never reused within one registry.
///
/// The registry lock is never held while a room is locked, and vice versa.
pub struct RoomRegistry {
    index: Mutex<Index>,
    config: RegistryConfig,
    next_room_id: AtomicU64,
    next_player_id: AtomicU64,
}

impl RoomRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            index: Mutex::new(Index::default()),
            config,
            next_room_id: AtomicU64::new(1),
            next_player_id: AtomicU64::new(1),
        }
    }

    /// Allocates a player id, unique across every room in this registry.
    pub fn next_player_id(&self) -> PlayerId {
        PlayerId(self.next_player_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates a waiting room with `host_name` as its only player.
    pub async fn create_room(&self, host_name: &str) -> Result<RoomHandle, RoomError> {
        let mut index = self.index.lock().await;
        let code = self.generate_code(&index.codes)?;
        let id = RoomId(self.next_room_id.fetch_add(1, Ordering::Relaxed));
        let host = Player::new(self.next_player_id(), host_name);

        let handle = RoomHandle::new(Room::new(id, code.clone(), host, now_millis()));
        index.codes.insert(code.clone(), id);
        index.rooms.insert(id, handle.clone());

        tracing::info!(room_id = %id, room_code = %code, "room created");
        Ok(handle)
    }

    pub async fn find_by_code(&self, code: &RoomCode) -> Option<RoomHandle> {
        let index = self.index.lock().await;
        let id = index.codes.get(code)?;
        index.rooms.get(id).cloned()
    }

    pub async fn find_by_id(&self, id: RoomId) -> Option<RoomHandle> {
        self.index.lock().await.rooms.get(&id).cloned()
    }

    /// Removes a room and frees its code. Returns `false` if it was
    /// already gone.
    ///
    /// Callers close the room before removing it so stale handles stop
    /// working.
    pub async fn remove(&self, id: RoomId) -> bool {
        let mut index = self.index.lock().await;
        let Some(handle) = index.rooms.remove(&id) else {
            return false;
        };
        if index.codes.get(handle.code()) == Some(&id) {
            index.codes.remove(handle.code());
        }
        tracing::info!(room_id = %id, room_code = %handle.code(), "room destroyed");
        true
    }

    pub async fn room_count(&self) -> usize {
        self.index.lock().await.rooms.len()
    }

    /// Codes of every active room, in no particular order.
    pub async fn active_codes(&self) -> Vec<RoomCode> {
        self.index.lock().await.codes.keys().cloned().collect()
    }

    /// Picks a code no active room holds.
    ///
    /// Random draws first; when those keep colliding, a scan from a random
    /// offset guarantees a free code is found if one exists.
    fn generate_code(&self, taken: &HashMap<RoomCode, RoomId>) -> Result<RoomCode, RoomError> {
        let alphabet: Vec<char> = self.config.code_alphabet.chars().collect();
        if alphabet.is_empty() {
            return Err(RoomError::RegistryExhausted);
        }
        let space = u32::try_from(RoomCode::LEN)
            .ok()
            .and_then(|len| alphabet.len().checked_pow(len))
            .unwrap_or(usize::MAX);
        if taken.len() >= space {
            return Err(RoomError::RegistryExhausted);
        }

        let mut rng = rand::rng();
        for _ in 0..self.config.random_attempts {
            let code: String = (0..RoomCode::LEN)
                .map(|_| alphabet[rng.random_range(0..alphabet.len())])
                .collect();
            let code = RoomCode::new(code);
            if !taken.contains_key(&code) {
                return Ok(code);
            }
        }

        let start = rng.random_range(0..space);
        (0..space)
            .map(|offset| code_at(&alphabet, (start + offset) % space))
            .find(|code| !taken.contains_key(code))
            .ok_or(RoomError::RegistryExhausted)
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

/// The `n`th code in the code space, reading `n` in base `alphabet.len()`.
fn code_at(alphabet: &[char], mut n: usize) -> RoomCode {
    let base = alphabet.len();
    let mut chars = vec![alphabet[0]; RoomCode::LEN];
    for slot in chars.iter_mut().rev() {
        *slot = alphabet[n % base];
        n /= base;
    }
    RoomCode::new(chars.into_iter().collect::<String>())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn small_registry(alphabet: &str) -> RoomRegistry {
        RoomRegistry::new(RegistryConfig {
            code_alphabet: alphabet.into(),
            random_attempts: 4,
        })
    }

    #[test]
    fn test_code_at_enumerates_space() {
        let alphabet = ['A', 'B'];
        assert_eq!(code_at(&alphabet, 0).as_str(), "AAAA");
        assert_eq!(code_at(&alphabet, 1).as_str(), "AAAB");
        assert_eq!(code_at(&alphabet, 15).as_str(), "BBBB");
    }

    #[tokio::test]
    async fn test_create_room_registers_code_and_id() {
        let registry = RoomRegistry::default();
        let handle = registry.create_room("Ann").await.unwrap();

        assert_eq!(handle.code().as_str().len(), RoomCode::LEN);
        assert!(handle.code().as_str().chars().all(|c| c.is_ascii_uppercase()));

        let by_code = registry.find_by_code(handle.code()).await.unwrap();
        let by_id = registry.find_by_id(handle.id()).await.unwrap();
        assert_eq!(by_code.id(), handle.id());
        assert_eq!(by_id.code(), handle.code());
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_find_by_code_normalizes_case() {
        let registry = RoomRegistry::default();
        let handle = registry.create_room("Ann").await.unwrap();
        let typed = RoomCode::new(handle.code().as_str().to_lowercase());
        assert!(registry.find_by_code(&typed).await.is_some());
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let registry = RoomRegistry::default();
        let a = registry.create_room("Ann").await.unwrap();
        let b = registry.create_room("Bo").await.unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.code(), b.code());

        let host_a = a.lock().await.host().unwrap().id;
        let host_b = b.lock().await.host().unwrap().id;
        assert_ne!(host_a, host_b);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent_and_frees_code() {
        let registry = RoomRegistry::default();
        let handle = registry.create_room("Ann").await.unwrap();

        assert!(registry.remove(handle.id()).await);
        assert!(!registry.remove(handle.id()).await);
        assert!(registry.find_by_code(handle.code()).await.is_none());
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_small_alphabet_fills_then_exhausts() {
        let registry = small_registry("AB");
        let mut codes = HashSet::new();
        for i in 0..16 {
            let handle = registry.create_room(&format!("p{i}")).await.unwrap();
            assert!(codes.insert(handle.code().clone()));
        }
        assert!(matches!(
            registry.create_room("late").await,
            Err(RoomError::RegistryExhausted)
        ));
    }

    #[tokio::test]
    async fn test_freed_code_is_reusable_after_exhaustion() {
        let registry = small_registry("A");
        let first = registry.create_room("Ann").await.unwrap();
        assert_eq!(first.code().as_str(), "AAAA");
        assert!(registry.create_room("Bo").await.is_err());

        registry.remove(first.id()).await;
        let second = registry.create_room("Cy").await.unwrap();
        assert_eq!(second.code().as_str(), "AAAA");
        assert_ne!(second.id(), first.id());
    }
}
