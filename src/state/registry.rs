use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::{error::ServiceError, state::room::Room};

/// Shared ownership of one room; timer tasks and socket handlers keep clones.
pub type RoomHandle = Arc<Mutex<Room>>;

/// Process-wide lookup table of live rooms.
///
/// Rooms are held for the lifetime of the process: there is deliberately no
/// delete operation, since room persistence and eviction are out of scope.
/// Scaling beyond one process would replace this map with an external store
/// plus pub/sub fanout.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, RoomHandle>,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room under `code`, replacing any previous room with that code.
    pub fn create_room(&self, code: &str, quiz_id: Option<i64>) -> RoomHandle {
        let handle = Arc::new(Mutex::new(Room::new(code, quiz_id)));
        self.rooms.insert(code.to_string(), handle.clone());
        handle
    }

    /// Look up a room by code.
    pub fn get_room(&self, code: &str) -> Option<RoomHandle> {
        self.rooms.get(code).map(|entry| entry.value().clone())
    }

    /// Look up a room by code, treating absence as caller misuse.
    pub fn require(&self, code: &str) -> Result<RoomHandle, ServiceError> {
        self.get_room(code)
            .ok_or_else(|| ServiceError::NotFound(format!("room `{code}` not found")))
    }

    /// Number of rooms currently held.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether the registry holds no rooms.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
