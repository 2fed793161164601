//! Room registry
//!
//! Maps room names to shared `RoomState`s. Rooms are created on first use and
//! live for the rest of the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::room::{RoomSettings, RoomState};

/// Concurrency-safe, create-on-first-use room map
///
/// A single lock guards the map. It is only held for lookups and inserts,
/// never while a room is read from or written to.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, Arc<RoomState>>>,
    settings: RoomSettings,
}

impl RoomRegistry {
    /// Create an empty registry whose rooms use `settings`
    pub fn new(settings: RoomSettings) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            settings,
        }
    }

    /// Return the room called `name`, creating it if absent
    ///
    /// Concurrent callers with the same name always receive the same instance.
    pub fn get_or_create(&self, name: &str) -> Arc<RoomState> {
        let mut rooms = self.lock();
        if let Some(room) = rooms.get(name) {
            return room.clone();
        }

        let room = Arc::new(RoomState::new(name, self.settings));
        rooms.insert(name.to_string(), room.clone());
        info!("Room '{}' created ({} rooms)", name, rooms.len());
        room
    }

    /// Look up a room without creating it
    pub fn get(&self, name: &str) -> Option<Arc<RoomState>> {
        self.lock().get(name).cloned()
    }

    /// Point-in-time list of every registered room
    ///
    /// Rooms created after the snapshot is taken are not included, so a
    /// broadcast racing with a room's creation may miss that room.
    pub fn snapshot(&self) -> Vec<Arc<RoomState>> {
        let rooms = self.lock();
        debug!("Snapshot of {} rooms", rooms.len());
        rooms.values().cloned().collect()
    }

    /// Number of registered rooms
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if no room has been referenced yet
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<RoomState>>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
