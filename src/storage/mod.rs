//! Durable room storage: one atomic snapshot blob per room code plus an
//! append-only event log for replay.
//!
//! Writes are small, frequent and idempotent on the room key; a crash in the
//! middle of a write leaves the prior snapshot intact because the blob is
//! swapped in a single key write.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::{GameEvent, GameState};
use crate::protocol::RoomCode;

/// Bump when the snapshot layout changes; loaders refuse newer schemas.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// The versioned durable slice of one room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomSnapshot {
    pub schema_version: u32,
    pub state: GameState,
}

impl RoomSnapshot {
    pub fn new(state: GameState) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            state,
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("snapshot schema {found} is newer than supported {supported}")]
    SchemaTooNew { found: u32, supported: u32 },
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Room persistence behind a trait so the backend is swappable; the in-memory
/// implementation is the default and the one tests run against.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Atomically replace the snapshot for a room.
    async fn save_snapshot(&self, snapshot: &RoomSnapshot) -> Result<(), StorageError>;

    /// Load a room's snapshot if one exists.
    async fn load_snapshot(&self, code: &RoomCode) -> Result<Option<RoomSnapshot>, StorageError>;

    /// Append one event to the room's log.
    async fn append_event(&self, code: &RoomCode, event: &GameEvent) -> Result<(), StorageError>;

    /// The full event log, oldest first.
    async fn load_events(&self, code: &RoomCode) -> Result<Vec<GameEvent>, StorageError>;

    /// Drop everything stored for a room.
    async fn delete_room(&self, code: &RoomCode) -> Result<(), StorageError>;

    /// Codes of every room with a stored snapshot (cold-start recovery).
    async fn list_rooms(&self) -> Result<Vec<RoomCode>, StorageError>;
}

/// In-memory store. Blobs are kept serialized so the save path exercises the
/// exact (de)serialization a durable backend would.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    snapshots: DashMap<RoomCode, String>,
    events: DashMap<RoomCode, Vec<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomStore for InMemoryStore {
    async fn save_snapshot(&self, snapshot: &RoomSnapshot) -> Result<(), StorageError> {
        let blob = serde_json::to_string(snapshot)?;
        self.snapshots.insert(snapshot.state.code.clone(), blob);
        Ok(())
    }

    async fn load_snapshot(&self, code: &RoomCode) -> Result<Option<RoomSnapshot>, StorageError> {
        let Some(blob) = self.snapshots.get(code) else {
            return Ok(None);
        };
        let snapshot: RoomSnapshot = serde_json::from_str(blob.value())?;
        if snapshot.schema_version > SNAPSHOT_SCHEMA_VERSION {
            return Err(StorageError::SchemaTooNew {
                found: snapshot.schema_version,
                supported: SNAPSHOT_SCHEMA_VERSION,
            });
        }
        Ok(Some(snapshot))
    }

    async fn append_event(&self, code: &RoomCode, event: &GameEvent) -> Result<(), StorageError> {
        let line = serde_json::to_string(event)?;
        self.events.entry(code.clone()).or_default().push(line);
        Ok(())
    }

    async fn load_events(&self, code: &RoomCode) -> Result<Vec<GameEvent>, StorageError> {
        let Some(lines) = self.events.get(code) else {
            return Ok(Vec::new());
        };
        lines
            .iter()
            .map(|line| serde_json::from_str(line).map_err(StorageError::from))
            .collect()
    }

    async fn delete_room(&self, code: &RoomCode) -> Result<(), StorageError> {
        self.snapshots.remove(code);
        self.events.remove(code);
        Ok(())
    }

    async fn list_rooms(&self) -> Result<Vec<RoomCode>, StorageError> {
        Ok(self
            .snapshots
            .iter()
            .map(|entry| entry.key().clone())
            .collect())
    }
}
