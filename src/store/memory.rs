//! In-process snapshot store

use std::collections::HashMap;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::game::MatchSnapshot;

use super::{SnapshotStore, StoreError};

/// Keeps serialized snapshots in memory; used when no data directory is configured
#[derive(Default)]
pub struct MemoryStore {
    snapshots: RwLock<HashMap<Uuid, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }
}

impl SnapshotStore for MemoryStore {
    fn create(&self, snapshot: &MatchSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_string(snapshot)?;
        let mut snapshots = self.snapshots.write();
        if snapshots.contains_key(&snapshot.id) {
            return Err(StoreError::AlreadyExists(snapshot.id));
        }
        snapshots.insert(snapshot.id, json);
        Ok(())
    }

    fn read(&self, id: Uuid) -> Result<MatchSnapshot, StoreError> {
        let snapshots = self.snapshots.read();
        let json = snapshots.get(&id).ok_or(StoreError::NotFound(id))?;
        Ok(serde_json::from_str(json)?)
    }

    fn update(&self, snapshot: &MatchSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_string(snapshot)?;
        let mut snapshots = self.snapshots.write();
        match snapshots.get_mut(&snapshot.id) {
            Some(slot) => {
                *slot = json;
                Ok(())
            }
            None => Err(StoreError::NotFound(snapshot.id)),
        }
    }

    fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.snapshots
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    fn list(&self) -> Result<Vec<Uuid>, StoreError> {
        Ok(self.snapshots.read().keys().copied().collect())
    }
}
