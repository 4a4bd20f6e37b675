//! Match snapshot persistence

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use uuid::Uuid;

use crate::game::MatchSnapshot;

/// Keyed storage of match snapshots.
///
/// `update` must refuse to write a snapshot whose match is no longer stored,
/// so a save racing a delete never brings the match back.
pub trait SnapshotStore: Send + Sync {
    fn create(&self, snapshot: &MatchSnapshot) -> Result<(), StoreError>;

    fn read(&self, id: Uuid) -> Result<MatchSnapshot, StoreError>;

    fn update(&self, snapshot: &MatchSnapshot) -> Result<(), StoreError>;

    fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    fn list(&self) -> Result<Vec<Uuid>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Match {0} is not stored")]
    NotFound(Uuid),

    #[error("Match {0} is already stored")]
    AlreadyExists(Uuid),

    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode or decode snapshot: {0}")]
    Serde(#[from] serde_json::Error),
}
