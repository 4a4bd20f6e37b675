//! One JSON file per match under a data directory

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::game::MatchSnapshot;

use super::{SnapshotStore, StoreError};

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) the data directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Write through a temp file so a crash never leaves half a snapshot
    fn write(&self, snapshot: &MatchSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_vec(snapshot)?;
        let target = self.path(snapshot.id);
        let tmp = target.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &target)?;
        debug!(match_id = %snapshot.id, path = %target.display(), "Snapshot written");
        Ok(())
    }
}

impl SnapshotStore for FileStore {
    fn create(&self, snapshot: &MatchSnapshot) -> Result<(), StoreError> {
        if self.path(snapshot.id).exists() {
            return Err(StoreError::AlreadyExists(snapshot.id));
        }
        self.write(snapshot)
    }

    fn read(&self, id: Uuid) -> Result<MatchSnapshot, StoreError> {
        let bytes = fs::read(self.path(id)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(id),
            _ => StoreError::Io(e),
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn update(&self, snapshot: &MatchSnapshot) -> Result<(), StoreError> {
        if !self.path(snapshot.id).exists() {
            return Err(StoreError::NotFound(snapshot.id));
        }
        self.write(snapshot)
    }

    fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        fs::remove_file(self.path(id)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(id),
            _ => StoreError::Io(e),
        })
    }

    fn list(&self) -> Result<Vec<Uuid>, StoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(Uuid::parse_str)
            {
                Some(Ok(id)) => ids.push(id),
                _ => warn!(path = %path.display(), "Skipping unrecognised file in data directory"),
            }
        }
        Ok(ids)
    }
}
