//! Application state shared across routes

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::service::MatchService;
use crate::store::{FileStore, MemoryStore, SnapshotStore, StoreError};
use crate::ws::hub::ChannelHub;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub matches: Arc<MatchService>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, StoreError> {
        let config = Arc::new(config);

        // Snapshots go to disk when a data directory is configured
        let store: Arc<dyn SnapshotStore> = match &config.data_dir {
            Some(dir) => {
                info!(data_dir = %dir.display(), "Using file snapshot store");
                Arc::new(FileStore::open(dir.clone())?)
            }
            None => {
                info!("Using in-memory snapshot store");
                Arc::new(MemoryStore::new())
            }
        };

        let hub = Arc::new(ChannelHub::default());
        let matches = Arc::new(MatchService::new(store, hub, config.timings));

        Ok(Self { config, matches })
    }
}
