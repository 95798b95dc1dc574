use std::sync::Arc;
use tracing::{debug, info};

use super::{
    json::JsonFileStore, sqlite::SqliteSessionStore, SessionStore, StorageResult, StoreBackend,
};

/// Factory for creating session stores
pub struct StorageFactory;

impl StorageFactory {
    /// Open and initialize the configured backend
    pub async fn create_store(backend: &StoreBackend) -> StorageResult<Arc<dyn SessionStore>> {
        debug!("Creating session store with backend: {:?}", backend);

        match backend {
            StoreBackend::Sqlite { path } => {
                info!("Initializing SQLite session store at: {:?}", path);
                let store = SqliteSessionStore::new(path).await?;
                store.initialize().await?;
                Ok(Arc::new(store))
            }
            StoreBackend::Json { dir } => {
                info!("Initializing JSON session store at: {:?}", dir);
                let store = JsonFileStore::new(dir.clone());
                store.initialize().await?;
                Ok(Arc::new(store))
            }
        }
    }
}
