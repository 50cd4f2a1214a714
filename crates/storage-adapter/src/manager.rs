//! Backend selection

use std::sync::Arc;
use tracing::info;

use registry_config::{DatabaseSettings, StorageBackend};

use crate::error::Result;
use crate::memory::MemoryStore;
use crate::sqlite::SqliteStore;
use crate::store::RegistryStore;

/// Opens the store configured in the database settings
pub struct StorageManager;

impl StorageManager {
    pub async fn open(settings: &DatabaseSettings) -> Result<Arc<dyn RegistryStore>> {
        let store: Arc<dyn RegistryStore> = match settings.backend {
            StorageBackend::Sqlite => Arc::new(SqliteStore::connect(settings).await?),
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
        };

        info!("Storage backend {} ready", store.backend());
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_selects_backend() {
        let sqlite = StorageManager::open(&DatabaseSettings::sqlite_in_memory())
            .await
            .unwrap();
        assert_eq!(sqlite.backend(), "sqlite");

        let settings = DatabaseSettings {
            backend: StorageBackend::Memory,
            ..DatabaseSettings::sqlite_in_memory()
        };
        let memory = StorageManager::open(&settings).await.unwrap();
        assert_eq!(memory.backend(), "memory");
    }

    #[tokio::test]
    async fn test_open_rejects_bad_url() {
        let settings = DatabaseSettings {
            url: "sqlite:///nonexistent-dir/deeper/registry.db".to_string(),
            ..DatabaseSettings::sqlite_in_memory()
        };
        assert!(StorageManager::open(&settings).await.is_err());
    }
}
