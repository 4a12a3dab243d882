use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::Result;

pub mod sqlite_store;

pub use sqlite_store::SqliteCredentialStore;

/// Durable key/value storage for the session credential. Survives process
/// restarts; nothing else is persisted locally.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local store, used by tests and short-lived tools.
#[derive(Default)]
pub struct MemoryCredentialStore {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(key: &str, value: &str) -> Self {
        let mut items = HashMap::new();
        items.insert(key.to_string(), value.to_string());
        Self {
            items: RwLock::new(items),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.items.write().await.remove(key);
        Ok(())
    }
}
