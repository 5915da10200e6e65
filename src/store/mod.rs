// Persistence for pipeline documents and the flat session key-value state

pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file::FileSystemStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Record '{key}' is unreadable: {reason}")]
    CorruptRecord { key: String, reason: String },

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "database")]
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// One stored workflow instance. `data` is the raw serialized document, kept
/// opaque here so a damaged document only fails the instance that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRecord {
    pub pkey: String,
    pub app_name: String,
    pub data: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[async_trait]
pub trait PipelineStore: Send + Sync {
    async fn get(&self, pkey: &str) -> Result<Option<PipelineRecord>, StoreError>;

    /// Insert or replace. Last write wins.
    async fn put(&self, record: PipelineRecord) -> Result<(), StoreError>;

    /// Returns whether a record was removed.
    async fn delete(&self, pkey: &str) -> Result<bool, StoreError>;

    /// Keys of every instance owned by `app_name`, sorted.
    async fn keys_for_app(&self, app_name: &str) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_value(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_value(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn remove_value(&self, key: &str) -> Result<bool, StoreError>;

    async fn entries(&self) -> Result<Vec<(String, String)>, StoreError>;
}

/// Keys become file names and primary keys; reject anything that could
/// escape a directory or collide with nothing.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let reason = if key.is_empty() {
        Some("key is empty")
    } else if key.contains('/') || key.contains('\\') {
        Some("key contains a path separator")
    } else if key.contains("..") {
        Some("key contains '..'")
    } else if key.chars().any(char::is_control) {
        Some("key contains control characters")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}
