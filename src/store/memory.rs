use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{validate_key, KeyValueStore, PipelineRecord, PipelineStore, StoreError};

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pipelines: RwLock<BTreeMap<String, PipelineRecord>>,
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PipelineStore for MemoryStore {
    async fn get(&self, pkey: &str) -> Result<Option<PipelineRecord>, StoreError> {
        Ok(self.pipelines.read().await.get(pkey).cloned())
    }

    async fn put(&self, record: PipelineRecord) -> Result<(), StoreError> {
        validate_key(&record.pkey)?;
        self.pipelines.write().await.insert(record.pkey.clone(), record);
        Ok(())
    }

    async fn delete(&self, pkey: &str) -> Result<bool, StoreError> {
        Ok(self.pipelines.write().await.remove(pkey).is_some())
    }

    async fn keys_for_app(&self, app_name: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .pipelines
            .read()
            .await
            .values()
            .filter(|record| record.app_name == app_name)
            .map(|record| record.pkey.clone())
            .collect())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_value(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.values.write().await.remove(key).is_some())
    }

    async fn entries(&self) -> Result<Vec<(String, String)>, StoreError> {
        Ok(self
            .values
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
