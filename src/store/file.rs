use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{validate_key, KeyValueStore, PipelineRecord, PipelineStore, StoreError};

const PIPELINE_DIR: &str = "pipelines";
const SESSION_FILE: &str = "session.json";

/// Directory-backed store: one JSON file per pipeline plus a single session file.
///
/// ```text
/// <root>/pipelines/<pkey>.json
/// <root>/session.json
/// ```
#[derive(Debug)]
pub struct FileSystemStore {
    root: PathBuf,
    // serializes read-modify-write cycles on the session file
    session_lock: Mutex<()>,
}

impl FileSystemStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join(PIPELINE_DIR)).await?;
        info!(root = ?root, "File store opened");
        Ok(Self {
            root,
            session_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pipeline_path(&self, pkey: &str) -> PathBuf {
        self.root.join(PIPELINE_DIR).join(format!("{pkey}.json"))
    }

    fn session_path(&self) -> PathBuf {
        self.root.join(SESSION_FILE)
    }

    async fn read_session(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read_to_string(self.session_path()).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_session(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        write_atomic(&self.session_path(), serde_json::to_string_pretty(values)?).await
    }
}

/// Write to a temporary sibling, then rename over the target.
async fn write_atomic(path: &Path, contents: String) -> Result<(), StoreError> {
    let temp_file = format!("{}.tmp", path.display());
    fs::write(&temp_file, contents).await?;
    fs::rename(&temp_file, path).await?;
    Ok(())
}

#[async_trait]
impl PipelineStore for FileSystemStore {
    async fn get(&self, pkey: &str) -> Result<Option<PipelineRecord>, StoreError> {
        validate_key(pkey)?;
        let path = self.pipeline_path(pkey);
        let contents = match fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(pkey = %pkey, "No pipeline file found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        // Invalid UTF-8 surfaces here as a decode error
        serde_json::from_slice(&contents)
            .map(Some)
            .map_err(|e| StoreError::CorruptRecord {
                key: pkey.to_string(),
                reason: e.to_string(),
            })
    }

    async fn put(&self, record: PipelineRecord) -> Result<(), StoreError> {
        validate_key(&record.pkey)?;
        let path = self.pipeline_path(&record.pkey);
        write_atomic(&path, serde_json::to_string_pretty(&record)?).await?;
        debug!(pkey = %record.pkey, file = ?path, "Pipeline saved");
        Ok(())
    }

    async fn delete(&self, pkey: &str) -> Result<bool, StoreError> {
        validate_key(pkey)?;
        match fs::remove_file(self.pipeline_path(pkey)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys_for_app(&self, app_name: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(self.root.join(PIPELINE_DIR)).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let contents = match fs::read(&path).await {
                Ok(contents) => contents,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(file = ?path, error = %e, "Skipping unreadable pipeline file");
                    continue;
                }
            };
            match serde_json::from_slice::<PipelineRecord>(&contents) {
                Ok(record) if record.app_name == app_name => keys.push(record.pkey),
                Ok(_) => {}
                Err(e) => warn!(file = ?path, error = %e, "Skipping unreadable pipeline file"),
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl KeyValueStore for FileSystemStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.session_lock.lock().await;
        Ok(self.read_session().await?.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.session_lock.lock().await;
        let mut values = self.read_session().await?;
        values.insert(key.to_string(), value.to_string());
        self.write_session(&values).await
    }

    async fn remove_value(&self, key: &str) -> Result<bool, StoreError> {
        let _guard = self.session_lock.lock().await;
        let mut values = self.read_session().await?;
        let removed = values.remove(key).is_some();
        if removed {
            self.write_session(&values).await?;
        }
        Ok(removed)
    }

    async fn entries(&self) -> Result<Vec<(String, String)>, StoreError> {
        let _guard = self.session_lock.lock().await;
        Ok(self.read_session().await?.into_iter().collect())
    }
}
