// Wires configuration into a ready-to-use engine

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::{PipulateConfig, StorageBackend};
use crate::session::SessionContext;
use crate::store::{FileSystemStore, KeyValueStore, MemoryStore, PipelineStore};
use crate::upstream::{RetryConfig, UpstreamExecutor};
use crate::workflows::{hello, WorkflowEngine};

/// Open the configured backend. One store serves both pipeline records and
/// session values.
pub async fn open_stores(config: &PipulateConfig) -> Result<(Arc<dyn PipelineStore>, Arc<dyn KeyValueStore>)> {
    let storage = &config.storage;
    match storage.backend {
        StorageBackend::Memory => {
            let store = Arc::new(MemoryStore::new());
            Ok((store.clone(), store))
        }
        StorageBackend::File => {
            let store = Arc::new(
                FileSystemStore::open(&storage.directory)
                    .await
                    .with_context(|| format!("Failed to open store at {}", storage.directory.display()))?,
            );
            Ok((store.clone(), store))
        }
        #[cfg(feature = "database")]
        StorageBackend::Sqlite => {
            let store = Arc::new(
                crate::database::SqliteStore::new(&storage.database_url, storage.max_connections, storage.auto_migrate)
                    .await
                    .with_context(|| format!("Failed to open database {}", storage.database_url))?,
            );
            Ok((store.clone(), store))
        }
        #[cfg(not(feature = "database"))]
        StorageBackend::Sqlite => {
            anyhow::bail!("The sqlite backend requires building with the 'database' feature")
        }
    }
}

/// Build the engine with every bundled workflow registered.
pub async fn build_engine(config: &PipulateConfig) -> Result<WorkflowEngine> {
    let (pipelines, values) = open_stores(config).await?;
    let session = SessionContext::new(values, config.session.default_profile.clone());
    let upstream = UpstreamExecutor::new(RetryConfig::from(&config.upstream));

    let mut engine = WorkflowEngine::new(pipelines, session, upstream);
    engine.register(hello::workflow()?)?;

    info!(
        backend = ?config.storage.backend,
        workflows = engine.workflows().count(),
        "Workflow engine ready"
    );
    Ok(engine)
}
