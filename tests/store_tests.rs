// Persistence across restarts with the file-backed store

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use pipulate::store::FileSystemStore;
use pipulate::upstream::UpstreamExecutor;
use pipulate::workflows::{hello, InitOutcome, StepView, WorkflowEngine, WorkflowError};
use pipulate::SessionContext;
use tempfile::TempDir;

async fn open_engine(root: &Path) -> WorkflowEngine {
    let store = Arc::new(FileSystemStore::open(root).await.unwrap());
    let session = SessionContext::new(store.clone(), "Default");
    let mut engine = WorkflowEngine::new(store, session, UpstreamExecutor::default());
    engine.register(hello::workflow().unwrap()).unwrap();
    engine
}

#[tokio::test]
async fn test_instance_survives_restart() {
    let dir = TempDir::new().unwrap();
    let key = "Default-hello-01";

    {
        let engine = open_engine(dir.path()).await;
        engine.init("hello", key).await.unwrap();
        engine
            .submit("hello", key, "step_01", &HashMap::from([("name".to_string(), "Ada".to_string())]))
            .await
            .unwrap();
    }

    let engine = open_engine(dir.path()).await;
    assert_eq!(
        engine.session().current_pipeline_id().await.unwrap().as_deref(),
        Some(key)
    );
    assert_eq!(engine.list_instances("hello").await.unwrap(), vec![key.to_string()]);

    let fragment = engine.render_step("hello", key, "step_01").await.unwrap();
    assert_eq!(fragment.step_view(), Some(&StepView::Completed { value: "Ada".to_string() }));

    let raw = std::fs::read_to_string(dir.path().join("pipelines").join(format!("{key}.json"))).unwrap();
    assert!(raw.contains("_schema_version"));
}

#[tokio::test]
async fn test_unreadable_file_only_affects_its_instance() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(dir.path()).await;
    engine.init("hello", "Default-hello-01").await.unwrap();

    std::fs::write(dir.path().join("pipelines").join("Default-hello-02.json"), "garbage").unwrap();

    let broken = engine.render_step("hello", "Default-hello-02", "step_01").await;
    assert!(matches!(broken, Err(WorkflowError::StateCorruption { .. })));

    assert_eq!(
        engine.list_instances("hello").await.unwrap(),
        vec!["Default-hello-01".to_string()]
    );
    assert!(engine.render_step("hello", "Default-hello-01", "step_01").await.is_ok());
}

#[tokio::test]
async fn test_non_utf8_file_only_affects_its_instance() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(dir.path()).await;
    engine.init("hello", "Default-hello-01").await.unwrap();

    std::fs::write(
        dir.path().join("pipelines").join("Default-hello-02.json"),
        [0xff, 0xfe, 0x00, 0x80],
    )
    .unwrap();

    let broken = engine.render_step("hello", "Default-hello-02", "step_01").await;
    assert!(matches!(broken, Err(WorkflowError::StateCorruption { .. })));

    assert_eq!(
        engine.list_instances("hello").await.unwrap(),
        vec!["Default-hello-01".to_string()]
    );

    // key generation still works around the damaged file
    let fresh = engine.init("hello", "").await.unwrap();
    assert!(matches!(fresh, InitOutcome::Regenerate { .. }));
    assert!(engine.landing("hello").await.is_ok());
}
