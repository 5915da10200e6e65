// Pipulate Library - step-based workflows with resumable JSON state
// This exposes the core components for the binary, tests and embedding

pub mod app;
pub mod cli;
pub mod config;
#[cfg(feature = "database")]
pub mod database;
pub mod server;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod upstream;
pub mod workflows;

// Re-export key types for easy access
pub use app::build_engine;
pub use config::{PipulateConfig, StorageBackend};
pub use session::{SessionContext, Theme};
pub use store::{FileSystemStore, KeyValueStore, MemoryStore, PipelineRecord, PipelineStore, StoreError};
pub use telemetry::{generate_correlation_id, init_telemetry, shutdown_telemetry, workflow_span};
pub use upstream::{RetryConfig, StepAction, StepRequest, UpstreamError, UpstreamExecutor};
pub use workflows::{
    FinalizationController, Fragment, InitOutcome, PipelineDocument, StepDefinition, StepView, Workflow,
    WorkflowEngine, WorkflowError,
};
