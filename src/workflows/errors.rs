use thiserror::Error;

use crate::store::StoreError;
use crate::workflows::step::DefinitionError;

/// Errors raised by the workflow engine.
///
/// Missing user input is not an error: it is rendered back into the step's
/// form. Upstream failures are likewise rendered inline once retries are
/// exhausted, so neither appears here.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Unknown workflow '{app}'")]
    UnknownWorkflow { app: String },

    #[error("Workflow '{app}' is already registered")]
    DuplicateWorkflow { app: String },

    #[error("Workflow '{app}' has no step '{step_id}'")]
    UnknownStep { app: String, step_id: String },

    #[error("Pipeline '{pipeline_id}' does not exist")]
    InstanceNotFound { pipeline_id: String },

    #[error("Pipeline '{pipeline_id}' belongs to workflow '{actual}', not '{expected}'")]
    WrongWorkflow {
        pipeline_id: String,
        expected: String,
        actual: String,
    },

    #[error("Pipeline '{pipeline_id}' is finalized; unlock it before making changes")]
    Finalized { pipeline_id: String },

    #[error("Pipeline '{pipeline_id}' cannot be finalized, steps without values: {}", .missing.join(", "))]
    Incomplete {
        pipeline_id: String,
        missing: Vec<String>,
    },

    #[error("Stored state for '{pipeline_id}' is unreadable: {reason}")]
    StateCorruption { pipeline_id: String, reason: String },

    #[error("No active pipeline in this session")]
    NoActivePipeline,

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to serialize pipeline state: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WorkflowError {
    /// Whether the failure is confined to one instance and the user should be
    /// offered a fresh one.
    pub fn offers_new_instance(&self) -> bool {
        matches!(
            self,
            WorkflowError::StateCorruption { .. }
                | WorkflowError::InstanceNotFound { .. }
                | WorkflowError::WrongWorkflow { .. }
                | WorkflowError::NoActivePipeline
        )
    }
}
