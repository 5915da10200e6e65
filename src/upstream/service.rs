use async_trait::async_trait;

use crate::upstream::UpstreamError;

/// What a step action sees when its step is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRequest {
    pub app_name: String,
    pub pipeline_id: String,
    pub step_id: String,
    /// The validated, non-empty submitted value
    pub value: String,
}

/// External call attached to a step. Its output is stored as the step's
/// result in place of the raw submitted value.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait StepAction: Send + Sync {
    async fn run(&self, request: &StepRequest) -> Result<String, UpstreamError>;
}
