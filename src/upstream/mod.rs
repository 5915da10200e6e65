// External calls made on behalf of workflow steps

pub mod errors;
pub mod retry;
pub mod service;

pub use errors::UpstreamError;
pub use retry::{RetryConfig, UpstreamExecutor};
pub use service::{StepAction, StepRequest};

#[cfg(any(test, feature = "testing"))]
pub use service::MockStepAction;
