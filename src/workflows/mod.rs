// Step-based workflows: definitions, persisted state, views and the engine

pub mod engine;
pub mod errors;
pub mod hello;
pub mod keys;
pub mod lifecycle;
pub mod pipeline;
pub mod render;
pub mod step;
pub mod view;

pub use engine::{InitOutcome, WorkflowEngine};
pub use errors::WorkflowError;
pub use lifecycle::{FinalizationController, LifecycleEvent};
pub use pipeline::PipelineDocument;
pub use render::{FinalizeCard, Fragment, FragmentKind};
pub use step::{DefinitionError, StepDefinition, Transform, Workflow, FINALIZE_STEP_ID};
pub use view::StepView;
