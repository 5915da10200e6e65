// Step registry: immutable step descriptors and the workflow that orders them

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::upstream::StepAction;
use crate::workflows::pipeline::RESERVED_KEYS;

/// Pure function deriving a suggested value from the previous step's result.
pub type Transform = fn(&str) -> String;

/// Container id of the pseudo-step rendered after the last real step.
pub const FINALIZE_STEP_ID: &str = "finalize";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("Workflow app name must not be empty")]
    EmptyAppName,
    #[error("Workflow '{app}' declares no steps")]
    NoSteps { app: String },
    #[error("Step at position {position} has an empty id")]
    EmptyStepId { position: usize },
    #[error("Step '{step_id}' has an empty result field")]
    EmptyField { step_id: String },
    #[error("Step id '{step_id}' is declared more than once")]
    DuplicateStep { step_id: String },
    #[error("Step id '{step_id}' collides with a reserved document key")]
    ReservedStepId { step_id: String },
    #[error("Action registered for unknown step '{step_id}'")]
    UnknownActionStep { step_id: String },
}

/// One unit of user input. Built once at registration time, never mutated.
#[derive(Clone)]
pub struct StepDefinition {
    id: String,
    done: String,
    show: String,
    refill: bool,
    transform: Option<Transform>,
}

impl StepDefinition {
    pub fn new(id: impl Into<String>, done: impl Into<String>, show: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            done: done.into(),
            show: show.into(),
            refill: false,
            transform: None,
        }
    }

    /// Keep the old value as the form pre-fill when this step is reverted.
    pub fn refill(mut self, refill: bool) -> Self {
        self.refill = refill;
        self
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the result field this step stores.
    pub fn done(&self) -> &str {
        &self.done
    }

    pub fn show(&self) -> &str {
        &self.show
    }

    pub fn is_refill(&self) -> bool {
        self.refill
    }

    pub fn transform_fn(&self) -> Option<Transform> {
        self.transform
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("done", &self.done)
            .field("show", &self.show)
            .field("refill", &self.refill)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// An ordered, validated list of steps plus the optional external actions
/// attached to some of them.
pub struct Workflow {
    app_name: String,
    display_name: String,
    steps: Vec<StepDefinition>,
    positions: HashMap<String, usize>,
    actions: HashMap<String, Arc<dyn StepAction>>,
}

impl Workflow {
    pub fn builder(app_name: impl Into<String>, display_name: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder {
            app_name: app_name.into(),
            display_name: display_name.into(),
            steps: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn position(&self, step_id: &str) -> Option<usize> {
        self.positions.get(step_id).copied()
    }

    pub fn step(&self, step_id: &str) -> Option<&StepDefinition> {
        self.position(step_id).map(|index| &self.steps[index])
    }

    pub fn first_step(&self) -> &StepDefinition {
        // build() guarantees at least one step
        &self.steps[0]
    }

    /// Id of the container loaded after `index`: the next step, or the finalize card.
    pub fn next_container(&self, index: usize) -> &str {
        self.steps
            .get(index + 1)
            .map(|step| step.id())
            .unwrap_or(FINALIZE_STEP_ID)
    }

    pub fn action(&self, step_id: &str) -> Option<Arc<dyn StepAction>> {
        self.actions.get(step_id).cloned()
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut action_steps: Vec<&String> = self.actions.keys().collect();
        action_steps.sort();
        f.debug_struct("Workflow")
            .field("app_name", &self.app_name)
            .field("display_name", &self.display_name)
            .field("steps", &self.steps)
            .field("actions", &action_steps)
            .finish()
    }
}

pub struct WorkflowBuilder {
    app_name: String,
    display_name: String,
    steps: Vec<StepDefinition>,
    actions: Vec<(String, Arc<dyn StepAction>)>,
}

impl WorkflowBuilder {
    pub fn step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    /// Attach an external call run when `step_id` is submitted.
    pub fn action(mut self, step_id: impl Into<String>, action: Arc<dyn StepAction>) -> Self {
        self.actions.push((step_id.into(), action));
        self
    }

    pub fn build(self) -> Result<Workflow, DefinitionError> {
        if self.app_name.trim().is_empty() {
            return Err(DefinitionError::EmptyAppName);
        }
        if self.steps.is_empty() {
            return Err(DefinitionError::NoSteps { app: self.app_name });
        }

        let mut positions = HashMap::with_capacity(self.steps.len());
        for (position, step) in self.steps.iter().enumerate() {
            if step.id.trim().is_empty() {
                return Err(DefinitionError::EmptyStepId { position });
            }
            if step.done.trim().is_empty() {
                return Err(DefinitionError::EmptyField { step_id: step.id.clone() });
            }
            if step.id == FINALIZE_STEP_ID || RESERVED_KEYS.contains(&step.id.as_str()) {
                return Err(DefinitionError::ReservedStepId { step_id: step.id.clone() });
            }
            if positions.insert(step.id.clone(), position).is_some() {
                return Err(DefinitionError::DuplicateStep { step_id: step.id.clone() });
            }
        }

        let mut actions = HashMap::with_capacity(self.actions.len());
        for (step_id, action) in self.actions {
            if !positions.contains_key(&step_id) {
                return Err(DefinitionError::UnknownActionStep { step_id });
            }
            actions.insert(step_id, action);
        }

        Ok(Workflow {
            app_name: self.app_name,
            display_name: self.display_name,
            steps: self.steps,
            positions,
            actions,
        })
    }
}
