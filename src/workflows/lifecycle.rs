use serde::{Deserialize, Serialize};
use statig::prelude::*;

use crate::workflows::pipeline::PipelineDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Finalize,
    Unfinalize,
}

/// Instance-wide lock: Open accepts step mutations, Finalized rejects them.
#[derive(Debug, Default)]
pub struct InstanceLifecycle {
    pub pipeline_id: String,
    pub transitions: u32,
}

impl InstanceLifecycle {
    pub fn new(pipeline_id: String) -> Self {
        Self {
            pipeline_id,
            ..Default::default()
        }
    }
}

#[state_machine(initial = "State::open()", state(derive(Debug, Clone, PartialEq, Eq)))]
impl InstanceLifecycle {
    #[state]
    fn open(&mut self, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::Finalize => {
                self.transitions += 1;
                tracing::info!(pipeline_id = %self.pipeline_id, "Pipeline finalized");
                Transition(State::finalized())
            }
            LifecycleEvent::Unfinalize => Handled,
        }
    }

    #[state]
    fn finalized(&mut self, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::Unfinalize => {
                self.transitions += 1;
                tracing::info!(pipeline_id = %self.pipeline_id, "Pipeline unlocked");
                Transition(State::open())
            }
            LifecycleEvent::Finalize => Handled,
        }
    }
}

/// Drives the lifecycle machine for one loaded document.
pub struct FinalizationController {
    machine: StateMachine<InstanceLifecycle>,
}

impl FinalizationController {
    pub fn for_document(doc: &PipelineDocument) -> Self {
        let mut machine = InstanceLifecycle::new(doc.pipeline_id().to_string()).state_machine();
        if doc.is_finalized() {
            machine.handle(&LifecycleEvent::Finalize);
        }
        Self { machine }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.machine.state(), State::Finalized { .. })
    }

    pub fn accepts_mutation(&self) -> bool {
        !self.is_finalized()
    }

    /// Returns true when the event changed the lock state.
    pub fn apply(&mut self, event: LifecycleEvent) -> bool {
        let before = self.is_finalized();
        self.machine.handle(&event);
        before != self.is_finalized()
    }

    pub fn transitions(&self) -> u32 {
        self.machine.inner().transitions
    }
}
