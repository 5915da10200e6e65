// Per-step view selection and transform chaining

use crate::workflows::pipeline::PipelineDocument;
use crate::workflows::step::Workflow;

/// The three mutually exclusive renderings of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepView {
    /// Instance is finalized: read-only, chains to the next step.
    Locked { value: String },
    /// Value recorded and not targeted for revert: summary with a revert control.
    Completed { value: String },
    /// Editable form. Never chains forward.
    InputPending {
        display_value: String,
        error: Option<String>,
    },
}

impl StepView {
    pub fn signals_next(&self) -> bool {
        matches!(self, StepView::Locked { .. } | StepView::Completed { .. })
    }

    pub fn is_input_pending(&self) -> bool {
        matches!(self, StepView::InputPending { .. })
    }
}

/// Pick the view for the step at `index` from the stored document.
pub fn decide_view(workflow: &Workflow, doc: &PipelineDocument, index: usize) -> StepView {
    let step = &workflow.steps()[index];
    let stored = doc.value(step.id(), step.done());

    // a finalized document missing a value still stops the chain at that step
    if doc.is_finalized() {
        if let Some(value) = stored {
            return StepView::Locked { value };
        }
        return StepView::InputPending {
            display_value: display_value(workflow, doc, index),
            error: None,
        };
    }

    match stored {
        Some(value) if doc.revert_target() != Some(step.id()) => StepView::Completed { value },
        _ => StepView::InputPending {
            display_value: display_value(workflow, doc, index),
            error: None,
        },
    }
}

/// Input-pending view carrying a validation message and the rejected input.
pub fn rejected_input(
    workflow: &Workflow,
    doc: &PipelineDocument,
    index: usize,
    submitted: &str,
    message: String,
) -> StepView {
    let display_value = if submitted.trim().is_empty() {
        display_value(workflow, doc, index)
    } else {
        submitted.to_string()
    };
    StepView::InputPending {
        display_value,
        error: Some(message),
    }
}

/// Pre-fill for an editable step: its own value when it refills, otherwise
/// the transform of the previous step's value, otherwise empty.
pub fn display_value(workflow: &Workflow, doc: &PipelineDocument, index: usize) -> String {
    let step = &workflow.steps()[index];
    if step.is_refill() {
        if let Some(own) = doc.value(step.id(), step.done()) {
            return own;
        }
    }
    suggestion(workflow, doc, index).unwrap_or_default()
}

/// Transform applied to the immediately preceding step's value, if both exist.
pub fn suggestion(workflow: &Workflow, doc: &PipelineDocument, index: usize) -> Option<String> {
    let transform = workflow.steps()[index].transform_fn()?;
    let previous = workflow.steps().get(index.checked_sub(1)?)?;
    let value = doc.value(previous.id(), previous.done())?;
    Some(transform(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::step::StepDefinition;
    use chrono::Utc;

    fn greet(name: &str) -> String {
        format!("Hello {name}")
    }

    fn workflow() -> Workflow {
        Workflow::builder("demo", "Demo")
            .step(StepDefinition::new("step_01", "name", "Name").refill(true))
            .step(StepDefinition::new("step_02", "greeting", "Greeting").transform(greet))
            .step(StepDefinition::new("step_03", "note", "Note").transform(greet))
            .build()
            .unwrap()
    }

    #[test]
    fn test_unpopulated_step_is_input_pending() {
        let wf = workflow();
        let doc = PipelineDocument::new("p", Utc::now());

        let view = decide_view(&wf, &doc, 0);
        assert_eq!(
            view,
            StepView::InputPending { display_value: String::new(), error: None }
        );
        assert!(!view.signals_next());
    }

    #[test]
    fn test_populated_step_is_completed_and_chains() {
        let wf = workflow();
        let mut doc = PipelineDocument::new("p", Utc::now());
        doc.set_value("step_01", "name", "Ada");

        let view = decide_view(&wf, &doc, 0);
        assert_eq!(view, StepView::Completed { value: "Ada".to_string() });
        assert!(view.signals_next());
    }

    #[test]
    fn test_revert_target_forces_input_with_refill() {
        let wf = workflow();
        let mut doc = PipelineDocument::new("p", Utc::now());
        doc.set_value("step_01", "name", "Ada");
        doc.set_revert_target(Some("step_01".to_string()));

        assert_eq!(
            decide_view(&wf, &doc, 0),
            StepView::InputPending { display_value: "Ada".to_string(), error: None }
        );
    }

    #[test]
    fn test_finalized_locks_every_step() {
        let wf = workflow();
        let mut doc = PipelineDocument::new("p", Utc::now());
        doc.set_value("step_01", "name", "Ada");
        doc.set_revert_target(Some("step_01".to_string()));
        doc.set_finalized(true);

        let view = decide_view(&wf, &doc, 0);
        assert_eq!(view, StepView::Locked { value: "Ada".to_string() });
        assert!(view.signals_next());
    }

    #[test]
    fn test_finalized_gap_does_not_chain() {
        let wf = workflow();
        let mut doc = PipelineDocument::new("p", Utc::now());
        doc.set_value("step_01", "name", "Ada");
        doc.set_finalized(true);

        assert!(decide_view(&wf, &doc, 0).signals_next());
        let gap = decide_view(&wf, &doc, 1);
        assert_eq!(
            gap,
            StepView::InputPending { display_value: "Hello Ada".to_string(), error: None }
        );
        assert!(!gap.signals_next());
    }

    #[test]
    fn test_transform_uses_only_previous_step() {
        let wf = workflow();
        let mut doc = PipelineDocument::new("p", Utc::now());
        doc.set_value("step_01", "name", "Ada");

        assert_eq!(suggestion(&wf, &doc, 1).as_deref(), Some("Hello Ada"));
        // step_03 chains off step_02, which is still empty
        assert_eq!(suggestion(&wf, &doc, 2), None);
        assert_eq!(suggestion(&wf, &doc, 0), None);
    }

    #[test]
    fn test_rejected_input_echoes_submission() {
        let wf = workflow();
        let mut doc = PipelineDocument::new("p", Utc::now());
        doc.set_value("step_01", "name", "Ada");

        let blank = rejected_input(&wf, &doc, 1, "  ", "required".to_string());
        assert_eq!(
            blank,
            StepView::InputPending {
                display_value: "Hello Ada".to_string(),
                error: Some("required".to_string()),
            }
        );

        let echoed = rejected_input(&wf, &doc, 1, "Hi", "upstream down".to_string());
        assert!(matches!(echoed, StepView::InputPending { ref display_value, .. } if display_value == "Hi"));
    }
}
