// Property-Based Testing for revert and finalization invariants

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use pipulate::store::MemoryStore;
use pipulate::upstream::UpstreamExecutor;
use pipulate::workflows::{
    FinalizationController, LifecycleEvent, PipelineDocument, StepDefinition, StepView, Workflow, WorkflowEngine,
    WorkflowError,
};
use pipulate::SessionContext;
use proptest::prelude::*;

fn workflow(refills: &[bool]) -> Workflow {
    refills
        .iter()
        .enumerate()
        .fold(Workflow::builder("prop", "Property"), |builder, (i, refill)| {
            builder.step(
                StepDefinition::new(format!("step_{:02}", i + 1), format!("field_{i}"), format!("Field {i}"))
                    .refill(*refill),
            )
        })
        .build()
        .unwrap()
}

fn filled(workflow: &Workflow, values: &[String]) -> PipelineDocument {
    let mut doc = PipelineDocument::new("Default-prop-01", Utc::now());
    for (step, value) in workflow.steps().iter().zip(values) {
        doc.set_value(step.id(), step.done(), value.clone());
    }
    doc
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 ]{0,11}"
}

// Workflow shape plus a value per step and a revert position inside it
fn revert_case() -> impl Strategy<Value = (Vec<bool>, Vec<String>, usize)> {
    (1usize..=6).prop_flat_map(|len| {
        (
            prop::collection::vec(any::<bool>(), len),
            prop::collection::vec(value_strategy(), len),
            0..len,
        )
    })
}

proptest! {
    #[test]
    fn prop_revert_clears_exactly_the_later_steps((refills, values, k) in revert_case()) {
        let wf = workflow(&refills);
        let mut doc = filled(&wf, &values);

        doc.revert_to(&wf, k);

        for (i, step) in wf.steps().iter().enumerate() {
            let stored = doc.value(step.id(), step.done());
            if i < k {
                prop_assert_eq!(stored, Some(values[i].clone()));
            } else if i == k && step.is_refill() {
                prop_assert_eq!(stored, Some(values[i].clone()));
            } else {
                prop_assert_eq!(stored, None);
            }
        }
        prop_assert_eq!(doc.revert_target(), Some(wf.steps()[k].id()));
    }

    #[test]
    fn prop_reverted_step_is_input_pending((refills, values, k) in revert_case()) {
        let wf = workflow(&refills);
        let mut doc = filled(&wf, &values);
        doc.revert_to(&wf, k);

        let view = pipulate::workflows::view::decide_view(&wf, &doc, k);
        prop_assert!(view.is_input_pending());
        for i in 0..k {
            let completed = matches!(
                pipulate::workflows::view::decide_view(&wf, &doc, i),
                StepView::Completed { .. }
            );
            prop_assert!(completed, "earlier step {} should stay completed", i);
        }
    }

    #[test]
    fn prop_finalize_is_idempotent(events in prop::collection::vec(any::<bool>(), 1..12)) {
        let wf = workflow(&[false, false]);
        let mut doc = filled(&wf, &["a".to_string(), "b".to_string()]);

        for finalize in events {
            let event = if finalize { LifecycleEvent::Finalize } else { LifecycleEvent::Unfinalize };
            let mut controller = FinalizationController::for_document(&doc);
            let was_finalized = controller.is_finalized();

            let changed = controller.apply(event);
            prop_assert_eq!(changed, was_finalized != finalize);
            if changed {
                doc.set_finalized(controller.is_finalized());
            }
            prop_assert_eq!(doc.is_finalized(), finalize);
            prop_assert_eq!(controller.accepts_mutation(), !finalize);
        }
    }

    #[test]
    fn prop_finalized_instance_never_accepts_submission(value in value_strategy(), step in 0usize..2) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let store = Arc::new(MemoryStore::new());
            let session = SessionContext::new(store.clone(), "Default");
            let mut engine = WorkflowEngine::new(store, session, UpstreamExecutor::default());
            engine.register(pipulate::workflows::hello::workflow().unwrap()).unwrap();

            let key = "Default-hello-prop";
            engine.init("hello", key).await.unwrap();
            engine.submit("hello", key, "step_01", &HashMap::from([("name".to_string(), "Ada".to_string())])).await.unwrap();
            engine.submit("hello", key, "step_02", &HashMap::from([("greeting".to_string(), "Hi".to_string())])).await.unwrap();
            engine.finalize("hello", key).await.unwrap();
            let before = engine.read_state(key).await.unwrap();

            let (step_id, field) = [("step_01", "name"), ("step_02", "greeting")][step];
            let result = engine
                .submit("hello", key, step_id, &HashMap::from([(field.to_string(), value.clone())]))
                .await;

            let rejected = matches!(result, Err(WorkflowError::Finalized { .. }));
            prop_assert!(rejected);
            prop_assert_eq!(engine.read_state(key).await.unwrap(), before);
            Ok(())
        })?;
    }
}
