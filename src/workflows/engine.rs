// Workflow engine: init, submit, revert, finalize and rendering over a store

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::session::SessionContext;
use crate::store::{validate_key, PipelineRecord, PipelineStore, StoreError};
use crate::upstream::{StepRequest, UpstreamExecutor};
use crate::workflows::errors::WorkflowError;
use crate::workflows::keys;
use crate::workflows::lifecycle::{FinalizationController, LifecycleEvent};
use crate::workflows::pipeline::PipelineDocument;
use crate::workflows::render::{self, FinalizeCard, Fragment};
use crate::workflows::step::{Workflow, FINALIZE_STEP_ID};
use crate::workflows::view;

/// Result of entering a key on a workflow's landing form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// No key was entered: a fresh one was generated and the page should reload.
    Regenerate { pipeline_id: String },
    /// Instance created or resumed; `fragment` is the first step.
    Started {
        pipeline_id: String,
        resumed: bool,
        fragment: Fragment,
    },
}

pub struct WorkflowEngine {
    workflows: BTreeMap<String, Arc<Workflow>>,
    store: Arc<dyn PipelineStore>,
    session: SessionContext,
    upstream: UpstreamExecutor,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn PipelineStore>, session: SessionContext, upstream: UpstreamExecutor) -> Self {
        Self {
            workflows: BTreeMap::new(),
            store,
            session,
            upstream,
        }
    }

    pub fn register(&mut self, workflow: Workflow) -> Result<(), WorkflowError> {
        let app = workflow.app_name().to_string();
        if self.workflows.contains_key(&app) {
            return Err(WorkflowError::DuplicateWorkflow { app });
        }
        info!(app = %app, steps = workflow.steps().len(), "Workflow registered");
        self.workflows.insert(app, Arc::new(workflow));
        Ok(())
    }

    pub fn workflow(&self, app: &str) -> Result<Arc<Workflow>, WorkflowError> {
        self.workflows
            .get(app)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownWorkflow { app: app.to_string() })
    }

    pub fn workflows(&self) -> impl Iterator<Item = &Workflow> {
        self.workflows.values().map(|w| w.as_ref())
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Start or resume an instance from a user-entered key.
    #[instrument(skip(self), fields(correlation_id = %crate::telemetry::generate_correlation_id()))]
    pub async fn init(&self, app: &str, raw_key: &str) -> Result<InitOutcome, WorkflowError> {
        let workflow = self.workflow(app)?;
        let profile = self.session.profile_name().await?;
        let raw_key = raw_key.trim();

        if raw_key.is_empty() {
            let existing = self.store.keys_for_app(app).await?;
            let pipeline_id = keys::next_key(&profile, app, &existing);
            self.session.set_current_pipeline_id(&pipeline_id).await?;
            self.session.set_last_app(app).await?;
            info!(pipeline_id = %pipeline_id, "Generated fresh pipeline key");
            return Ok(InitOutcome::Regenerate { pipeline_id });
        }

        let pipeline_id = keys::normalize_key(&profile, app, raw_key);
        validate_key(&pipeline_id)?;

        let resumed = match self.store.get(&pipeline_id).await.map_err(from_store)? {
            Some(record) if record.app_name != app => {
                return Err(WorkflowError::WrongWorkflow {
                    pipeline_id,
                    expected: app.to_string(),
                    actual: record.app_name,
                });
            }
            Some(_) => true,
            None => {
                let mut doc = PipelineDocument::new(&pipeline_id, Utc::now());
                self.save(&workflow, &mut doc).await?;
                false
            }
        };

        self.session.set_current_pipeline_id(&pipeline_id).await?;
        self.session.set_last_app(app).await?;
        info!(pipeline_id = %pipeline_id, resumed, "Pipeline entered");

        let fragment = self
            .render_step(app, &pipeline_id, workflow.first_step().id())
            .await?;
        Ok(InitOutcome::Started {
            pipeline_id,
            resumed,
            fragment,
        })
    }

    /// Landing page HTML: key input pre-filled with the session's current key
    /// for this app, or the next free key.
    pub async fn landing(&self, app: &str) -> Result<String, WorkflowError> {
        let workflow = self.workflow(app)?;
        let profile = self.session.profile_name().await?;
        let existing = self.store.keys_for_app(app).await?;

        let suggested = match self.session.current_pipeline_id().await? {
            Some(current) if existing.contains(&current) => current,
            _ => keys::next_key(&profile, app, &existing),
        };
        Ok(render::render_landing(&workflow, &suggested, &existing))
    }

    pub async fn list_instances(&self, app: &str) -> Result<Vec<String>, WorkflowError> {
        self.workflow(app)?;
        Ok(self.store.keys_for_app(app).await?)
    }

    /// The stored document, regardless of which workflow owns it.
    pub async fn read_state(&self, pipeline_id: &str) -> Result<PipelineDocument, WorkflowError> {
        let record = self
            .store
            .get(pipeline_id)
            .await
            .map_err(from_store)?
            .ok_or_else(|| WorkflowError::InstanceNotFound {
                pipeline_id: pipeline_id.to_string(),
            })?;
        PipelineDocument::from_json(pipeline_id, &record.data)
    }

    pub async fn app_of(&self, pipeline_id: &str) -> Result<Option<String>, WorkflowError> {
        Ok(self
            .store
            .get(pipeline_id)
            .await
            .map_err(from_store)?
            .map(|record| record.app_name))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, pipeline_id: &str) -> Result<bool, WorkflowError> {
        let removed = self.store.delete(pipeline_id).await?;
        if self.session.current_pipeline_id().await?.as_deref() == Some(pipeline_id) {
            self.session.clear_current_pipeline_id().await?;
        }
        info!(removed, "Pipeline deleted");
        Ok(removed)
    }

    /// Render one container: a step, or the finalize card.
    pub async fn render_step(&self, app: &str, pipeline_id: &str, step_id: &str) -> Result<Fragment, WorkflowError> {
        let workflow = self.workflow(app)?;
        let doc = self.load(&workflow, pipeline_id).await?;

        if step_id == FINALIZE_STEP_ID {
            return Ok(finalize_card(&workflow, &doc));
        }
        let index = step_index(&workflow, step_id)?;
        Ok(render::render_step(&workflow, index, view::decide_view(&workflow, &doc, index)))
    }

    /// Every fragment the client would load by following load triggers from
    /// the first step.
    pub async fn render_chain(&self, app: &str, pipeline_id: &str) -> Result<Vec<Fragment>, WorkflowError> {
        let workflow = self.workflow(app)?;
        let doc = self.load(&workflow, pipeline_id).await?;

        let mut fragments = Vec::with_capacity(workflow.steps().len() + 1);
        for index in 0..workflow.steps().len() {
            let fragment = render::render_step(&workflow, index, view::decide_view(&workflow, &doc, index));
            let chains = fragment.next.is_some();
            fragments.push(fragment);
            if !chains {
                return Ok(fragments);
            }
        }
        fragments.push(finalize_card(&workflow, &doc));
        Ok(fragments)
    }

    /// Handle a form submission for one step.
    ///
    /// Missing input and failed external calls come back as the step's form
    /// with an inline message; only engine-level failures are errors.
    #[instrument(skip(self, form), fields(correlation_id = %crate::telemetry::generate_correlation_id()))]
    pub async fn submit(
        &self,
        app: &str,
        pipeline_id: &str,
        step_id: &str,
        form: &HashMap<String, String>,
    ) -> Result<Fragment, WorkflowError> {
        let workflow = self.workflow(app)?;
        let index = step_index(&workflow, step_id)?;
        let step = &workflow.steps()[index];

        let mut doc = match self.load(&workflow, pipeline_id).await {
            Ok(doc) => doc,
            Err(WorkflowError::InstanceNotFound { .. }) => {
                validate_key(pipeline_id)?;
                PipelineDocument::new(pipeline_id, Utc::now())
            }
            Err(e) => return Err(e),
        };

        if !FinalizationController::for_document(&doc).accepts_mutation() {
            warn!("Submission rejected, pipeline is finalized");
            return Err(WorkflowError::Finalized {
                pipeline_id: pipeline_id.to_string(),
            });
        }

        // a completed step only changes through revert, which clears what follows it
        if doc.value(step.id(), step.done()).is_some() && doc.revert_target() != Some(step.id()) {
            debug!("Submission to a completed step ignored");
            return Ok(render::render_step(&workflow, index, view::decide_view(&workflow, &doc, index)));
        }

        let submitted = form.get(step.done()).map(String::as_str).unwrap_or("");
        let value = submitted.trim();

        if value.is_empty() {
            debug!("Empty submission");
            let view = view::rejected_input(&workflow, &doc, index, submitted, format!("Please enter {}", step.show()));
            return Ok(render::render_step(&workflow, index, view));
        }

        if let Some(blocking) = workflow.steps()[..index]
            .iter()
            .find(|earlier| {
                doc.value(earlier.id(), earlier.done()).is_none() || doc.revert_target() == Some(earlier.id())
            })
        {
            debug!(blocking_step = %blocking.id(), "Submission ahead of an incomplete step");
            let view = view::rejected_input(
                &workflow,
                &doc,
                index,
                submitted,
                format!("Complete '{}' first", blocking.show()),
            );
            return Ok(render::render_step(&workflow, index, view));
        }

        let stored = match workflow.action(step.id()) {
            None => value.to_string(),
            Some(action) => {
                let request = StepRequest {
                    app_name: app.to_string(),
                    pipeline_id: pipeline_id.to_string(),
                    step_id: step.id().to_string(),
                    value: value.to_string(),
                };
                match self.upstream.call(step.id(), || action.run(&request)).await {
                    Ok(output) => output,
                    Err(e) => {
                        let message = format!("{} could not be completed: {}", step.show(), e.summary());
                        let view = view::rejected_input(&workflow, &doc, index, submitted, message);
                        return Ok(render::render_step(&workflow, index, view));
                    }
                }
            }
        };

        doc.set_value(step.id(), step.done(), stored);
        doc.set_revert_target(None);
        self.save(&workflow, &mut doc).await?;
        info!("Step completed");

        Ok(render::render_step(&workflow, index, view::decide_view(&workflow, &doc, index)))
    }

    /// Reopen `step_id` and clear every later step.
    #[instrument(skip(self))]
    pub async fn revert(&self, app: &str, pipeline_id: &str, step_id: &str) -> Result<Fragment, WorkflowError> {
        let workflow = self.workflow(app)?;
        let index = step_index(&workflow, step_id)?;
        let mut doc = self.load(&workflow, pipeline_id).await?;

        if !FinalizationController::for_document(&doc).accepts_mutation() {
            warn!("Revert rejected, pipeline is finalized");
            return Err(WorkflowError::Finalized {
                pipeline_id: pipeline_id.to_string(),
            });
        }

        doc.revert_to(&workflow, index);
        self.save(&workflow, &mut doc).await?;
        info!(cleared_from = index, "Step reverted");

        Ok(render::render_step(&workflow, index, view::decide_view(&workflow, &doc, index)))
    }

    /// Lock the instance. Every step must hold a value. Calling it on a
    /// finalized instance changes nothing.
    #[instrument(skip(self))]
    pub async fn finalize(&self, app: &str, pipeline_id: &str) -> Result<Fragment, WorkflowError> {
        let workflow = self.workflow(app)?;
        let mut doc = self.load(&workflow, pipeline_id).await?;
        let mut controller = FinalizationController::for_document(&doc);

        if !controller.is_finalized() {
            let missing = doc.missing_steps(&workflow);
            if !missing.is_empty() {
                return Err(WorkflowError::Incomplete {
                    pipeline_id: pipeline_id.to_string(),
                    missing,
                });
            }
        }

        if controller.apply(LifecycleEvent::Finalize) {
            doc.set_finalized(true);
            doc.set_revert_target(None);
            self.save(&workflow, &mut doc).await?;
        } else {
            debug!("Pipeline already finalized");
        }

        self.render_step(app, pipeline_id, workflow.first_step().id()).await
    }

    #[instrument(skip(self))]
    pub async fn unfinalize(&self, app: &str, pipeline_id: &str) -> Result<Fragment, WorkflowError> {
        let workflow = self.workflow(app)?;
        let mut doc = self.load(&workflow, pipeline_id).await?;
        let mut controller = FinalizationController::for_document(&doc);

        if controller.apply(LifecycleEvent::Unfinalize) {
            doc.set_finalized(false);
            self.save(&workflow, &mut doc).await?;
        } else {
            debug!("Pipeline was not finalized");
        }

        self.render_step(app, pipeline_id, workflow.first_step().id()).await
    }

    /// Inline rendering of an engine error for `target`.
    pub fn render_error(&self, app: &str, target: &str, error: &WorkflowError) -> Fragment {
        render::render_failure(app, target, &error.to_string(), error.offers_new_instance())
    }

    async fn load(&self, workflow: &Workflow, pipeline_id: &str) -> Result<PipelineDocument, WorkflowError> {
        let record = self
            .store
            .get(pipeline_id)
            .await
            .map_err(from_store)?
            .ok_or_else(|| WorkflowError::InstanceNotFound {
                pipeline_id: pipeline_id.to_string(),
            })?;

        if record.app_name != workflow.app_name() {
            return Err(WorkflowError::WrongWorkflow {
                pipeline_id: pipeline_id.to_string(),
                expected: workflow.app_name().to_string(),
                actual: record.app_name,
            });
        }

        PipelineDocument::from_json(pipeline_id, &record.data).inspect_err(|e| {
            warn!(pipeline_id = %pipeline_id, error = %e, "Pipeline state is unreadable");
        })
    }

    async fn save(&self, workflow: &Workflow, doc: &mut PipelineDocument) -> Result<(), WorkflowError> {
        doc.touch(Utc::now());
        let record = PipelineRecord {
            pkey: doc.pipeline_id().to_string(),
            app_name: workflow.app_name().to_string(),
            data: doc.to_json()?,
            created: doc.created(),
            updated: doc.updated(),
        };
        self.store.put(record).await?;
        Ok(())
    }
}

fn step_index(workflow: &Workflow, step_id: &str) -> Result<usize, WorkflowError> {
    workflow
        .position(step_id)
        .ok_or_else(|| WorkflowError::UnknownStep {
            app: workflow.app_name().to_string(),
            step_id: step_id.to_string(),
        })
}

fn finalize_card(workflow: &Workflow, doc: &PipelineDocument) -> Fragment {
    let card = if doc.is_finalized() {
        FinalizeCard::Locked
    } else if doc.missing_steps(workflow).is_empty() {
        FinalizeCard::Ready
    } else {
        FinalizeCard::Hidden
    };
    render::render_finalize(workflow, card)
}

/// A record the store itself cannot decode is corruption of that instance.
fn from_store(error: StoreError) -> WorkflowError {
    match error {
        StoreError::CorruptRecord { key, reason } => WorkflowError::StateCorruption {
            pipeline_id: key,
            reason,
        },
        other => WorkflowError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::upstream::{MockStepAction, RetryConfig, UpstreamError};
    use crate::workflows::step::StepDefinition;
    use crate::workflows::view::StepView;
    use std::time::Duration;

    fn form(field: &str, value: &str) -> HashMap<String, String> {
        HashMap::from([(field.to_string(), value.to_string())])
    }

    fn fast_upstream() -> UpstreamExecutor {
        UpstreamExecutor::new(RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(2),
            max_delay: Duration::from_millis(4),
            timeout: Duration::from_secs(1),
            jitter: false,
            requests_per_second: 0,
        })
    }

    fn engine_with(action: MockStepAction) -> WorkflowEngine {
        let store = Arc::new(MemoryStore::new());
        let session = SessionContext::new(store.clone(), "Default");
        let mut engine = WorkflowEngine::new(store, session, fast_upstream());
        let workflow = Workflow::builder("lookup", "Lookup")
            .step(StepDefinition::new("step_01", "domain", "Domain"))
            .step(StepDefinition::new("step_02", "report", "Report"))
            .action("step_01", Arc::new(action))
            .build()
            .unwrap();
        engine.register(workflow).unwrap();
        engine
    }

    #[tokio::test]
    async fn test_action_output_is_stored() {
        let mut action = MockStepAction::new();
        action
            .expect_run()
            .times(1)
            .returning(|request| Ok(format!("resolved:{}", request.value)));
        let engine = engine_with(action);

        let fragment = engine
            .submit("lookup", "Default-lookup-01", "step_01", &form("domain", "example.com"))
            .await
            .unwrap();

        assert_eq!(
            fragment.step_view(),
            Some(&StepView::Completed { value: "resolved:example.com".to_string() })
        );
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let mut action = MockStepAction::new();
        let mut calls = 0u32;
        action.expect_run().times(3).returning(move |_| {
            calls += 1;
            if calls < 3 {
                Err(UpstreamError::RateLimited { retry_after_secs: None })
            } else {
                Ok("ok".to_string())
            }
        });
        let engine = engine_with(action);

        let fragment = engine
            .submit("lookup", "Default-lookup-01", "step_01", &form("domain", "example.com"))
            .await
            .unwrap();

        assert_eq!(fragment.step_view(), Some(&StepView::Completed { value: "ok".to_string() }));
    }

    #[tokio::test]
    async fn test_exhausted_retries_render_inline_and_store_nothing() {
        let mut action = MockStepAction::new();
        action
            .expect_run()
            .times(3)
            .returning(|_| Err(UpstreamError::Server { status: 503, message: "unavailable".to_string() }));
        let engine = engine_with(action);

        let fragment = engine
            .submit("lookup", "Default-lookup-01", "step_01", &form("domain", "example.com"))
            .await
            .unwrap();

        match fragment.step_view() {
            Some(StepView::InputPending { display_value, error: Some(message) }) => {
                assert_eq!(display_value, "example.com");
                assert!(message.contains("service error 503"));
            }
            other => panic!("expected inline upstream error, got {other:?}"),
        }
        assert!(matches!(
            engine.read_state("Default-lookup-01").await,
            Err(WorkflowError::InstanceNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_out_of_order_submission_rejected_inline() {
        let engine = engine_with(MockStepAction::new());

        let fragment = engine
            .submit("lookup", "Default-lookup-01", "step_02", &form("report", "early"))
            .await
            .unwrap();

        assert!(matches!(
            fragment.step_view(),
            Some(StepView::InputPending { error: Some(_), .. })
        ));
    }

    #[tokio::test]
    async fn test_resubmitting_completed_step_keeps_document() {
        let mut action = MockStepAction::new();
        action
            .expect_run()
            .times(1)
            .returning(|request| Ok(format!("resolved:{}", request.value)));
        let engine = engine_with(action);
        let key = "Default-lookup-01";

        engine.submit("lookup", key, "step_01", &form("domain", "example.com")).await.unwrap();
        engine.submit("lookup", key, "step_02", &form("report", "fine")).await.unwrap();

        let fragment = engine
            .submit("lookup", key, "step_01", &form("domain", "other.org"))
            .await
            .unwrap();

        assert_eq!(
            fragment.step_view(),
            Some(&StepView::Completed { value: "resolved:example.com".to_string() })
        );
        let doc = engine.read_state(key).await.unwrap();
        assert_eq!(doc.value("step_01", "domain").as_deref(), Some("resolved:example.com"));
        assert_eq!(doc.value("step_02", "report").as_deref(), Some("fine"));
    }

    #[tokio::test]
    async fn test_reopened_refill_step_blocks_later_steps() {
        let store = Arc::new(MemoryStore::new());
        let session = SessionContext::new(store.clone(), "Default");
        let mut engine = WorkflowEngine::new(store, session, fast_upstream());
        let workflow = Workflow::builder("notes", "Notes")
            .step(StepDefinition::new("step_01", "title", "Title").refill(true))
            .step(StepDefinition::new("step_02", "body", "Body"))
            .build()
            .unwrap();
        engine.register(workflow).unwrap();
        let key = "Default-notes-01";

        engine.submit("notes", key, "step_01", &form("title", "Draft")).await.unwrap();
        engine.submit("notes", key, "step_02", &form("body", "text")).await.unwrap();
        engine.revert("notes", key, "step_01").await.unwrap();

        // the old title is still stored, but the step is open again
        let early = engine
            .submit("notes", key, "step_02", &form("body", "skipped ahead"))
            .await
            .unwrap();
        match early.step_view() {
            Some(StepView::InputPending { error: Some(message), .. }) => {
                assert_eq!(message, "Complete 'Title' first")
            }
            other => panic!("expected the reopened step to block, got {other:?}"),
        }
        assert_eq!(engine.read_state(key).await.unwrap().value("step_02", "body"), None);

        let title = engine.submit("notes", key, "step_01", &form("title", "Final")).await.unwrap();
        assert_eq!(title.step_view(), Some(&StepView::Completed { value: "Final".to_string() }));
        engine.submit("notes", key, "step_02", &form("body", "text")).await.unwrap();
        assert_eq!(
            engine.read_state(key).await.unwrap().value("step_02", "body").as_deref(),
            Some("text")
        );
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let mut engine = engine_with(MockStepAction::new());
        let again = Workflow::builder("lookup", "Again")
            .step(StepDefinition::new("step_01", "x", "X"))
            .build()
            .unwrap();
        assert!(matches!(engine.register(again), Err(WorkflowError::DuplicateWorkflow { .. })));
        assert!(matches!(engine.workflow("missing"), Err(WorkflowError::UnknownWorkflow { .. })));
    }
}
