// Versioned per-instance state document
//
// Persisted as one flat JSON object: every non-reserved key is a step id
// mapping to that step's named result fields.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::workflows::errors::WorkflowError;
use crate::workflows::step::Workflow;

pub const SCHEMA_VERSION: u64 = 1;

pub const SCHEMA_VERSION_KEY: &str = "_schema_version";
pub const PIPELINE_ID_KEY: &str = "pipeline_id";
pub const CREATED_KEY: &str = "created";
pub const UPDATED_KEY: &str = "updated";
pub const FINALIZE_KEY: &str = "finalize";
pub const FINALIZED_FIELD: &str = "finalized";
pub const REVERT_TARGET_KEY: &str = "_revert_target";

pub const RESERVED_KEYS: &[&str] = &[
    SCHEMA_VERSION_KEY,
    PIPELINE_ID_KEY,
    CREATED_KEY,
    UPDATED_KEY,
    FINALIZE_KEY,
    REVERT_TARGET_KEY,
];

/// Named result fields recorded by one step.
pub type StepData = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDocument {
    pipeline_id: String,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    steps: BTreeMap<String, StepData>,
    finalized: bool,
    revert_target: Option<String>,
}

impl PipelineDocument {
    pub fn new(pipeline_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            created: now,
            updated: now,
            steps: BTreeMap::new(),
            finalized: false,
            revert_target: None,
        }
    }

    /// Parse a stored document, upgrading unversioned (v0) documents in place.
    pub fn from_json(pipeline_id: &str, raw: &str) -> Result<Self, WorkflowError> {
        let corrupt = |reason: String| WorkflowError::StateCorruption {
            pipeline_id: pipeline_id.to_string(),
            reason,
        };

        let value: Value = serde_json::from_str(raw).map_err(|e| corrupt(e.to_string()))?;
        let Value::Object(object) = value else {
            return Err(corrupt("document is not a JSON object".to_string()));
        };

        let version = match object.get(SCHEMA_VERSION_KEY) {
            None => 0,
            Some(v) => v
                .as_u64()
                .ok_or_else(|| corrupt(format!("invalid schema version {v}")))?,
        };
        if version > SCHEMA_VERSION {
            return Err(corrupt(format!(
                "schema version {version} is newer than supported version {SCHEMA_VERSION}"
            )));
        }

        let now = Utc::now();
        let created = parse_timestamp(object.get(CREATED_KEY)).unwrap_or(now);
        let updated = parse_timestamp(object.get(UPDATED_KEY)).unwrap_or(created);

        let finalized = object
            .get(FINALIZE_KEY)
            .and_then(|f| f.get(FINALIZED_FIELD))
            .map(is_truthy)
            .unwrap_or(false);

        let revert_target = object
            .get(REVERT_TARGET_KEY)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let mut steps = BTreeMap::new();
        for (key, value) in object {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            // v0 documents may carry loose scalar keys; only objects are step data
            if let Value::Object(fields) = value {
                steps.insert(key, fields.into_iter().collect::<StepData>());
            }
        }

        Ok(Self {
            pipeline_id: pipeline_id.to_string(),
            created,
            updated,
            steps,
            finalized,
            revert_target,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert(SCHEMA_VERSION_KEY.to_string(), Value::from(SCHEMA_VERSION));
        object.insert(PIPELINE_ID_KEY.to_string(), Value::from(self.pipeline_id.clone()));
        object.insert(CREATED_KEY.to_string(), Value::from(self.created.to_rfc3339()));
        object.insert(UPDATED_KEY.to_string(), Value::from(self.updated.to_rfc3339()));

        for (step_id, fields) in &self.steps {
            let fields: Map<String, Value> =
                fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            object.insert(step_id.clone(), Value::Object(fields));
        }

        if self.finalized {
            let mut finalize = Map::new();
            finalize.insert(FINALIZED_FIELD.to_string(), Value::Bool(true));
            object.insert(FINALIZE_KEY.to_string(), Value::Object(finalize));
        }
        if let Some(target) = &self.revert_target {
            object.insert(REVERT_TARGET_KEY.to_string(), Value::from(target.clone()));
        }

        Value::Object(object)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_value())
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn updated(&self) -> DateTime<Utc> {
        self.updated
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated = now;
    }

    pub fn step(&self, step_id: &str) -> Option<&StepData> {
        self.steps.get(step_id)
    }

    /// The populated value of one result field. Empty strings and nulls read as absent.
    pub fn value(&self, step_id: &str, field: &str) -> Option<String> {
        match self.steps.get(step_id)?.get(field)? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn set_value(&mut self, step_id: &str, field: &str, value: impl Into<String>) {
        self.steps
            .entry(step_id.to_string())
            .or_default()
            .insert(field.to_string(), Value::String(value.into()));
    }

    pub fn clear_step(&mut self, step_id: &str) -> bool {
        self.steps.remove(step_id).is_some()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn set_finalized(&mut self, finalized: bool) {
        self.finalized = finalized;
    }

    pub fn revert_target(&self) -> Option<&str> {
        self.revert_target.as_deref()
    }

    pub fn set_revert_target(&mut self, target: Option<String>) {
        self.revert_target = target;
    }

    /// Reopen the step at `index`: every later step loses its data, the step
    /// itself keeps its old value only when it refills on revert.
    pub fn revert_to(&mut self, workflow: &Workflow, index: usize) {
        for (position, step) in workflow.steps().iter().enumerate().skip(index) {
            if position == index && step.is_refill() {
                continue;
            }
            self.steps.remove(step.id());
        }
        self.revert_target = workflow.steps().get(index).map(|s| s.id().to_string());
    }

    /// Ids of steps in `workflow` with no recorded value, in step order.
    pub fn missing_steps(&self, workflow: &Workflow) -> Vec<String> {
        workflow
            .steps()
            .iter()
            .filter(|step| self.value(step.id(), step.done()).is_none())
            .map(|step| step.id().to_string())
            .collect()
    }
}

fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let raw = value?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => true,
    }
}
