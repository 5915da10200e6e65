//! HTTP surface for workflows.
//!
//! Every step endpoint answers with an HTML fragment addressed to that step's
//! container. Validation and engine failures render inline with status 200 so
//! the client swaps them into place; only unknown apps or steps are 404s.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, Instrument};

use crate::telemetry::workflow_span;
use crate::workflows::{InitOutcome, WorkflowEngine, WorkflowError, FINALIZE_STEP_ID};

pub const REFRESH_HEADER: &str = "HX-Refresh";

/// Shared server state.
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
}

pub fn router(engine: Arc<WorkflowEngine>) -> Router {
    let state = Arc::new(AppState { engine });

    Router::new()
        .route("/health", get(health))
        .route("/{app}", get(landing))
        .route("/{app}/init", post(init))
        .route("/{app}/revert", post(revert))
        .route("/{app}/finalize", get(finalize_card).post(finalize))
        .route("/{app}/unfinalize", post(unfinalize))
        .route("/{app}/{step}", get(step))
        .route("/{app}/{step}/submit", post(submit))
        .with_state(state)
}

/// Start the HTTP server.
pub async fn run_http_server(engine: Arc<WorkflowEngine>, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid listen address {host}:{port}"))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, router(engine))
        .await
        .context("Server error")
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    workflows: Vec<String>,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        workflows: state.engine.workflows().map(|w| w.app_name().to_string()).collect(),
    })
}

async fn landing(State(state): State<Arc<AppState>>, Path(app): Path<String>) -> Response {
    match state.engine.landing(&app).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => error_response(&state.engine, &app, &format!("{app}-container"), e),
    }
}

#[derive(Debug, Deserialize)]
pub struct InitForm {
    #[serde(default)]
    pub pipeline_id: String,
}

async fn init(
    State(state): State<Arc<AppState>>,
    Path(app): Path<String>,
    Form(form): Form<InitForm>,
) -> Response {
    let span = workflow_span("init", &app, None);
    match state.engine.init(&app, &form.pipeline_id).instrument(span).await {
        Ok(InitOutcome::Regenerate { .. }) => {
            ([(REFRESH_HEADER, "true")], Html(String::new())).into_response()
        }
        Ok(InitOutcome::Started { fragment, .. }) => Html(fragment.html).into_response(),
        Err(e) => error_response(&state.engine, &app, &format!("{app}-container"), e),
    }
}

async fn step(State(state): State<Arc<AppState>>, Path((app, step_id)): Path<(String, String)>) -> Response {
    render_container(&state.engine, &app, &step_id).await
}

async fn finalize_card(State(state): State<Arc<AppState>>, Path(app): Path<String>) -> Response {
    render_container(&state.engine, &app, FINALIZE_STEP_ID).await
}

async fn render_container(engine: &WorkflowEngine, app: &str, target: &str) -> Response {
    let result = async {
        let pipeline_id = current_pipeline(engine).await?;
        engine.render_step(app, &pipeline_id, target).await
    }
    .instrument(workflow_span("render", app, None))
    .await;

    match result {
        Ok(fragment) => Html(fragment.html).into_response(),
        Err(e) => error_response(engine, app, target, e),
    }
}

async fn submit(
    State(state): State<Arc<AppState>>,
    Path((app, step_id)): Path<(String, String)>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let engine = &state.engine;
    let pipeline_id = match current_pipeline(engine).await {
        Ok(id) => id,
        Err(e) => return error_response(engine, &app, &step_id, e),
    };

    let span = workflow_span("submit", &app, Some(&pipeline_id));
    match engine.submit(&app, &pipeline_id, &step_id, &form).instrument(span).await {
        Ok(fragment) => Html(fragment.html).into_response(),
        Err(WorkflowError::Finalized { .. }) => locked_view(engine, &app, &pipeline_id, &step_id).await,
        Err(e) => error_response(engine, &app, &step_id, e),
    }
}

#[derive(Debug, Deserialize)]
pub struct RevertForm {
    pub step_id: String,
}

async fn revert(
    State(state): State<Arc<AppState>>,
    Path(app): Path<String>,
    Form(form): Form<RevertForm>,
) -> Response {
    let engine = &state.engine;
    let pipeline_id = match current_pipeline(engine).await {
        Ok(id) => id,
        Err(e) => return error_response(engine, &app, &form.step_id, e),
    };

    let span = workflow_span("revert", &app, Some(&pipeline_id));
    match engine.revert(&app, &pipeline_id, &form.step_id).instrument(span).await {
        Ok(fragment) => Html(fragment.html).into_response(),
        Err(WorkflowError::Finalized { .. }) => locked_view(engine, &app, &pipeline_id, &form.step_id).await,
        Err(e) => error_response(engine, &app, &form.step_id, e),
    }
}

async fn finalize(State(state): State<Arc<AppState>>, Path(app): Path<String>) -> Response {
    lifecycle(&state.engine, &app, true).await
}

async fn unfinalize(State(state): State<Arc<AppState>>, Path(app): Path<String>) -> Response {
    lifecycle(&state.engine, &app, false).await
}

async fn lifecycle(engine: &WorkflowEngine, app: &str, finalize: bool) -> Response {
    let operation = if finalize { "finalize" } else { "unfinalize" };
    let result = async {
        let pipeline_id = current_pipeline(engine).await?;
        if finalize {
            engine.finalize(app, &pipeline_id).await
        } else {
            engine.unfinalize(app, &pipeline_id).await
        }
    }
    .instrument(workflow_span(operation, app, None))
    .await;

    match result {
        Ok(fragment) => Html(fragment.html).into_response(),
        Err(e) => error_response(engine, app, FINALIZE_STEP_ID, e),
    }
}

async fn current_pipeline(engine: &WorkflowEngine) -> Result<String, WorkflowError> {
    engine
        .session()
        .current_pipeline_id()
        .await?
        .ok_or(WorkflowError::NoActivePipeline)
}

/// A mutation against a finalized instance answers with the step's locked view.
async fn locked_view(engine: &WorkflowEngine, app: &str, pipeline_id: &str, step_id: &str) -> Response {
    match engine.render_step(app, pipeline_id, step_id).await {
        Ok(fragment) => Html(fragment.html).into_response(),
        Err(e) => error_response(engine, app, step_id, e),
    }
}

fn error_response(engine: &WorkflowEngine, app: &str, target: &str, error: WorkflowError) -> Response {
    let status = match &error {
        WorkflowError::UnknownWorkflow { .. } | WorkflowError::UnknownStep { .. } => StatusCode::NOT_FOUND,
        WorkflowError::Store(_) | WorkflowError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    };
    if status != StatusCode::OK {
        tracing::warn!(app = %app, container = %target, error = %error, status = status.as_u16(), "Request failed");
    }
    (status, Html(engine.render_error(app, target, &error).html)).into_response()
}
