// HTML fragment rendering for HTMX-driven step chains

use crate::workflows::step::{StepDefinition, Workflow, FINALIZE_STEP_ID};
use crate::workflows::view::StepView;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeCard {
    /// Instance locked; offers unlock.
    Locked,
    /// Every step has a value; offers finalize.
    Ready,
    /// Steps still missing; renders an empty placeholder.
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentKind {
    Step(StepView),
    Finalize(FinalizeCard),
    Failure { message: String },
}

/// A rendered piece of UI addressed to one DOM container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub target: String,
    pub kind: FragmentKind,
    /// Container the client should load next, if this fragment chains forward.
    pub next: Option<String>,
    pub html: String,
}

impl Fragment {
    pub fn step_view(&self) -> Option<&StepView> {
        match &self.kind {
            FragmentKind::Step(view) => Some(view),
            _ => None,
        }
    }
}

pub fn render_step(workflow: &Workflow, index: usize, view: StepView) -> Fragment {
    let step = &workflow.steps()[index];
    let app = workflow.app_name();
    let next = view
        .signals_next()
        .then(|| workflow.next_container(index).to_string());

    let body = match &view {
        StepView::Locked { value } => format!(
            r#"<div class="card locked"><h4>{label}</h4><p>🔒 {value}</p></div>"#,
            label = escape(step.show()),
            value = escape(value),
        ),
        StepView::Completed { value } => format!(
            concat!(
                r#"<div class="card completed"><h4>{label}</h4><p>{value}</p>"#,
                r##"<form hx-post="/{app}/revert" hx-target="#{id}" hx-swap="outerHTML">"##,
                r#"<input type="hidden" name="step_id" value="{id}">"#,
                r#"<button type="submit" class="secondary">↶ Revert</button></form></div>"#,
            ),
            label = escape(step.show()),
            value = escape(value),
            app = escape(app),
            id = escape(step.id()),
        ),
        StepView::InputPending { display_value, error } => input_form(app, step, display_value, error.as_deref()),
    };

    let html = format!(
        r#"<div id="{id}">{body}{placeholder}</div>"#,
        id = escape(step.id()),
        placeholder = next
            .as_deref()
            .map(|next| placeholder(app, next))
            .unwrap_or_default(),
    );

    Fragment {
        target: step.id().to_string(),
        kind: FragmentKind::Step(view),
        next,
        html,
    }
}

fn input_form(app: &str, step: &StepDefinition, display_value: &str, error: Option<&str>) -> String {
    let error_html = error
        .map(|message| format!(r#"<p class="error" role="alert">{}</p>"#, escape(message)))
        .unwrap_or_default();
    format!(
        concat!(
            r##"<div class="card"><form hx-post="/{app}/{id}/submit" hx-target="#{id}" hx-swap="outerHTML">"##,
            r#"<label for="{field}">{label}</label>"#,
            r#"<input type="text" id="{field}" name="{field}" value="{value}" required autofocus>"#,
            r#"{error}<button type="submit">Next ▸</button></form></div>"#,
        ),
        app = escape(app),
        id = escape(step.id()),
        field = escape(step.done()),
        label = escape(step.show()),
        value = escape(display_value),
        error = error_html,
    )
}

pub fn render_finalize(workflow: &Workflow, card: FinalizeCard) -> Fragment {
    let app = escape(workflow.app_name());
    let body = match card {
        FinalizeCard::Locked => format!(
            concat!(
                r#"<div class="card locked"><h4>🔒 Workflow is locked</h4>"#,
                r##"<form hx-post="/{app}/unfinalize" hx-target="#{app}-container">"##,
                r#"<button type="submit" class="secondary">Unlock 🔓</button></form></div>"#,
            ),
            app = app,
        ),
        FinalizeCard::Ready => format!(
            concat!(
                r#"<div class="card"><h4>All steps complete</h4>"#,
                r##"<form hx-post="/{app}/finalize" hx-target="#{app}-container">"##,
                r#"<button type="submit">Finalize 🔒</button></form></div>"#,
            ),
            app = app,
        ),
        FinalizeCard::Hidden => String::new(),
    };

    Fragment {
        target: FINALIZE_STEP_ID.to_string(),
        kind: FragmentKind::Finalize(card),
        next: None,
        html: format!(r#"<div id="{FINALIZE_STEP_ID}">{body}</div>"#),
    }
}

/// Inline error for one container. `offer_new` adds a control that starts a
/// fresh instance.
pub fn render_failure(app: &str, target: &str, message: &str, offer_new: bool) -> Fragment {
    let restart = if offer_new {
        format!(
            concat!(
                r#"<form hx-post="/{app}/init" hx-target="body">"#,
                r#"<input type="hidden" name="pipeline_id" value="">"#,
                r#"<button type="submit">Start a new instance</button></form>"#,
            ),
            app = escape(app),
        )
    } else {
        String::new()
    };

    Fragment {
        target: target.to_string(),
        kind: FragmentKind::Failure {
            message: message.to_string(),
        },
        next: None,
        html: format!(
            r#"<div id="{target}"><article class="error"><p>⚠️ {message}</p>{restart}</article></div>"#,
            target = escape(target),
            message = escape(message),
        ),
    }
}

/// Entry page for a workflow: key input plus the chain container.
pub fn render_landing(workflow: &Workflow, suggested_key: &str, existing: &[String]) -> String {
    let app = escape(workflow.app_name());
    let options: String = existing
        .iter()
        .map(|key| format!(r#"<option value="{}">"#, escape(key)))
        .collect();
    format!(
        concat!(
            r#"<section><h2>{title}</h2>"#,
            r##"<form hx-post="/{app}/init" hx-target="#{app}-container">"##,
            r#"<input type="search" name="pipeline_id" value="{key}" list="{app}-keys" placeholder="🗝 Existing or new key">"#,
            r#"<datalist id="{app}-keys">{options}</datalist>"#,
            r#"<button type="submit">Enter 🔑</button></form>"#,
            r#"<div id="{app}-container"></div></section>"#,
        ),
        title = escape(workflow.display_name()),
        app = app,
        key = escape(suggested_key),
        options = options,
    )
}

/// Empty container that loads `step_id` as soon as it is swapped in.
pub fn placeholder(app: &str, step_id: &str) -> String {
    format!(
        r#"<div id="{id}" hx-get="/{app}/{id}" hx-trigger="load" hx-swap="outerHTML"></div>"#,
        id = escape(step_id),
        app = escape(app),
    )
}

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow() -> Workflow {
        Workflow::builder("hello", "Hello")
            .step(StepDefinition::new("step_01", "name", "Your Name"))
            .step(StepDefinition::new("step_02", "greeting", "Greeting"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_completed_step_includes_load_trigger_for_next() {
        let fragment = render_step(&workflow(), 0, StepView::Completed { value: "Ada".into() });

        assert_eq!(fragment.next.as_deref(), Some("step_02"));
        assert!(fragment.html.contains(r#"hx-get="/hello/step_02" hx-trigger="load""#));
        assert!(fragment.html.contains(r#"name="step_id" value="step_01""#));
    }

    #[test]
    fn test_placeholder_is_replaced_not_nested() {
        let html = placeholder("hello", "step_02");
        assert!(html.contains(r#"hx-swap="outerHTML""#));
        assert_eq!(html.matches(r#"id="step_02""#).count(), 1);
    }

    #[test]
    fn test_last_step_chains_to_finalize() {
        let fragment = render_step(&workflow(), 1, StepView::Locked { value: "Hi".into() });
        assert_eq!(fragment.next.as_deref(), Some(FINALIZE_STEP_ID));
    }

    #[test]
    fn test_input_form_never_triggers_next() {
        let fragment = render_step(
            &workflow(),
            0,
            StepView::InputPending {
                display_value: "<b>".into(),
                error: Some("Please enter Your Name".into()),
            },
        );

        assert_eq!(fragment.next, None);
        assert!(!fragment.html.contains("hx-trigger"));
        assert!(fragment.html.contains(r#"value="&lt;b&gt;""#));
        assert!(fragment.html.contains("Please enter Your Name"));
        assert!(fragment.html.contains(r#"hx-post="/hello/step_01/submit""#));
    }

    #[test]
    fn test_failure_offers_new_instance() {
        let fragment = render_failure("hello", "step_01", "broken", true);
        assert!(fragment.html.contains("/hello/init"));
        assert!(!render_failure("hello", "step_01", "broken", false).html.contains("/hello/init"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#x27;");
    }
}
