// Two-step greeting workflow: a name, then a message derived from it

use crate::workflows::step::{DefinitionError, StepDefinition, Workflow};

pub const APP_NAME: &str = "hello";
pub const DISPLAY_NAME: &str = "Hello Workflow";

fn greeting(name: &str) -> String {
    format!("Hello {name}")
}

pub fn workflow() -> Result<Workflow, DefinitionError> {
    Workflow::builder(APP_NAME, DISPLAY_NAME)
        .step(StepDefinition::new("step_01", "name", "Your Name").refill(true))
        .step(StepDefinition::new("step_02", "greeting", "Hello Message").transform(greeting))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_definition() {
        let wf = workflow().unwrap();
        assert_eq!(wf.app_name(), "hello");
        assert_eq!(wf.steps().len(), 2);
        assert!(wf.steps()[0].is_refill());

        let transform = wf.steps()[1].transform_fn().unwrap();
        assert_eq!(transform("Ada"), "Hello Ada");
    }
}
