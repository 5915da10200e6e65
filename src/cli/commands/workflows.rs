use anyhow::Result;

use crate::app::build_engine;
use crate::config::PipulateConfig;

pub struct WorkflowsCommand;

impl WorkflowsCommand {
    pub async fn execute(&self, config: &PipulateConfig) -> Result<()> {
        let engine = build_engine(config).await?;
        for workflow in engine.workflows() {
            println!("📋 {} ({})", workflow.display_name(), workflow.app_name());
            for (position, step) in workflow.steps().iter().enumerate() {
                let refill = if step.is_refill() { "  ↺ refill" } else { "" };
                println!("   {}. {} [{}]{}", position + 1, step.show(), step.id(), refill);
            }
        }
        Ok(())
    }
}
