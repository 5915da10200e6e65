use anyhow::Result;

use crate::app::build_engine;
use crate::config::PipulateConfig;
use crate::workflows::WorkflowError;

pub struct InstancesCommand {
    pub app: String,
}

impl InstancesCommand {
    pub fn new(app: impl Into<String>) -> Self {
        Self { app: app.into() }
    }

    pub async fn execute(&self, config: &PipulateConfig) -> Result<()> {
        let engine = build_engine(config).await?;
        let workflow = engine.workflow(&self.app)?;
        let keys = engine.list_instances(&self.app).await?;

        if keys.is_empty() {
            println!("📋 No instances of '{}' yet", self.app);
            println!("   💡 Start one at /{}", self.app);
            return Ok(());
        }

        println!("📋 {} instance(s) of {}:", keys.len(), workflow.display_name());
        for key in keys {
            match engine.read_state(&key).await {
                Ok(doc) => {
                    let total = workflow.steps().len();
                    let done = total - doc.missing_steps(&workflow).len();
                    let status = if doc.is_finalized() { "🔒 finalized" } else { "✏️  open" };
                    println!(
                        "   {key}  {status}  {done}/{total} steps  updated {}",
                        doc.updated().format("%Y-%m-%d %H:%M")
                    );
                }
                Err(WorkflowError::StateCorruption { reason, .. }) => {
                    println!("   {key}  ⚠️  unreadable: {reason}");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
