use anyhow::Result;

use crate::app::build_engine;
use crate::config::PipulateConfig;

pub struct DeleteCommand {
    pub pipeline_id: String,
}

impl DeleteCommand {
    pub fn new(pipeline_id: impl Into<String>) -> Self {
        Self { pipeline_id: pipeline_id.into() }
    }

    pub async fn execute(&self, config: &PipulateConfig) -> Result<()> {
        let engine = build_engine(config).await?;
        if engine.delete(&self.pipeline_id).await? {
            println!("🗑️  Deleted {}", self.pipeline_id);
        } else {
            println!("❓ No instance named {}", self.pipeline_id);
        }
        Ok(())
    }
}
