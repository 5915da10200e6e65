use anyhow::Result;

use crate::app::build_engine;
use crate::config::PipulateConfig;

pub struct ShowCommand {
    pub pipeline_id: String,
}

impl ShowCommand {
    pub fn new(pipeline_id: impl Into<String>) -> Self {
        Self { pipeline_id: pipeline_id.into() }
    }

    pub async fn execute(&self, config: &PipulateConfig) -> Result<()> {
        let engine = build_engine(config).await?;
        let doc = engine.read_state(&self.pipeline_id).await?;
        println!("{}", serde_json::to_string_pretty(&doc.to_value())?);
        Ok(())
    }
}
