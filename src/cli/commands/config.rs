use std::path::PathBuf;

use anyhow::Result;

use crate::config::PipulateConfig;

pub struct ConfigCommand {
    pub save: Option<PathBuf>,
}

impl ConfigCommand {
    pub fn new() -> Self {
        Self { save: None }
    }

    pub fn with_save(mut self, save: Option<PathBuf>) -> Self {
        self.save = save;
        self
    }

    pub async fn execute(&self, config: &PipulateConfig) -> Result<()> {
        match &self.save {
            Some(path) => {
                config.save_to_file(path)?;
                println!("✅ Configuration written to {}", path.display());
            }
            None => print!("{}", toml::to_string_pretty(config)?),
        }
        Ok(())
    }
}

impl Default for ConfigCommand {
    fn default() -> Self {
        Self::new()
    }
}
