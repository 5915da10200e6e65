use std::sync::Arc;

use anyhow::Result;

use crate::app::build_engine;
use crate::config::PipulateConfig;
use crate::server::run_http_server;

pub struct ServeCommand {
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl ServeCommand {
    pub fn new() -> Self {
        Self { host: None, port: None }
    }

    pub fn with_host(mut self, host: Option<String>) -> Self {
        self.host = host;
        self
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    pub async fn execute(&self, config: &PipulateConfig) -> Result<()> {
        let host = self.host.clone().unwrap_or_else(|| config.server.host.clone());
        let port = self.port.unwrap_or(config.server.port);

        let engine = Arc::new(build_engine(config).await?);
        println!("🚀 Pipulate serving on http://{host}:{port}");
        for workflow in engine.workflows() {
            println!("   📋 http://{host}:{port}/{}  ({})", workflow.app_name(), workflow.display_name());
        }
        run_http_server(engine, &host, port).await
    }
}

impl Default for ServeCommand {
    fn default() -> Self {
        Self::new()
    }
}
