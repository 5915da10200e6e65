use anyhow::Result;
use clap::Parser;

use pipulate::cli::commands::{
    show_how_to_start, ConfigCommand, DeleteCommand, InstancesCommand, ServeCommand, ShowCommand, WorkflowsCommand,
};
use pipulate::cli::{Cli, Commands};
use pipulate::config::PipulateConfig;
use pipulate::telemetry::{init_telemetry, shutdown_telemetry};

fn main() -> Result<()> {
    let cli = Cli::parse();

    PipulateConfig::load_env_file()?;
    let config = match &cli.config {
        Some(path) => PipulateConfig::load_from_file(path)?,
        None => PipulateConfig::load()?,
    };
    init_telemetry(&config.observability)?;

    let result = match cli.command {
        None => {
            show_how_to_start();
            Ok(())
        }
        Some(Commands::Serve { host, port }) => tokio::runtime::Runtime::new()?.block_on(async {
            ServeCommand::new()
                .with_host(host)
                .with_port(port)
                .execute(&config)
                .await
        }),
        Some(Commands::Workflows) => {
            tokio::runtime::Runtime::new()?.block_on(async { WorkflowsCommand.execute(&config).await })
        }
        Some(Commands::Instances { app }) => tokio::runtime::Runtime::new()?
            .block_on(async { InstancesCommand::new(app).execute(&config).await }),
        Some(Commands::Show { pipeline_id }) => tokio::runtime::Runtime::new()?
            .block_on(async { ShowCommand::new(pipeline_id).execute(&config).await }),
        Some(Commands::Delete { pipeline_id }) => tokio::runtime::Runtime::new()?
            .block_on(async { DeleteCommand::new(pipeline_id).execute(&config).await }),
        Some(Commands::Config { save }) => tokio::runtime::Runtime::new()?
            .block_on(async { ConfigCommand::new().with_save(save).execute(&config).await }),
    };

    shutdown_telemetry();
    result
}
