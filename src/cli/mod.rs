use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;

#[derive(Parser)]
#[command(name = "pipulate")]
#[command(about = "Step-based workflows with resumable JSON state")]
#[command(long_about = "Pipulate runs linear, multi-step workflows in the browser. Each instance \
                       keeps its state as one JSON document, so any step can be reverted and any \
                       instance resumed by its key. Get started with 'pipulate serve'.")]
pub struct Cli {
    /// Configuration file to use instead of pipulate.toml and .pipulate-rc
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web interface
    Serve {
        /// Address to bind
        #[arg(long, help = "Host to bind (defaults to server.host)")]
        host: Option<String>,
        /// Port to listen on
        #[arg(long, short = 'p', help = "Port to listen on (defaults to server.port)")]
        port: Option<u16>,
    },
    /// List registered workflows and their steps
    Workflows,
    /// List saved instances of a workflow
    Instances {
        /// Workflow app name, e.g. hello
        app: String,
    },
    /// Print the stored state of one instance as JSON
    Show {
        /// Full pipeline key, e.g. Default-hello-01
        pipeline_id: String,
    },
    /// Delete one instance
    Delete {
        /// Full pipeline key, e.g. Default-hello-01
        pipeline_id: String,
    },
    /// Print the effective configuration, or save it as TOML
    Config {
        #[arg(long, help = "Write the configuration to this file instead of printing it")]
        save: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_with_port() {
        let cli = Cli::try_parse_from(["pipulate", "serve", "--port", "8080"]).unwrap();
        match cli.command {
            Some(Commands::Serve { host, port }) => {
                assert_eq!(host, None);
                assert_eq!(port, Some(8080));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["pipulate", "instances", "hello", "--config", "alt.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        assert!(matches!(cli.command, Some(Commands::Instances { app }) if app == "hello"));
    }

    #[test]
    fn test_show_requires_key() {
        assert!(Cli::try_parse_from(["pipulate", "show"]).is_err());
    }
}
