use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "pipulate.toml";
pub const RC_FILE: &str = ".pipulate-rc";
pub const ENV_PREFIX: &str = "PIPULATE";

/// Main configuration structure for Pipulate
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PipulateConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    /// External calls made by workflow steps
    pub upstream: UpstreamConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5001,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory of the file backend
    pub directory: PathBuf,
    /// Connection string of the sqlite backend
    pub database_url: String,
    pub max_connections: u32,
    pub auto_migrate: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            directory: PathBuf::from(".pipulate/data"),
            database_url: "sqlite://.pipulate/pipulate.db".to_string(),
            max_connections: 5,
            auto_migrate: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Profile used in generated keys until one is chosen
    pub default_profile: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_profile: "Default".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Per-attempt timeout
    pub timeout_secs: u64,
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
    /// Zero disables client-side rate limiting
    pub requests_per_second: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter: true,
            requests_per_second: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Default filter directive when RUST_LOG is unset
    pub log_level: String,
    /// JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: true,
        }
    }
}

impl PipulateConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (pipulate.toml, .pipulate-rc) in the working directory
    /// 3. Environment variables (PIPULATE_SERVER__PORT=8080)
    pub fn load() -> Result<Self> {
        Self::load_from_dir(Path::new("."))
    }

    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        for name in [CONFIG_FILE, RC_FILE] {
            let path = dir.join(name);
            if path.exists() {
                builder = builder.add_source(File::from(path).format(FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to assemble configuration")?;
        config
            .try_deserialize()
            .context("Invalid configuration values")
    }

    /// Load a single TOML file over the defaults, ignoring the environment.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::from(path).format(FileFormat::Toml))
            .build()
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}
