//! Environment-aware configuration loading.
//!
//! Sources, later ones winning: `config/agrilink.toml`, then
//! `config/agrilink.<environment>.toml`, then `AGRILINK_*` environment
//! variables with `__` as the section separator
//! (e.g. `AGRILINK_SESSION__ACQUIRE_TIMEOUT_MS=250`).

use config::{Config, Environment, File};
use tracing::debug;

use super::{ConfigurationError, EngineConfig};

const ENV_PREFIX: &str = "AGRILINK";

/// Loads and holds the resolved engine configuration
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: EngineConfig,
    environment: String,
}

impl ConfigManager {
    /// Load configuration for the auto-detected environment
    pub fn load() -> Result<Self, ConfigurationError> {
        let environment = detect_environment();
        Self::load_for_environment(&environment)
    }

    /// Load configuration for an explicit environment name
    pub fn load_for_environment(environment: &str) -> Result<Self, ConfigurationError> {
        let config = Config::builder()
            .add_source(File::with_name("config/agrilink").required(false))
            .add_source(File::with_name(&format!("config/agrilink.{environment}")).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize::<EngineConfig>()?;

        debug!(environment = %environment, "engine configuration loaded");
        Ok(Self {
            config,
            environment: environment.to_string(),
        })
    }

    /// Load configuration from a single explicit file, no environment layering
    pub fn load_from_file(path: &str) -> Result<Self, ConfigurationError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .build()?
            .try_deserialize::<EngineConfig>()?;

        Ok(Self {
            config,
            environment: "explicit".to_string(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }
}

/// Environment detection mirroring the platform's conventions
pub fn detect_environment() -> String {
    std::env::var("AGRILINK_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}
