//! Configuration management for the roast importer
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with ROASTLOG__ prefix

use config::{ConfigError, Environment, File};
use roastlog::EngineConfig;
use serde::Deserialize;
use validator::Validate;

/// Main importer configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Record store configuration
    pub store: StoreConfig,

    /// Import behaviour
    pub import: ImportConfig,

    /// Derivation settings handed to the engine
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct StoreConfig {
    /// Directory holding the JSON record store
    #[validate(length(min = 1))]
    pub dir: String,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ImportConfig {
    /// Files ingested at the same time
    #[validate(range(min = 1, max = 64))]
    pub concurrency: u32,

    /// Keep the stored record when a roast id is seen again
    pub skip_existing: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("ROASTLOG__ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("store.dir", "roast-store")?
            .set_default("import.concurrency", 4)?
            .set_default("import.skip_existing", true)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (ROASTLOG__ prefix)
            .add_source(
                Environment::with_prefix("ROASTLOG")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Check every section, engine settings included
    pub fn validate(&self) -> anyhow::Result<()> {
        self.store.validate()?;
        self.import.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: "roast-store".to_string(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            skip_existing: true,
        }
    }
}
