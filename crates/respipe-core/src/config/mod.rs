//! Pipeline configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! optional TOML files plus `RESPIPE__`-prefixed environment variables.

pub mod cache;
pub mod logging;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::cache::{CacheConfig, MemoryCacheConfig};
pub use self::logging::LoggingConfig;
pub use self::worker::WorkerConfig;

use crate::error::PipelineError;

/// Root pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Background worker pool settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Load configuration for the given environment.
    ///
    /// Merges `config/default`, an environment-specific overlay
    /// `config/{env}` and environment variables such as
    /// `RESPIPE__WORKER__CONCURRENCY=4`. Every source is optional.
    pub fn load(env: &str) -> Result<Self, PipelineError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("RESPIPE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| PipelineError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| PipelineError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml(source: &str) -> Result<Self, PipelineError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
