//! Tracing subscriber setup.

use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;
use crate::error::PipelineError;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a global
/// subscriber has already been installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), PipelineError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let installed = match config.format.as_str() {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(config.thread_ids)
            .try_init(),
        _ => fmt()
            .pretty()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(config.thread_ids)
            .try_init(),
    };

    installed.map_err(|e| PipelineError::configuration(format!("Logging init failed: {e}")))?;

    tracing::info!(level = %config.level, format = %config.format, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_error() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            ..LoggingConfig::default()
        };
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
