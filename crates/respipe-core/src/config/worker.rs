//! Background worker pool configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the pool that runs background-mode plugin hooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of hooks allowed to run concurrently. Defaults to the number
    /// of available processors when unset.
    #[serde(default)]
    pub concurrency: Option<usize>,
    /// Upper bound in seconds on how long shutdown waits for in-flight hooks.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

impl WorkerConfig {
    /// Resolves the configured concurrency, never returning zero.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency
            .filter(|n| *n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: None,
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

fn default_shutdown_timeout() -> u64 {
    30
}
