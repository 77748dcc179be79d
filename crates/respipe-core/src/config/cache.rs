//! Response cache configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the in-process response cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// In-memory cache settings.
    #[serde(default)]
    pub memory: MemoryCacheConfig,
}

/// In-memory cache backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    /// Maximum number of cached resources.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    /// Lifetime of a cached resource in seconds.
    #[serde(default = "default_memory_ttl")]
    pub time_to_live_seconds: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
            time_to_live_seconds: default_memory_ttl(),
        }
    }
}

fn default_max_capacity() -> u64 {
    10000
}

fn default_memory_ttl() -> u64 {
    300
}
