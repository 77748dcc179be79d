//! Response cache adapter.
//!
//! Reads and searches are looked up in BEFORE; a hit short-circuits the
//! operation with the cached resource. Successful reads and searches store
//! their output in AFTER, and writes invalidate the entry for the resource.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::{debug, warn};

use respipe_core::config::MemoryCacheConfig;

use crate::context::{PluginContext, Resource};
use crate::descriptor::OperationKind;
use crate::plugin::{Capability, Plugin, PluginError};
use crate::result::PluginResult;

use super::AdapterSettings;

/// Attribute set to `true` on the context when a lookup hits.
pub const CACHE_HIT_ATTRIBUTE: &str = "cache.hit";

/// Attribute carrying the logical id of the resource being operated on.
pub const RESOURCE_ID_ATTRIBUTE: &str = "resource_id";

/// Attribute that, when set, replaces the derived cache key.
pub const CACHE_KEY_ATTRIBUTE: &str = "cache.key";

/// Backing store for [`CachePlugin`].
#[async_trait]
pub trait CacheStrategy: Send + Sync + std::fmt::Debug {
    /// Looks up a cached resource.
    async fn lookup(&self, key: &str) -> Result<Option<Resource>, PluginError>;

    /// Stores a resource.
    async fn store(&self, key: &str, resource: &Resource) -> Result<(), PluginError>;

    /// Removes every entry whose key starts with `prefix`.
    async fn invalidate(&self, prefix: &str) -> Result<(), PluginError>;
}

/// Derives the cache key for a request.
///
/// Keys have the form `{tenant}/{resource_type}/{id-or-search}`, so all
/// entries of a resource type share the prefix `{tenant}/{resource_type}/`.
/// Returns `None` when the request carries no id and no explicit key.
pub fn cache_key(ctx: &PluginContext) -> Option<String> {
    if let Some(key) = ctx.attribute::<String>(CACHE_KEY_ATTRIBUTE) {
        return Some(key);
    }

    let id = ctx.attribute::<String>(RESOURCE_ID_ATTRIBUTE).or_else(|| {
        ctx.input_resource()
            .and_then(|r| r.get("id").and_then(|v| v.as_str()).map(str::to_string))
    })?;

    Some(format!("{}{}", type_prefix(ctx), id))
}

fn type_prefix(ctx: &PluginContext) -> String {
    let tenant = ctx.tenant_id().map(|t| t.as_str()).unwrap_or("-");
    format!("{}/{}/", tenant, ctx.resource_type())
}

/// In-process [`CacheStrategy`] backed by moka, bounded in size and with a
/// per-entry lifetime.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    entries: Cache<String, Resource>,
}

impl MemoryCache {
    /// Creates a cache with the default capacity and lifetime.
    pub fn new() -> Self {
        Self::from_config(&MemoryCacheConfig::default())
    }

    /// Creates a cache from configuration.
    pub fn from_config(config: &MemoryCacheConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.time_to_live_seconds))
            .build();

        Self { entries }
    }

    /// Number of cached entries, after applying pending evictions.
    pub async fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStrategy for MemoryCache {
    async fn lookup(&self, key: &str) -> Result<Option<Resource>, PluginError> {
        Ok(self.entries.get(key).await)
    }

    async fn store(&self, key: &str, resource: &Resource) -> Result<(), PluginError> {
        self.entries.insert(key.to_string(), resource.clone()).await;
        Ok(())
    }

    async fn invalidate(&self, prefix: &str) -> Result<(), PluginError> {
        // moka has no prefix scan; collect first, then remove.
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.to_string())
            .collect();

        for key in &keys {
            self.entries.remove(key).await;
        }

        debug!(prefix, count = keys.len(), "Invalidated cached entries");
        Ok(())
    }
}

/// Serves reads from a [`CacheStrategy`] and keeps it coherent with writes.
#[derive(Debug)]
pub struct CachePlugin {
    settings: AdapterSettings,
    strategy: Arc<dyn CacheStrategy>,
}

impl CachePlugin {
    /// Creates the adapter with priority 30.
    pub fn new(strategy: Arc<dyn CacheStrategy>) -> Self {
        Self {
            settings: AdapterSettings::new("cache", Capability::Cache),
            strategy,
        }
    }

    adapter_builders!();
}

fn is_cacheable(operation: &OperationKind) -> bool {
    matches!(
        operation,
        OperationKind::Read | OperationKind::Vread | OperationKind::Search
    )
}

#[async_trait]
impl Plugin for CachePlugin {
    adapter_metadata!();

    async fn before(&self, ctx: &PluginContext) -> Result<PluginResult, PluginError> {
        if !is_cacheable(ctx.operation()) {
            return Ok(PluginResult::Continue);
        }
        let Some(key) = cache_key(ctx) else {
            return Ok(PluginResult::Continue);
        };

        match self.strategy.lookup(&key).await? {
            Some(resource) => {
                debug!(plugin = %self.settings.name, key = %key, "Cache hit");
                ctx.set_attribute(CACHE_HIT_ATTRIBUTE, true);
                Ok(PluginResult::skip_with(resource))
            }
            None => {
                debug!(plugin = %self.settings.name, key = %key, "Cache miss");
                Ok(PluginResult::Continue)
            }
        }
    }

    async fn after(&self, ctx: &PluginContext) -> Result<PluginResult, PluginError> {
        let operation = ctx.operation();

        if is_cacheable(operation) {
            if let (Some(key), Some(resource)) = (cache_key(ctx), ctx.output_resource()) {
                self.strategy.store(&key, &resource).await?;
            }
        } else if operation.is_write() {
            // A write to one resource may change any search result of its type.
            let prefix = type_prefix(ctx);
            if let Err(e) = self.strategy.invalidate(&prefix).await {
                warn!(
                    plugin = %self.settings.name,
                    prefix = %prefix,
                    error = %e,
                    "Cache invalidation failed"
                );
                return Err(e);
            }
        }

        Ok(PluginResult::Continue)
    }
}
