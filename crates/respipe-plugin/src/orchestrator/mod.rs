//! Plugin orchestrator: registration, matching and lifecycle of the
//! plugins wrapped around every resource operation.
//!
//! Phase execution lives in [`phases`], the core-operation wrappers in
//! [`crud`] and the business-rule sub-pipeline in [`business`].

pub mod business;
pub mod crud;
pub mod phases;

use std::sync::Arc;

use tracing::{error, info, warn};

use respipe_core::config::PipelineConfig;
use respipe_core::error::PipelineError;
use respipe_core::result::PipelineResult;

use crate::context::PluginContext;
use crate::plugin::{LifecycleState, Plugin, PluginInfo};
use crate::registry::{PluginEntry, PluginRegistry};
use crate::worker::BackgroundPool;

pub use phases::Phase;

/// Owns the registered plugins and the background pool, and runs the
/// BEFORE / AFTER / ON_ERROR phases around core operations.
///
/// One instance is shared by all concurrent requests.
#[derive(Debug)]
pub struct PluginOrchestrator {
    /// Registered plugins.
    registry: PluginRegistry,
    /// Pool running async-mode hooks.
    pool: Arc<BackgroundPool>,
}

impl PluginOrchestrator {
    /// Creates an orchestrator with a pool sized to the available processors.
    pub fn new() -> Self {
        Self::with_pool(Arc::new(BackgroundPool::default()))
    }

    /// Creates an orchestrator from configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::with_pool(Arc::new(BackgroundPool::from_config(&config.worker)))
    }

    /// Creates an orchestrator using an existing pool.
    pub fn with_pool(pool: Arc<BackgroundPool>) -> Self {
        Self {
            registry: PluginRegistry::new(),
            pool,
        }
    }

    /// The background pool.
    pub fn pool(&self) -> &Arc<BackgroundPool> {
        &self.pool
    }

    /// Initializes and registers a plugin.
    ///
    /// The plugin is not registered when `initialize` fails.
    pub async fn register_plugin(&self, plugin: Arc<dyn Plugin>) -> PipelineResult<()> {
        let name = plugin.name().to_string();
        let entry = PluginEntry::new(plugin.clone());

        plugin.initialize().await.map_err(|e| {
            error!(plugin = %name, error = %e, "Plugin initialization failed");
            PipelineError::plugin(format!("Plugin '{}' initialization failed: {}", name, e))
        })?;

        entry.set_state(LifecycleState::Initialized);
        self.registry.insert(entry);

        info!(
            plugin = %name,
            priority = plugin.priority(),
            mode = ?plugin.execution_mode(),
            capability = ?plugin.capability(),
            "Plugin initialized and registered"
        );

        Ok(())
    }

    /// Unregisters `plugin` (by identity) and destroys it.
    ///
    /// Returns `false` when the plugin was not registered.
    pub async fn unregister_plugin(&self, plugin: &Arc<dyn Plugin>) -> bool {
        match self.registry.remove_first(|e| e.is(plugin)) {
            Some(entry) => {
                Self::destroy_entry(&entry).await;
                true
            }
            None => false,
        }
    }

    /// Unregisters and destroys the first plugin registered under `name`.
    pub async fn unregister_by_name(&self, name: &str) -> bool {
        match self.registry.remove_first(|e| e.plugin().name() == name) {
            Some(entry) => {
                Self::destroy_entry(&entry).await;
                true
            }
            None => false,
        }
    }

    /// All registered plugins in registration order.
    pub fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        self.registry
            .snapshot()
            .iter()
            .map(|e| e.plugin().clone())
            .collect()
    }

    /// Metadata of all registered plugins in registration order.
    pub fn plugin_infos(&self) -> Vec<PluginInfo> {
        self.registry
            .snapshot()
            .iter()
            .map(|e| e.plugin().info())
            .collect()
    }

    /// Enabled plugins applying to `ctx`, sorted by ascending priority.
    ///
    /// The sort is stable: plugins with equal priority keep their
    /// registration order.
    pub fn matching_plugins(&self, ctx: &PluginContext) -> Vec<Arc<dyn Plugin>> {
        let snapshot = self.registry.snapshot();
        let mut matching: Vec<Arc<dyn Plugin>> = snapshot
            .iter()
            .filter(|e| e.state() == LifecycleState::Initialized)
            .map(PluginEntry::plugin)
            .filter(|p| p.is_enabled() && p.supports(ctx))
            .cloned()
            .collect();

        matching.sort_by_key(|p| p.priority());
        matching
    }

    /// Destroys every registered plugin and drains the background pool.
    pub async fn shutdown(&self) {
        let entries = self.registry.drain();
        info!(plugins = entries.len(), "Shutting down plugin orchestrator");

        for entry in &entries {
            Self::destroy_entry(entry).await;
        }

        self.pool.shutdown().await;
        info!("Plugin orchestrator shut down");
    }

    async fn destroy_entry(entry: &PluginEntry) {
        let plugin = entry.plugin();
        entry.set_state(LifecycleState::Destroyed);

        if let Err(e) = plugin.destroy().await {
            warn!(
                plugin = %plugin.name(),
                error = %e,
                "Plugin destroy returned error"
            );
        }

        info!(plugin = %plugin.name(), "Plugin destroyed");
    }
}

impl Default for PluginOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}
