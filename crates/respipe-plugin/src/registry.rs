//! Copy-on-write set of registered plugins.
//!
//! Phase execution reads the set on every request while registration is
//! rare, so readers take an `Arc` snapshot of the current vector and writers
//! publish a fresh vector. A snapshot is never mutated after publication.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{info, warn};

use crate::plugin::{LifecycleState, Plugin};

/// A registered plugin together with its lifecycle state.
#[derive(Debug, Clone)]
pub struct PluginEntry {
    plugin: Arc<dyn Plugin>,
    state: Arc<AtomicU8>,
}

impl PluginEntry {
    /// Wraps a plugin in the `Uninitialized` state.
    pub fn new(plugin: Arc<dyn Plugin>) -> Self {
        Self {
            plugin,
            state: Arc::new(AtomicU8::new(encode(LifecycleState::Uninitialized))),
        }
    }

    /// The plugin.
    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        decode(self.state.load(Ordering::Acquire))
    }

    /// Moves the entry to a new lifecycle state.
    pub fn set_state(&self, state: LifecycleState) {
        self.state.store(encode(state), Ordering::Release);
    }

    /// Whether this entry wraps exactly `plugin` (pointer identity).
    pub fn is(&self, plugin: &Arc<dyn Plugin>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.plugin), Arc::as_ptr(plugin))
    }
}

fn encode(state: LifecycleState) -> u8 {
    match state {
        LifecycleState::Uninitialized => 0,
        LifecycleState::Initialized => 1,
        LifecycleState::Destroyed => 2,
    }
}

fn decode(raw: u8) -> LifecycleState {
    match raw {
        0 => LifecycleState::Uninitialized,
        1 => LifecycleState::Initialized,
        _ => LifecycleState::Destroyed,
    }
}

/// Registry of all registered plugins, in registration order.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    entries: RwLock<Arc<Vec<PluginEntry>>>,
}

impl PluginRegistry {
    /// Creates a new empty plugin registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot of the registered plugins.
    pub fn snapshot(&self) -> Arc<Vec<PluginEntry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Appends an entry. Names are expected to be unique; a duplicate is
    /// only reported.
    pub fn insert(&self, entry: PluginEntry) {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let name = entry.plugin().name().to_string();

        if guard.iter().any(|e| e.plugin().name() == name) {
            warn!(plugin = %name, "Registering plugin with a duplicate name");
        }

        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(entry);
        *guard = Arc::new(next);

        info!(plugin = %name, registered = guard.len(), "Plugin registered");
    }

    /// Removes the first entry matching `predicate`.
    pub fn remove_first<F>(&self, predicate: F) -> Option<PluginEntry>
    where
        F: Fn(&PluginEntry) -> bool,
    {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let index = guard.iter().position(predicate)?;

        let mut next: Vec<PluginEntry> = (**guard).clone();
        let removed = next.remove(index);
        *guard = Arc::new(next);

        info!(plugin = %removed.plugin().name(), registered = guard.len(), "Plugin unregistered");
        Some(removed)
    }

    /// Removes every entry, returning them in registration order.
    pub fn drain(&self) -> Vec<PluginEntry> {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let drained = (**guard).clone();
        *guard = Arc::new(Vec::new());
        drained
    }

    /// Returns plugin count.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether no plugin is registered.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Named(&'static str);

    #[async_trait::async_trait]
    impl Plugin for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    fn entry(name: &'static str) -> PluginEntry {
        PluginEntry::new(Arc::new(Named(name)))
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_writes() {
        let registry = PluginRegistry::new();
        registry.insert(entry("a"));
        let before = registry.snapshot();
        registry.insert(entry("b"));
        assert_eq!(before.len(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_by_identity() {
        let registry = PluginRegistry::new();
        let plugin: Arc<dyn Plugin> = Arc::new(Named("a"));
        let twin: Arc<dyn Plugin> = Arc::new(Named("a"));
        registry.insert(PluginEntry::new(plugin.clone()));

        assert!(registry.remove_first(|e| e.is(&twin)).is_none());
        assert!(registry.remove_first(|e| e.is(&plugin)).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let e = entry("a");
        assert_eq!(e.state(), LifecycleState::Uninitialized);
        e.set_state(LifecycleState::Initialized);
        let shared = e.clone();
        shared.set_state(LifecycleState::Destroyed);
        assert_eq!(e.state(), LifecycleState::Destroyed);
    }

    #[test]
    fn test_drain_preserves_order() {
        let registry = PluginRegistry::new();
        registry.insert(entry("a"));
        registry.insert(entry("b"));
        let names: Vec<_> = registry
            .drain()
            .iter()
            .map(|e| e.plugin().name().to_string())
            .collect();
        assert_eq!(names, ["a", "b"]);
        assert!(registry.is_empty());
    }
}
