//! Ready-made plugins for common cross-cutting capabilities.
//!
//! Each adapter is a concrete [`Plugin`](crate::plugin::Plugin) that
//! delegates the capability-specific decision to a strategy trait object
//! supplied by the application. Default priorities follow
//! [`Capability::conventional_priority`]; they are a convention only and
//! every adapter can be reconfigured with `with_priority`, `with_mode` and
//! `with_operations`.

use crate::descriptor::OperationDescriptor;
use crate::plugin::{Capability, ExecutionMode};

/// Generates the builder methods shared by every adapter.
macro_rules! adapter_builders {
    () => {
        /// Overrides the plugin name.
        pub fn with_name(mut self, name: impl Into<String>) -> Self {
            self.settings.name = name.into();
            self
        }

        /// Overrides the conventional priority.
        pub fn with_priority(mut self, priority: i32) -> Self {
            self.settings.priority = priority;
            self
        }

        /// Overrides the execution mode.
        pub fn with_mode(mut self, mode: $crate::plugin::ExecutionMode) -> Self {
            self.settings.mode = mode;
            self
        }

        /// Restricts the operations the adapter applies to.
        pub fn with_operations(
            mut self,
            operations: Vec<$crate::descriptor::OperationDescriptor>,
        ) -> Self {
            self.settings.operations = operations;
            self
        }

        /// Enables or disables the adapter.
        pub fn with_enabled(mut self, enabled: bool) -> Self {
            self.settings.enabled = enabled;
            self
        }
    };
}

/// Generates the metadata part of a `Plugin` impl from `self.settings`.
macro_rules! adapter_metadata {
    () => {
        fn name(&self) -> &str {
            &self.settings.name
        }

        fn is_enabled(&self) -> bool {
            self.settings.enabled
        }

        fn priority(&self) -> i32 {
            self.settings.priority
        }

        fn execution_mode(&self) -> $crate::plugin::ExecutionMode {
            self.settings.mode
        }

        fn capability(&self) -> $crate::plugin::Capability {
            self.settings.capability
        }

        fn supported_operations(&self) -> Vec<$crate::descriptor::OperationDescriptor> {
            self.settings.operations.clone()
        }
    };
}

pub mod auth;
pub mod authz;
pub mod business;
pub mod cache;
pub mod performance;

pub use auth::{AuthenticationPlugin, Authenticator, Principal};
pub use authz::{AccessDecision, AuthorizationPlugin, Authorizer};
pub use business::{BusinessRule, BusinessRulePlugin};
pub use cache::{CachePlugin, CacheStrategy, MemoryCache};
pub use performance::{Measurement, PerformancePlugin, PerformanceRecorder, TracingRecorder};

/// Metadata shared by every adapter.
#[derive(Debug, Clone)]
pub(crate) struct AdapterSettings {
    pub(crate) name: String,
    pub(crate) priority: i32,
    pub(crate) mode: ExecutionMode,
    pub(crate) capability: Capability,
    pub(crate) operations: Vec<OperationDescriptor>,
    pub(crate) enabled: bool,
}

impl AdapterSettings {
    /// Settings for `capability` with its conventional priority, sync mode
    /// and all operations.
    pub(crate) fn new(name: &str, capability: Capability) -> Self {
        Self {
            name: name.to_string(),
            priority: capability.conventional_priority(),
            mode: ExecutionMode::Sync,
            capability,
            operations: vec![OperationDescriptor::All],
            enabled: true,
        }
    }
}
