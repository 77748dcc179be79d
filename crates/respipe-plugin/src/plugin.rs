//! The contract every pipeline plugin implements.

use async_trait::async_trait;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use respipe_core::error::PipelineError;

use crate::context::PluginContext;
use crate::descriptor::OperationDescriptor;
use crate::operation::OperationError;
use crate::result::PluginResult;

/// Priority used when a plugin does not choose one.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Where a plugin's hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// In-line on the request task; may modify or abort the operation.
    #[default]
    Sync,
    /// Fire-and-forget on the background pool. Never takes part in BEFORE.
    Async,
}

/// Cross-cutting capability a plugin provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Establishes who is calling.
    Authentication,
    /// Decides whether the caller may run the operation.
    Authorization,
    /// Serves or stores responses.
    Cache,
    /// Validates or transforms resources according to business rules.
    BusinessRule,
    /// Measures operation timing.
    Performance,
    /// Anything else.
    #[default]
    Custom,
}

impl Capability {
    /// Conventional priority of this capability. Nothing enforces these bands.
    pub fn conventional_priority(&self) -> i32 {
        match self {
            Self::Performance => 5,
            Self::Authentication => 10,
            Self::Authorization => 20,
            Self::Cache => 30,
            Self::BusinessRule => 50,
            Self::Custom => DEFAULT_PRIORITY,
        }
    }
}

/// Lifecycle of a registered plugin as tracked by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Not yet initialized.
    Uninitialized,
    /// Initialized and registered.
    Initialized,
    /// Destroyed after unregistration or shutdown.
    Destroyed,
}

/// Failure raised by a plugin hook or a capability strategy.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// The hook failed.
    #[error("{0}")]
    Failed(String),
    /// A strategy refused the request with a specific status.
    #[error("{message}")]
    Rejected {
        /// HTTP status to report.
        status: StatusCode,
        /// Reason for the refusal.
        message: String,
    },
    /// The hook panicked.
    #[error("panicked: {0}")]
    Panicked(String),
    /// A pipeline error propagated out of the hook.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl PluginError {
    /// Creates a failure with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Creates a refusal with a status.
    pub fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for PluginError {
    fn from(err: serde_json::Error) -> Self {
        Self::Pipeline(err.into())
    }
}

/// Metadata snapshot of a registered plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin name.
    pub name: String,
    /// Execution priority (lower = runs first).
    pub priority: i32,
    /// Execution mode.
    pub mode: ExecutionMode,
    /// Capability kind.
    pub capability: Capability,
    /// Whether the plugin is currently enabled.
    pub enabled: bool,
    /// Operations the plugin applies to.
    pub operations: Vec<OperationDescriptor>,
}

/// A registrable unit of cross-cutting behavior wrapped around operations.
///
/// Every hook has a `Continue` default so plugins only implement the
/// phases they care about. Hook errors are never propagated as-is: the
/// orchestrator turns BEFORE failures into a `500` abort and only logs
/// AFTER and ON_ERROR failures.
#[async_trait]
pub trait Plugin: Send + Sync + std::fmt::Debug {
    /// Plugin name. Expected to be unique, not enforced.
    fn name(&self) -> &str;

    /// Whether the plugin currently participates in matching.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Execution priority (lower = runs first).
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Where the plugin's hooks run.
    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Sync
    }

    /// Capability kind, used to select business-rule plugins.
    fn capability(&self) -> Capability {
        Capability::Custom
    }

    /// Operations the plugin applies to.
    fn supported_operations(&self) -> Vec<OperationDescriptor> {
        vec![OperationDescriptor::All]
    }

    /// Whether the plugin applies to the request in `ctx`.
    fn supports(&self, ctx: &PluginContext) -> bool {
        self.supported_operations()
            .iter()
            .any(|d| d.matches(ctx.resource_type(), ctx.operation()))
    }

    /// Called once when the plugin is registered.
    async fn initialize(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called once when the plugin is unregistered or the orchestrator
    /// shuts down.
    async fn destroy(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// BEFORE phase hook.
    async fn before(&self, _ctx: &PluginContext) -> Result<PluginResult, PluginError> {
        Ok(PluginResult::Continue)
    }

    /// AFTER phase hook.
    async fn after(&self, _ctx: &PluginContext) -> Result<PluginResult, PluginError> {
        Ok(PluginResult::Continue)
    }

    /// ON_ERROR phase hook. The returned result is ignored by the orchestrator.
    async fn on_error(
        &self,
        _ctx: &PluginContext,
        _error: &OperationError,
    ) -> Result<PluginResult, PluginError> {
        Ok(PluginResult::Continue)
    }

    /// Metadata snapshot.
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: self.name().to_string(),
            priority: self.priority(),
            mode: self.execution_mode(),
            capability: self.capability(),
            enabled: self.is_enabled(),
            operations: self.supported_operations(),
        }
    }
}
