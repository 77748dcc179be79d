//! Prelude for convenient imports.

pub use async_trait::async_trait;
pub use http::StatusCode;

pub use respipe_core::tenant::{TenantBaton, TenantId};

pub use crate::business::{BusinessContext, BusinessPhase, BusinessResult};
pub use crate::capabilities::{
    AccessDecision, AuthenticationPlugin, Authenticator, AuthorizationPlugin, Authorizer,
    BusinessRule, BusinessRulePlugin, CachePlugin, CacheStrategy, MemoryCache, PerformancePlugin,
    PerformanceRecorder, Principal,
};
pub use crate::context::{PluginContext, Resource};
pub use crate::descriptor::{OperationDescriptor, OperationKind};
pub use crate::operation::{OperationError, OperationResult};
pub use crate::orchestrator::PluginOrchestrator;
pub use crate::plugin::{Capability, ExecutionMode, Plugin, PluginError, PluginInfo};
pub use crate::result::PluginResult;

pub use crate::operations;
