//! Authorization adapter.

use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use tracing::info;

use crate::context::PluginContext;
use crate::plugin::{Capability, Plugin, PluginError};
use crate::result::PluginResult;

use super::AdapterSettings;

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Access is granted.
    Allow,
    /// Access is refused for the given reason.
    Deny(String),
}

impl AccessDecision {
    /// Refusal with a reason.
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny(reason.into())
    }

    /// Whether access is granted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decides whether the authenticated caller may perform an operation.
#[async_trait]
pub trait Authorizer: Send + Sync + std::fmt::Debug {
    /// Checks access for the request described by `ctx`.
    async fn authorize(&self, ctx: &PluginContext) -> AccessDecision;
}

/// Runs an [`Authorizer`] in BEFORE; a denial aborts with `403 Forbidden`.
#[derive(Debug)]
pub struct AuthorizationPlugin {
    settings: AdapterSettings,
    authorizer: Arc<dyn Authorizer>,
}

impl AuthorizationPlugin {
    /// Creates the adapter with priority 20.
    pub fn new(authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            settings: AdapterSettings::new("authorization", Capability::Authorization),
            authorizer,
        }
    }

    adapter_builders!();
}

#[async_trait]
impl Plugin for AuthorizationPlugin {
    adapter_metadata!();

    async fn before(&self, ctx: &PluginContext) -> Result<PluginResult, PluginError> {
        match self.authorizer.authorize(ctx).await {
            AccessDecision::Allow => Ok(PluginResult::Continue),
            AccessDecision::Deny(reason) => {
                info!(
                    plugin = %self.settings.name,
                    user_id = ?ctx.user_id(),
                    operation = %ctx.operation(),
                    resource_type = %ctx.resource_type(),
                    reason = %reason,
                    "Access denied"
                );
                Ok(PluginResult::abort(StatusCode::FORBIDDEN, reason))
            }
        }
    }
}
