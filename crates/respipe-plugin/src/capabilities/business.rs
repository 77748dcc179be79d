//! Business-rule adapter.

use std::sync::Arc;

use async_trait::async_trait;

use crate::business::{BusinessContext, BusinessPhase, BusinessResult};
use crate::context::PluginContext;
use crate::plugin::{Capability, Plugin, PluginError};
use crate::result::PluginResult;

use super::AdapterSettings;

/// A domain rule evaluated around an operation.
///
/// Both hooks default to [`BusinessResult::Proceed`].
#[async_trait]
pub trait BusinessRule: Send + Sync + std::fmt::Debug {
    /// Validates or rewrites the request input.
    async fn before(&self, _ctx: &BusinessContext) -> Result<BusinessResult, PluginError> {
        Ok(BusinessResult::Proceed)
    }

    /// Reacts to, or rewrites, the operation output.
    async fn after(&self, _ctx: &BusinessContext) -> Result<BusinessResult, PluginError> {
        Ok(BusinessResult::Proceed)
    }
}

/// Exposes a [`BusinessRule`] as a plugin with the `BusinessRule`
/// capability, so it takes part in the main phases and in the business
/// sub-pipeline alike.
#[derive(Debug)]
pub struct BusinessRulePlugin {
    settings: AdapterSettings,
    rule: Arc<dyn BusinessRule>,
}

impl BusinessRulePlugin {
    /// Creates the adapter with priority 50.
    pub fn new(name: impl Into<String>, rule: Arc<dyn BusinessRule>) -> Self {
        let mut settings = AdapterSettings::new("business-rule", Capability::BusinessRule);
        settings.name = name.into();
        Self { settings, rule }
    }

    adapter_builders!();
}

#[async_trait]
impl Plugin for BusinessRulePlugin {
    adapter_metadata!();

    async fn before(&self, ctx: &PluginContext) -> Result<PluginResult, PluginError> {
        let business = BusinessContext::for_phase(ctx.clone(), BusinessPhase::Before);
        Ok(self.rule.before(&business).await?.into())
    }

    async fn after(&self, ctx: &PluginContext) -> Result<PluginResult, PluginError> {
        let business = BusinessContext::for_phase(ctx.clone(), BusinessPhase::After);
        Ok(self.rule.after(&business).await?.into())
    }
}
