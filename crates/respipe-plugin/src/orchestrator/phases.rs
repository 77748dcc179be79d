//! BEFORE / AFTER / ON_ERROR phase execution.
//!
//! BEFORE:
//! - Only sync-mode plugins take part, in priority order.
//! - `Abort` stops the phase and the operation; a failing hook is an abort
//!   with status 500.
//! - Carried resources replace the context's input resource.
//!
//! AFTER / ON_ERROR:
//! - Sync-mode plugins run in priority order; failures are logged and the
//!   loop continues.
//! - Async-mode plugins are then handed to the background pool and never
//!   awaited.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use respipe_core::tenant::TenantBaton;

use crate::context::PluginContext;
use crate::guard::catch_hook;
use crate::operation::OperationError;
use crate::plugin::{ExecutionMode, Plugin};
use crate::result::PluginResult;

use super::PluginOrchestrator;

/// Lifecycle phase of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Before the core operation; may modify the input or veto.
    Before,
    /// After a successful core operation; side effects only.
    After,
    /// After a failed core operation; notification only.
    OnError,
}

impl Phase {
    /// Returns the string name of this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
            Self::OnError => "on_error",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl PluginOrchestrator {
    /// Runs the BEFORE phase.
    ///
    /// Returns the first `Abort` or `SkipRemaining` produced, or `Continue`.
    /// Async-mode plugins are not consulted.
    pub async fn execute_before(&self, ctx: &PluginContext) -> PluginResult {
        let plugins = self.matching_plugins(ctx);

        for plugin in plugins
            .iter()
            .filter(|p| p.execution_mode() == ExecutionMode::Sync)
        {
            let result = match catch_hook(plugin.before(ctx)).await {
                Ok(result) => result,
                Err(e) => {
                    error!(
                        plugin = %plugin.name(),
                        phase = %Phase::Before,
                        request_id = %ctx.request_id(),
                        error = %e,
                        "Plugin failed, aborting operation"
                    );
                    return PluginResult::plugin_error(e);
                }
            };

            match result {
                PluginResult::Continue => {
                    debug!(
                        plugin = %plugin.name(),
                        phase = %Phase::Before,
                        "Plugin returned Continue"
                    );
                }
                PluginResult::ContinueWithResource(resource) => {
                    debug!(
                        plugin = %plugin.name(),
                        phase = %Phase::Before,
                        "Plugin modified input resource"
                    );
                    ctx.set_input_resource(Some(resource));
                }
                PluginResult::SkipRemaining(resource) => {
                    debug!(
                        plugin = %plugin.name(),
                        phase = %Phase::Before,
                        "Plugin skipped remaining plugins"
                    );
                    if let Some(resource) = &resource {
                        ctx.set_input_resource(Some(resource.clone()));
                    }
                    return PluginResult::SkipRemaining(resource);
                }
                abort @ PluginResult::Abort { .. } => {
                    if let PluginResult::Abort { status, message } = &abort {
                        info!(
                            plugin = %plugin.name(),
                            request_id = %ctx.request_id(),
                            status = status.as_u16(),
                            reason = %message,
                            "Plugin aborted operation"
                        );
                    }
                    return abort;
                }
            }
        }

        PluginResult::Continue
    }

    /// Runs the AFTER phase.
    ///
    /// A sync plugin returning `SkipRemaining` ends the phase, including the
    /// dispatch of async-mode plugins for this request.
    pub async fn execute_after(&self, ctx: &PluginContext) {
        let (sync, background): (Vec<_>, Vec<_>) = self
            .matching_plugins(ctx)
            .into_iter()
            .partition(|p| p.execution_mode() == ExecutionMode::Sync);

        for plugin in &sync {
            match catch_hook(plugin.after(ctx)).await {
                Ok(PluginResult::Continue) => {}
                Ok(PluginResult::ContinueWithResource(resource)) => {
                    debug!(
                        plugin = %plugin.name(),
                        phase = %Phase::After,
                        "Plugin modified output resource"
                    );
                    ctx.set_output_resource(Some(resource));
                }
                Ok(PluginResult::SkipRemaining(resource)) => {
                    if let Some(resource) = resource {
                        ctx.set_output_resource(Some(resource));
                    }
                    debug!(
                        plugin = %plugin.name(),
                        phase = %Phase::After,
                        "Plugin skipped remaining plugins"
                    );
                    return;
                }
                Ok(PluginResult::Abort { status, message }) => {
                    warn!(
                        plugin = %plugin.name(),
                        phase = %Phase::After,
                        status = status.as_u16(),
                        reason = %message,
                        "Plugin returned Abort after the operation completed, ignoring"
                    );
                }
                Err(e) => {
                    error!(
                        plugin = %plugin.name(),
                        phase = %Phase::After,
                        request_id = %ctx.request_id(),
                        error = %e,
                        "Plugin failed, continuing"
                    );
                }
            }
        }

        self.dispatch_background(background, ctx, None);
    }

    /// Runs the ON_ERROR phase for `err`. Hook results are ignored.
    pub async fn execute_on_error(&self, ctx: &PluginContext, err: &OperationError) {
        let (sync, background): (Vec<_>, Vec<_>) = self
            .matching_plugins(ctx)
            .into_iter()
            .partition(|p| p.execution_mode() == ExecutionMode::Sync);

        for plugin in &sync {
            if let Err(e) = catch_hook(plugin.on_error(ctx, err)).await {
                error!(
                    plugin = %plugin.name(),
                    phase = %Phase::OnError,
                    request_id = %ctx.request_id(),
                    error = %e,
                    "Plugin failed, continuing"
                );
            }
        }

        self.dispatch_background(background, ctx, Some(err));
    }

    /// Hands async-mode plugins to the pool. Each job runs under the tenant
    /// of the submitting task and shares `ctx` with the request.
    fn dispatch_background(
        &self,
        plugins: Vec<Arc<dyn Plugin>>,
        ctx: &PluginContext,
        err: Option<&OperationError>,
    ) {
        if plugins.is_empty() {
            return;
        }

        let phase = if err.is_some() {
            Phase::OnError
        } else {
            Phase::After
        };
        let baton = TenantBaton::capture();

        for plugin in plugins {
            let ctx = ctx.clone();
            let err = err.cloned();
            let label = format!("{}:{}", plugin.name(), phase);

            self.pool.submit_with_baton(&label, baton.clone(), async move {
                let outcome = match &err {
                    Some(err) => catch_hook(plugin.on_error(&ctx, err)).await,
                    None => catch_hook(plugin.after(&ctx)).await,
                };

                if let Err(e) = outcome {
                    error!(
                        plugin = %plugin.name(),
                        phase = %phase,
                        request_id = %ctx.request_id(),
                        error = %e,
                        "Background plugin failed"
                    );
                }
            });
        }
    }
}
