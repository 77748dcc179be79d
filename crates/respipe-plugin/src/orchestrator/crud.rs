//! Wrapping of core operations in the plugin phases.

use std::future::Future;

use http::StatusCode;
use tracing::{debug, error, info};

use crate::context::PluginContext;
use crate::guard::catch_operation;
use crate::operation::{OperationError, OperationResult};
use crate::result::PluginResult;

use super::PluginOrchestrator;

impl PluginOrchestrator {
    /// Runs a CRUD operation wrapped in the BEFORE, AFTER and ON_ERROR phases.
    ///
    /// - A BEFORE `Abort` is returned as a failure and `core` is never called.
    /// - A BEFORE `SkipRemaining` short-circuits the operation: `core` and the
    ///   AFTER phase are skipped and the context's input resource is returned
    ///   with status 200.
    /// - A failure of `core` or of the AFTER phase runs ON_ERROR and yields a
    ///   500 carrying the error message.
    pub async fn execute_crud_operation<F, Fut>(
        &self,
        ctx: &PluginContext,
        core: F,
    ) -> OperationResult
    where
        F: FnOnce(PluginContext) -> Fut + Send,
        Fut: Future<Output = Result<OperationResult, OperationError>> + Send,
    {
        self.run_wrapped("crud", ctx, core).await
    }

    /// Runs an extended (named custom) operation. Same semantics as
    /// [`execute_crud_operation`](Self::execute_crud_operation).
    pub async fn execute_extended_operation<F, Fut>(
        &self,
        ctx: &PluginContext,
        core: F,
    ) -> OperationResult
    where
        F: FnOnce(PluginContext) -> Fut + Send,
        Fut: Future<Output = Result<OperationResult, OperationError>> + Send,
    {
        self.run_wrapped("extended", ctx, core).await
    }

    async fn run_wrapped<F, Fut>(
        &self,
        kind: &'static str,
        ctx: &PluginContext,
        core: F,
    ) -> OperationResult
    where
        F: FnOnce(PluginContext) -> Fut + Send,
        Fut: Future<Output = Result<OperationResult, OperationError>> + Send,
    {
        debug!(
            kind,
            operation = %ctx.operation(),
            resource_type = %ctx.resource_type(),
            request_id = %ctx.request_id(),
            "Executing wrapped operation"
        );

        match self.execute_before(ctx).await {
            PluginResult::Abort { status, message } => {
                return OperationResult::failure(status, message);
            }
            PluginResult::SkipRemaining(_) => {
                let resource = ctx.input_resource();
                ctx.set_output_resource(resource.clone());
                info!(
                    kind,
                    operation = %ctx.operation(),
                    request_id = %ctx.request_id(),
                    "Operation short-circuited by plugin"
                );
                return OperationResult::success(resource, StatusCode::OK);
            }
            PluginResult::Continue | PluginResult::ContinueWithResource(_) => {}
        }

        let result = match catch_operation(core(ctx.clone())).await {
            Ok(result) => result,
            Err(err) => return self.fail(kind, ctx, err).await,
        };

        if result.resource.is_some() {
            ctx.set_output_resource(result.resource.clone());
        }

        if let Err(err) = catch_operation(async {
            self.execute_after(ctx).await;
            Ok(())
        })
        .await
        {
            return self.fail(kind, ctx, err).await;
        }

        match ctx.output_resource() {
            Some(resource) => result.with_resource(Some(resource)),
            None => result,
        }
    }

    async fn fail(
        &self,
        kind: &'static str,
        ctx: &PluginContext,
        err: OperationError,
    ) -> OperationResult {
        error!(
            kind,
            operation = %ctx.operation(),
            resource_type = %ctx.resource_type(),
            request_id = %ctx.request_id(),
            error = %err,
            "Operation failed"
        );
        self.execute_on_error(ctx, &err).await;
        OperationResult::from_error(&err)
    }
}
