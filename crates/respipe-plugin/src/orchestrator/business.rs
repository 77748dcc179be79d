//! Business-rule sub-pipeline.
//!
//! Only plugins declaring [`Capability::BusinessRule`] take part, in both
//! execution modes, awaited in-line.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::business::{BusinessContext, BusinessPhase, BusinessResult};
use crate::guard::catch_hook;
use crate::operation::OperationResult;
use crate::plugin::{Capability, Plugin};
use crate::result::PluginResult;

use super::PluginOrchestrator;

impl PluginOrchestrator {
    /// Evaluates business rules before the core operation.
    ///
    /// The first refusal wins. A failing rule refuses with status 500. A rule
    /// returning `SkipRemaining` ends the evaluation, as in the BEFORE phase.
    pub async fn execute_business_logic_before(
        &self,
        business: &mut BusinessContext,
    ) -> BusinessResult {
        business.set_phase(BusinessPhase::Before);
        let mut modified = false;

        for rule in self.business_rules(business) {
            let result = match catch_hook(rule.before(business.context())).await {
                Ok(result) => result,
                Err(e) => {
                    error!(
                        plugin = %rule.name(),
                        phase = "business_before",
                        request_id = %business.context().request_id(),
                        error = %e,
                        "Business rule failed"
                    );
                    return PluginResult::plugin_error(e).into();
                }
            };

            match result {
                PluginResult::Abort { status, message } => {
                    info!(
                        plugin = %rule.name(),
                        status = status.as_u16(),
                        reason = %message,
                        "Business rule refused operation"
                    );
                    return BusinessResult::Abort { status, message };
                }
                PluginResult::SkipRemaining(resource) => {
                    if let Some(resource) = resource {
                        business.set_resource(resource);
                        modified = true;
                    }
                    debug!(plugin = %rule.name(), "Business rule skipped remaining rules");
                    break;
                }
                other => {
                    if let Some(resource) = other.into_resource() {
                        debug!(plugin = %rule.name(), "Business rule modified resource");
                        business.set_resource(resource);
                        modified = true;
                    }
                }
            }
        }

        Self::settle(business, modified)
    }

    /// Evaluates business rules after a completed operation.
    ///
    /// `result`'s resource becomes the context's output resource. Failures
    /// and refusals are logged and ignored: a completed operation is never
    /// failed here. `SkipRemaining` ends the evaluation.
    pub async fn execute_business_logic_after(
        &self,
        business: &mut BusinessContext,
        result: &OperationResult,
    ) -> BusinessResult {
        business.set_phase(BusinessPhase::After);
        business.context().set_output_resource(result.resource.clone());
        let mut modified = false;

        for rule in self.business_rules(business) {
            match catch_hook(rule.after(business.context())).await {
                Ok(PluginResult::Abort { status, message }) => {
                    warn!(
                        plugin = %rule.name(),
                        status = status.as_u16(),
                        reason = %message,
                        "Business rule refused a completed operation, ignoring"
                    );
                }
                Ok(PluginResult::SkipRemaining(resource)) => {
                    if let Some(resource) = resource {
                        business.set_resource(resource);
                        modified = true;
                    }
                    debug!(plugin = %rule.name(), "Business rule skipped remaining rules");
                    break;
                }
                Ok(other) => {
                    if let Some(resource) = other.into_resource() {
                        debug!(plugin = %rule.name(), "Business rule modified output");
                        business.set_resource(resource);
                        modified = true;
                    }
                }
                Err(e) => {
                    error!(
                        plugin = %rule.name(),
                        phase = "business_after",
                        request_id = %business.context().request_id(),
                        error = %e,
                        "Business rule failed, continuing"
                    );
                }
            }
        }

        Self::settle(business, modified)
    }

    fn business_rules(&self, business: &BusinessContext) -> Vec<Arc<dyn Plugin>> {
        self.matching_plugins(business.context())
            .into_iter()
            .filter(|p| p.capability() == Capability::BusinessRule)
            .collect()
    }

    fn settle(business: &BusinessContext, modified: bool) -> BusinessResult {
        match business.resource() {
            Some(resource) if modified => BusinessResult::Modified(resource),
            _ => BusinessResult::Proceed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use http::StatusCode;
    use serde_json::json;

    use crate::context::PluginContext;
    use crate::descriptor::OperationKind;
    use crate::plugin::PluginError;
    use crate::worker::BackgroundPool;

    #[derive(Debug)]
    struct Rule {
        name: &'static str,
        capability: Capability,
        fail: bool,
    }

    #[async_trait]
    impl Plugin for Rule {
        fn name(&self) -> &str {
            self.name
        }

        fn capability(&self) -> Capability {
            self.capability
        }

        async fn before(&self, ctx: &PluginContext) -> Result<PluginResult, PluginError> {
            if self.fail {
                return Err(PluginError::failed("rule engine offline"));
            }
            let mut resource = ctx.input_resource().unwrap_or_default();
            resource["checkedBy"] = json!(self.name);
            Ok(PluginResult::modified(resource))
        }

        async fn after(&self, _ctx: &PluginContext) -> Result<PluginResult, PluginError> {
            if self.fail {
                return Err(PluginError::failed("rule engine offline"));
            }
            Ok(PluginResult::abort(StatusCode::CONFLICT, "too late"))
        }
    }

    fn rule(name: &'static str, capability: Capability, fail: bool) -> Arc<Rule> {
        Arc::new(Rule {
            name,
            capability,
            fail,
        })
    }

    fn orchestrator() -> PluginOrchestrator {
        PluginOrchestrator::with_pool(Arc::new(BackgroundPool::new(1)))
    }

    #[tokio::test]
    async fn test_only_business_rules_run() {
        let o = orchestrator();
        o.register_plugin(rule("custom", Capability::Custom, true)).await.unwrap();
        o.register_plugin(rule("rule", Capability::BusinessRule, false)).await.unwrap();

        let ctx = PluginContext::builder(OperationKind::Create, "Patient")
            .with_input(json!({"id": "p1"}))
            .build();
        let mut business = BusinessContext::new(ctx.clone());

        let result = o.execute_business_logic_before(&mut business).await;
        assert_eq!(
            result,
            BusinessResult::Modified(json!({"id": "p1", "checkedBy": "rule"}))
        );
        assert_eq!(ctx.input_resource(), Some(json!({"id": "p1", "checkedBy": "rule"})));
    }

    #[tokio::test]
    async fn test_failing_rule_refuses_with_500() {
        let o = orchestrator();
        o.register_plugin(rule("broken", Capability::BusinessRule, true)).await.unwrap();

        let ctx = PluginContext::new(OperationKind::Create, "Patient");
        let mut business = BusinessContext::new(ctx);
        match o.execute_business_logic_before(&mut business).await {
            BusinessResult::Abort { status, message } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert!(message.starts_with("Plugin error"));
            }
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_after_never_fails_completed_operation() {
        let o = orchestrator();
        o.register_plugin(rule("late", Capability::BusinessRule, false)).await.unwrap();
        o.register_plugin(rule("broken", Capability::BusinessRule, true)).await.unwrap();

        let ctx = PluginContext::new(OperationKind::Update, "Patient");
        let mut business = BusinessContext::new(ctx);
        let completed = OperationResult::ok(json!({"id": "p1"}));

        let result = o.execute_business_logic_after(&mut business, &completed).await;
        assert_eq!(result, BusinessResult::Proceed);
        assert_eq!(business.resource(), Some(json!({"id": "p1"})));
    }

    #[derive(Debug)]
    struct Stopper;

    #[async_trait]
    impl Plugin for Stopper {
        fn name(&self) -> &str {
            "stopper"
        }

        fn priority(&self) -> i32 {
            1
        }

        fn capability(&self) -> Capability {
            Capability::BusinessRule
        }

        async fn before(&self, _ctx: &PluginContext) -> Result<PluginResult, PluginError> {
            Ok(PluginResult::skip_with(json!({"id": "p1", "stopped": true})))
        }
    }

    #[tokio::test]
    async fn test_skip_remaining_ends_rule_evaluation() {
        let o = orchestrator();
        o.register_plugin(rule("rule", Capability::BusinessRule, false)).await.unwrap();
        o.register_plugin(Arc::new(Stopper)).await.unwrap();

        let ctx = PluginContext::builder(OperationKind::Create, "Patient")
            .with_input(json!({"id": "p1"}))
            .build();
        let mut business = BusinessContext::new(ctx.clone());

        let result = o.execute_business_logic_before(&mut business).await;
        assert_eq!(
            result,
            BusinessResult::Modified(json!({"id": "p1", "stopped": true}))
        );
        // "rule" would have added `checkedBy`.
        assert_eq!(ctx.input_resource(), Some(json!({"id": "p1", "stopped": true})));
    }
}
