//! Integration tests for phase ordering, vetoes, failure containment and
//! background dispatch.

mod helpers;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::Notify;

use helpers::{CoreSpy, Journal, Script, ScriptedPlugin};
use respipe_core::config::PipelineConfig;
use respipe_core::tenant::{self, TenantId};
use respipe_plugin::prelude::*;

fn read_ctx() -> PluginContext {
    PluginContext::new(OperationKind::Read, "Patient")
}

#[tokio::test]
async fn test_priority_ordering_is_stable() {
    let journal = Journal::default();
    let o = helpers::orchestrator(1);
    o.register_plugin(Arc::new(ScriptedPlugin::new("A", 10, &journal))).await.unwrap();
    o.register_plugin(Arc::new(ScriptedPlugin::new("B", 5, &journal))).await.unwrap();
    o.register_plugin(Arc::new(ScriptedPlugin::new("C", 5, &journal))).await.unwrap();

    let names: Vec<String> = o
        .matching_plugins(&read_ctx())
        .iter()
        .map(|p| p.name().to_string())
        .collect();
    assert_eq!(names, ["B", "C", "A"]);

    assert_eq!(o.execute_before(&read_ctx()).await, PluginResult::Continue);
    assert_eq!(journal.entries(), ["before:B", "before:C", "before:A"]);
}

#[tokio::test]
async fn test_before_abort_never_invokes_core() {
    let journal = Journal::default();
    let o = helpers::orchestrator(1);
    o.register_plugin(Arc::new(
        ScriptedPlugin::new("guard", 1, &journal).with_before(Script::Return(PluginResult::abort(
            StatusCode::FORBIDDEN,
            "Tenant suspended",
        ))),
    ))
    .await
    .unwrap();
    o.register_plugin(Arc::new(ScriptedPlugin::new("later", 2, &journal)))
        .await
        .unwrap();

    let spy = CoreSpy::default();
    let ctx = read_ctx();
    let p = spy.clone();
    let result = o
        .execute_crud_operation(&ctx, move |ctx| async move {
            p.run(ctx, Ok(OperationResult::ok(json!({"id": "p1"})))).await
        })
        .await;

    assert_eq!(spy.calls(), 0);
    assert!(!result.success);
    assert_eq!(result.status, StatusCode::FORBIDDEN);
    assert_eq!(result.message.as_deref(), Some("Tenant suspended"));
    assert_eq!(journal.entries(), ["before:guard"]);
}

#[tokio::test]
async fn test_failing_before_plugin_yields_500() {
    for script in [
        Script::Fail("rules unavailable".into()),
        Script::Panic("rules exploded".into()),
    ] {
        let journal = Journal::default();
        let o = helpers::orchestrator(1);
        o.register_plugin(Arc::new(
            ScriptedPlugin::new("flaky", 1, &journal).with_before(script),
        ))
        .await
        .unwrap();

        let spy = CoreSpy::default();
        let p = spy.clone();
        let result = o
            .execute_crud_operation(&read_ctx(), move |ctx| async move {
                p.run(ctx, Ok(OperationResult::no_content())).await
            })
            .await;

        assert_eq!(spy.calls(), 0);
        assert_eq!(result.status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = result.message.unwrap_or_default();
        assert!(message.starts_with("Plugin error"), "unexpected message: {message}");
    }
}

#[tokio::test]
async fn test_failing_after_plugin_does_not_stop_next() {
    let journal = Journal::default();
    let o = helpers::orchestrator(1);
    o.register_plugin(Arc::new(
        ScriptedPlugin::new("audit", 1, &journal)
            .with_after(Script::Fail("audit store down".into())),
    ))
    .await
    .unwrap();
    o.register_plugin(Arc::new(
        ScriptedPlugin::new("panicky", 2, &journal).with_after(Script::Panic("boom".into())),
    ))
    .await
    .unwrap();
    o.register_plugin(Arc::new(ScriptedPlugin::new("notify", 3, &journal)))
        .await
        .unwrap();

    let result = o
        .execute_crud_operation(&read_ctx(), |_| async {
            Ok(OperationResult::ok(json!({"id": "p1"})))
        })
        .await;

    assert!(result.success);
    assert_eq!(result.status, StatusCode::OK);
    assert_eq!(
        journal.entries(),
        [
            "before:audit",
            "before:panicky",
            "before:notify",
            "after:audit",
            "after:panicky",
            "after:notify",
        ]
    );
}

/// Async-mode plugin whose AFTER hook waits for a signal before counting.
#[derive(Debug)]
struct GatedPlugin {
    gate: Arc<Notify>,
    completed: Arc<AtomicUsize>,
}

#[async_trait]
impl Plugin for GatedPlugin {
    fn name(&self) -> &str {
        "gated"
    }

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Async
    }

    async fn after(&self, _ctx: &PluginContext) -> Result<PluginResult, PluginError> {
        self.gate.notified().await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(PluginResult::Continue)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_after_is_non_blocking() {
    let gate = Arc::new(Notify::new());
    let completed = Arc::new(AtomicUsize::new(0));
    let o = helpers::orchestrator(1);
    o.register_plugin(Arc::new(GatedPlugin {
        gate: gate.clone(),
        completed: completed.clone(),
    }))
    .await
    .unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        o.execute_crud_operation(&read_ctx(), |_| async {
            Ok(OperationResult::ok(json!({"id": "p1"})))
        }),
    )
    .await
    .expect("operation must not wait for background hooks");

    assert!(result.success);
    assert_eq!(completed.load(Ordering::SeqCst), 0);

    // notify_one stores a permit, so the hook proceeds even if it has not
    // started waiting yet.
    gate.notify_one();
    tokio::time::timeout(Duration::from_secs(5), async {
        while completed.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("background hook never ran");

    assert_eq!(completed.load(Ordering::SeqCst), 1);
}

/// Async-mode plugin that reads the tenant on both sides of a yield point
/// and records what it saw next to the tenant the request was built under.
#[derive(Debug, Default)]
struct TenantEcho {
    seen: Mutex<Vec<(Option<TenantId>, Option<TenantId>, Option<TenantId>)>>,
}

#[async_trait]
impl Plugin for TenantEcho {
    fn name(&self) -> &str {
        "tenant-echo"
    }

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Async
    }

    async fn after(&self, ctx: &PluginContext) -> Result<PluginResult, PluginError> {
        let first = tenant::current_tenant();
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        let second = tenant::current_tenant();

        self.seen
            .lock()
            .unwrap()
            .push((ctx.tenant_id().cloned(), first, second));
        Ok(PluginResult::Continue)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_background_hooks_see_submitter_tenant() {
    const ROUNDS: usize = 50;
    let echo = Arc::new(TenantEcho::default());
    let o = Arc::new(helpers::orchestrator(2));
    o.register_plugin(echo.clone()).await.unwrap();

    let mut requests = Vec::new();
    for _ in 0..ROUNDS {
        for tenant in [Some("acme"), Some("globex"), None] {
            let o = o.clone();
            requests.push(tokio::spawn(tenant::with_tenant(
                tenant.map(TenantId::new),
                async move {
                    let ctx = PluginContext::new(OperationKind::Read, "Patient");
                    o.execute_crud_operation(&ctx, |_| async {
                        Ok(OperationResult::ok(json!({"id": "p1"})))
                    })
                    .await
                },
            )));
        }
    }
    for request in requests {
        assert!(request.await.unwrap().success);
    }

    assert!(o.pool().shutdown().await);

    let seen = echo.seen.lock().unwrap();
    assert_eq!(seen.len(), ROUNDS * 3);
    for (submitter, first, second) in seen.iter() {
        assert_eq!(first, submitter);
        assert_eq!(second, submitter);
    }
    let acme = seen
        .iter()
        .filter(|(t, _, _)| t.as_ref().map(TenantId::as_str) == Some("acme"))
        .count();
    let anonymous = seen.iter().filter(|(t, _, _)| t.is_none()).count();
    assert_eq!(acme, ROUNDS);
    assert_eq!(anonymous, ROUNDS);
    assert_eq!(tenant::current_tenant(), None);
}

#[tokio::test]
async fn test_after_skip_stops_sync_and_background_plugins() {
    let journal = Journal::default();
    let o = helpers::orchestrator(1);
    let summary = json!({"resourceType": "Patient", "id": "p1", "summary": true});
    o.register_plugin(Arc::new(
        ScriptedPlugin::new("summarize", 1, &journal)
            .with_after(Script::Return(PluginResult::skip_with(summary.clone()))),
    ))
    .await
    .unwrap();
    o.register_plugin(Arc::new(ScriptedPlugin::new("audit", 2, &journal)))
        .await
        .unwrap();
    let background =
        Arc::new(ScriptedPlugin::new("notify", 3, &journal).with_mode(ExecutionMode::Async));
    o.register_plugin(background.clone()).await.unwrap();

    let result = o
        .execute_crud_operation(&read_ctx(), |_| async {
            Ok(OperationResult::ok(json!({"resourceType": "Patient", "id": "p1"})))
        })
        .await;

    assert_eq!(o.pool().pending(), 0);
    assert!(o.pool().shutdown().await);

    assert!(result.success);
    assert_eq!(result.resource, Some(summary));
    assert_eq!(
        journal.entries(),
        ["before:summarize", "before:audit", "after:summarize"]
    );
    assert!(background.seen_tenants().is_empty());
}

#[tokio::test]
async fn test_after_abort_is_ignored() {
    let journal = Journal::default();
    let o = helpers::orchestrator(1);
    o.register_plugin(Arc::new(
        ScriptedPlugin::new("late-veto", 1, &journal).with_after(Script::Return(
            PluginResult::abort(StatusCode::CONFLICT, "too late"),
        )),
    ))
    .await
    .unwrap();
    o.register_plugin(Arc::new(ScriptedPlugin::new("audit", 2, &journal)))
        .await
        .unwrap();

    let result = o
        .execute_crud_operation(&read_ctx(), |_| async {
            Ok(OperationResult::created(json!({"id": "p1"})))
        })
        .await;

    assert!(result.success);
    assert_eq!(result.status, StatusCode::CREATED);
    assert_eq!(result.resource, Some(json!({"id": "p1"})));
    assert_eq!(
        journal.entries(),
        ["before:late-veto", "before:audit", "after:late-veto", "after:audit"]
    );
}

#[tokio::test]
async fn test_from_config_sizes_pool() {
    let config = PipelineConfig::from_toml(
        r#"
        [worker]
        concurrency = 3
        shutdown_timeout_seconds = 1
        "#,
    )
    .unwrap();
    let o = PluginOrchestrator::from_config(&config);
    assert_eq!(o.pool().concurrency(), 3);

    let journal = Journal::default();
    o.register_plugin(Arc::new(
        ScriptedPlugin::new("bg", 1, &journal).with_mode(ExecutionMode::Async),
    ))
    .await
    .unwrap();
    o.execute_crud_operation(&read_ctx(), |_| async { Ok(OperationResult::no_content()) })
        .await;
    o.shutdown().await;

    assert_eq!(journal.entries(), ["after:bg"]);
}

#[tokio::test]
async fn test_core_failure_yields_500_regardless_of_on_error() {
    let journal = Journal::default();
    let o = helpers::orchestrator(1);
    o.register_plugin(Arc::new(
        ScriptedPlugin::new("veto", 1, &journal).with_on_error(Script::Return(PluginResult::abort(
            StatusCode::CONFLICT,
            "ignored",
        ))),
    ))
    .await
    .unwrap();
    o.register_plugin(Arc::new(
        ScriptedPlugin::new("fails", 2, &journal)
            .with_on_error(Script::Fail("alerting down".into())),
    ))
    .await
    .unwrap();
    o.register_plugin(Arc::new(
        ScriptedPlugin::new("panics", 3, &journal).with_on_error(Script::Panic("boom".into())),
    ))
    .await
    .unwrap();

    let result = o
        .execute_crud_operation(&read_ctx(), |_| async {
            Err(OperationError::failed("database unavailable"))
        })
        .await;

    assert!(!result.success);
    assert_eq!(result.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(result.message.as_deref(), Some("database unavailable"));

    let on_error: Vec<String> = journal
        .entries()
        .into_iter()
        .filter(|e| e.starts_with("on_error:"))
        .collect();
    assert_eq!(on_error, ["on_error:veto", "on_error:fails", "on_error:panics"]);
    assert!(!journal.entries().iter().any(|e| e.starts_with("after:")));
}

#[tokio::test]
async fn test_before_modified_resource_reaches_core() {
    let journal = Journal::default();
    let o = helpers::orchestrator(1);
    let normalized = json!({"resourceType": "Patient", "name": "ALICE"});
    o.register_plugin(Arc::new(
        ScriptedPlugin::new("normalize", 1, &journal)
            .with_before(Script::Return(PluginResult::modified(normalized.clone()))),
    ))
    .await
    .unwrap();

    let ctx = PluginContext::builder(OperationKind::Create, "Patient")
        .with_input(json!({"resourceType": "Patient", "name": "alice"}))
        .build();
    let spy = CoreSpy::default();
    let p = spy.clone();
    let result = o
        .execute_crud_operation(&ctx, move |ctx| async move {
            let input = ctx.input_resource();
            p.run(ctx, Ok(OperationResult::success(input, StatusCode::CREATED))).await
        })
        .await;

    assert_eq!(spy.inputs(), vec![Some(normalized.clone())]);
    assert_eq!(result.status, StatusCode::CREATED);
    assert_eq!(result.resource, Some(normalized));
}

#[tokio::test]
async fn test_skip_without_resource_returns_input() {
    let journal = Journal::default();
    let o = helpers::orchestrator(1);
    o.register_plugin(Arc::new(
        ScriptedPlugin::new("dedupe", 1, &journal)
            .with_before(Script::Return(PluginResult::skip())),
    ))
    .await
    .unwrap();

    let ctx = PluginContext::builder(OperationKind::Create, "Patient")
        .with_input(json!({"id": "existing"}))
        .build();
    let spy = CoreSpy::default();
    let p = spy.clone();
    let result = o
        .execute_crud_operation(&ctx, move |ctx| async move {
            p.run(ctx, Ok(OperationResult::no_content())).await
        })
        .await;

    assert_eq!(spy.calls(), 0);
    assert_eq!(result.status, StatusCode::OK);
    assert_eq!(result.resource, Some(json!({"id": "existing"})));
    assert_eq!(journal.entries(), ["before:dedupe"]);
}

#[tokio::test]
async fn test_register_unregister_round_trip() {
    let journal = Journal::default();
    let o = helpers::orchestrator(1);
    let resident = Arc::new(ScriptedPlugin::new("resident", 1, &journal));
    o.register_plugin(resident.clone()).await.unwrap();
    let before: Vec<String> = o
        .matching_plugins(&read_ctx())
        .iter()
        .map(|p| p.name().to_string())
        .collect();

    let visitor = Arc::new(ScriptedPlugin::new("visitor", 1, &journal));
    let handle: Arc<dyn Plugin> = visitor.clone();
    o.register_plugin(handle.clone()).await.unwrap();
    assert_eq!(o.matching_plugins(&read_ctx()).len(), 2);

    assert!(o.unregister_plugin(&handle).await);
    assert!(!o.unregister_plugin(&handle).await);

    let after: Vec<String> = o
        .matching_plugins(&read_ctx())
        .iter()
        .map(|p| p.name().to_string())
        .collect();
    assert_eq!(before, after);
    assert_eq!(visitor.destroy_count(), 1);
    assert_eq!(resident.destroy_count(), 0);
}

#[tokio::test]
async fn test_operation_filtering() {
    let journal = Journal::default();
    let o = helpers::orchestrator(1);
    o.register_plugin(Arc::new(
        ScriptedPlugin::new("observations", 1, &journal)
            .with_operations(operations!["Observation" => Create, "Observation" => Update]),
    ))
    .await
    .unwrap();
    o.register_plugin(Arc::new(
        ScriptedPlugin::new("everything", 2, &journal)
            .with_operations(operations!["Patient" => Extended("$everything")]),
    ))
    .await
    .unwrap();

    let everything = PluginContext::new(OperationKind::Extended("$everything".into()), "Patient");
    let result = o
        .execute_extended_operation(&everything, |_| async { Ok(OperationResult::ok(json!({}))) })
        .await;
    assert!(result.success);

    o.execute_before(&PluginContext::new(OperationKind::Create, "Observation"))
        .await;
    o.execute_before(&PluginContext::new(OperationKind::Read, "Observation"))
        .await;

    assert_eq!(
        journal.entries(),
        ["before:everything", "after:everything", "before:observations"]
    );
}

#[tokio::test]
async fn test_shutdown_destroys_plugins_and_drains_pool() {
    let journal = Journal::default();
    let o = helpers::orchestrator(1);
    let background =
        Arc::new(ScriptedPlugin::new("bg", 1, &journal).with_mode(ExecutionMode::Async));
    o.register_plugin(background.clone()).await.unwrap();

    o.execute_crud_operation(&read_ctx(), |_| async { Ok(OperationResult::no_content()) })
        .await;
    o.shutdown().await;

    assert_eq!(journal.entries(), ["after:bg"]);
    assert_eq!(background.destroy_count(), 1);
    assert!(o.plugins().is_empty());
    assert!(!o.pool().is_accepting());
}
