//! Test helpers: scriptable plugins and a counting core operation.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use respipe_core::tenant::{self, TenantId};
use respipe_plugin::prelude::*;
use respipe_plugin::worker::BackgroundPool;

/// Shared, ordered log of hook invocations.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// What a scripted hook does when invoked.
#[derive(Debug, Clone)]
pub enum Script {
    Return(PluginResult),
    Fail(String),
    Panic(String),
}

/// A plugin whose hooks follow a script and log to a journal.
#[derive(Debug)]
pub struct ScriptedPlugin {
    pub name: String,
    pub priority: i32,
    pub mode: ExecutionMode,
    pub capability: Capability,
    pub operations: Vec<OperationDescriptor>,
    pub before: Script,
    pub after: Script,
    pub on_error: Script,
    pub journal: Journal,
    pub destroyed: AtomicUsize,
    pub tenants: Mutex<Vec<Option<TenantId>>>,
}

impl ScriptedPlugin {
    pub fn new(name: &str, priority: i32, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            priority,
            mode: ExecutionMode::Sync,
            capability: Capability::Custom,
            operations: vec![OperationDescriptor::All],
            before: Script::Return(PluginResult::Continue),
            after: Script::Return(PluginResult::Continue),
            on_error: Script::Return(PluginResult::Continue),
            journal: journal.clone(),
            destroyed: AtomicUsize::new(0),
            tenants: Mutex::new(Vec::new()),
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = capability;
        self
    }

    pub fn with_operations(mut self, operations: Vec<OperationDescriptor>) -> Self {
        self.operations = operations;
        self
    }

    pub fn with_before(mut self, script: Script) -> Self {
        self.before = script;
        self
    }

    pub fn with_after(mut self, script: Script) -> Self {
        self.after = script;
        self
    }

    pub fn with_on_error(mut self, script: Script) -> Self {
        self.on_error = script;
        self
    }

    pub fn destroy_count(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn seen_tenants(&self) -> Vec<Option<TenantId>> {
        self.tenants.lock().unwrap().clone()
    }

    fn play(&self, phase: &str, script: &Script) -> Result<PluginResult, PluginError> {
        self.journal.push(format!("{}:{}", phase, self.name));
        self.tenants.lock().unwrap().push(tenant::current_tenant());
        match script {
            Script::Return(result) => Ok(result.clone()),
            Script::Fail(message) => Err(PluginError::failed(message.clone())),
            Script::Panic(message) => panic!("{}", message),
        }
    }
}

#[async_trait]
impl Plugin for ScriptedPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }

    fn capability(&self) -> Capability {
        self.capability
    }

    fn supported_operations(&self) -> Vec<OperationDescriptor> {
        self.operations.clone()
    }

    async fn destroy(&self) -> Result<(), PluginError> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn before(&self, _ctx: &PluginContext) -> Result<PluginResult, PluginError> {
        self.play("before", &self.before)
    }

    async fn after(&self, _ctx: &PluginContext) -> Result<PluginResult, PluginError> {
        self.play("after", &self.after)
    }

    async fn on_error(
        &self,
        _ctx: &PluginContext,
        _err: &OperationError,
    ) -> Result<PluginResult, PluginError> {
        self.play("on_error", &self.on_error)
    }
}

/// Counts core-operation invocations and records the input each one saw.
#[derive(Debug, Clone, Default)]
pub struct CoreSpy {
    calls: Arc<AtomicUsize>,
    inputs: Arc<Mutex<Vec<Option<Resource>>>>,
}

impl CoreSpy {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<Option<Resource>> {
        self.inputs.lock().unwrap().clone()
    }

    /// Records the call, then returns `result`.
    pub async fn run(
        &self,
        ctx: PluginContext,
        result: Result<OperationResult, OperationError>,
    ) -> Result<OperationResult, OperationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(ctx.input_resource());
        result
    }
}

/// An orchestrator with a small dedicated pool.
pub fn orchestrator(workers: usize) -> PluginOrchestrator {
    PluginOrchestrator::with_pool(Arc::new(BackgroundPool::new(workers)))
}
