//! Request timing adapter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::context::PluginContext;
use crate::descriptor::OperationKind;
use crate::operation::OperationError;
use crate::plugin::{Capability, Plugin, PluginError};
use crate::result::PluginResult;

use super::AdapterSettings;

/// Attribute holding the BEFORE start stamp, in microseconds since the epoch.
pub const STARTED_AT_ATTRIBUTE: &str = "performance.started_at";

/// Timing of one completed operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    /// Request the measurement belongs to.
    pub request_id: Uuid,
    /// Operation executed.
    pub operation: OperationKind,
    /// Resource type operated on.
    pub resource_type: String,
    /// Time from BEFORE to AFTER or ON_ERROR.
    pub elapsed: Duration,
    /// Whether the operation succeeded.
    pub success: bool,
}

/// Sink for measurements.
pub trait PerformanceRecorder: Send + Sync + std::fmt::Debug {
    /// Records one measurement.
    fn record(&self, measurement: &Measurement);
}

/// Logs every measurement at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRecorder;

impl PerformanceRecorder for TracingRecorder {
    fn record(&self, m: &Measurement) {
        info!(
            request_id = %m.request_id,
            operation = %m.operation,
            resource_type = %m.resource_type,
            elapsed_ms = m.elapsed.as_millis() as u64,
            success = m.success,
            "Operation timing"
        );
    }
}

/// Measures the time each operation takes.
///
/// BEFORE stamps the start on the request context; AFTER and ON_ERROR
/// record the elapsed time. When BEFORE did not run (e.g. in async mode)
/// the context's creation timestamp is used as the start.
///
/// The plugin keeps no per-request state, so requests that are aborted or
/// served from cache leave nothing behind. They are not measured.
#[derive(Debug)]
pub struct PerformancePlugin {
    settings: AdapterSettings,
    recorder: Arc<dyn PerformanceRecorder>,
}

impl PerformancePlugin {
    /// Creates the adapter with priority 5 and the given recorder.
    pub fn new(recorder: Arc<dyn PerformanceRecorder>) -> Self {
        Self {
            settings: AdapterSettings::new("performance", Capability::Performance),
            recorder,
        }
    }

    /// Creates the adapter logging through [`TracingRecorder`].
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingRecorder))
    }

    adapter_builders!();

    fn finish(&self, ctx: &PluginContext, success: bool) {
        let start = ctx
            .attribute::<i64>(STARTED_AT_ATTRIBUTE)
            .and_then(DateTime::<Utc>::from_timestamp_micros)
            .unwrap_or_else(|| ctx.timestamp());
        let elapsed = (Utc::now() - start).to_std().unwrap_or_default();

        self.recorder.record(&Measurement {
            request_id: ctx.request_id(),
            operation: ctx.operation().clone(),
            resource_type: ctx.resource_type().to_string(),
            elapsed,
            success,
        });
    }
}

#[async_trait]
impl Plugin for PerformancePlugin {
    adapter_metadata!();

    async fn before(&self, ctx: &PluginContext) -> Result<PluginResult, PluginError> {
        ctx.set_attribute(STARTED_AT_ATTRIBUTE, Utc::now().timestamp_micros());
        Ok(PluginResult::Continue)
    }

    async fn after(&self, ctx: &PluginContext) -> Result<PluginResult, PluginError> {
        self.finish(ctx, true);
        Ok(PluginResult::Continue)
    }

    async fn on_error(
        &self,
        ctx: &PluginContext,
        _err: &OperationError,
    ) -> Result<PluginResult, PluginError> {
        self.finish(ctx, false);
        Ok(PluginResult::Continue)
    }
}
