//! Containment of panics raised by plugin hooks and core operations.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::operation::OperationError;
use crate::plugin::PluginError;
use crate::result::PluginResult;

/// Awaits a plugin hook, turning a panic into [`PluginError::Panicked`].
pub(crate) async fn catch_hook<F>(hook: F) -> Result<PluginResult, PluginError>
where
    F: Future<Output = Result<PluginResult, PluginError>>,
{
    match AssertUnwindSafe(hook).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(PluginError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Awaits a fallible operation, turning a panic into
/// [`OperationError::Panicked`].
pub(crate) async fn catch_operation<F, T>(operation: F) -> Result<T, OperationError>
where
    F: Future<Output = Result<T, OperationError>>,
{
    match AssertUnwindSafe(operation).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(OperationError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
