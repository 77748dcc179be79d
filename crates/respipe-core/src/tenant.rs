//! Tenant identity of the request currently being processed.
//!
//! Request infrastructure installs the tenant for the lifetime of a request
//! future with [`with_tenant`]. The value is task-local: it does not leak to
//! other tasks sharing the same runtime worker thread, and it is not
//! inherited by spawned tasks. Work handed to another task must carry a
//! [`TenantBaton`] captured on the submitting side.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

tokio::task_local! {
    static CURRENT_TENANT: Option<TenantId>;
}

/// Identifier of a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Creates a tenant id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Returns the tenant installed for the current task, if any.
pub fn current_tenant() -> Option<TenantId> {
    CURRENT_TENANT.try_with(|t| t.clone()).ok().flatten()
}

/// Runs `fut` with `tenant` installed as the current tenant.
///
/// The previous value is restored when `fut` completes, panics or is dropped.
pub async fn with_tenant<F>(tenant: Option<TenantId>, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_TENANT.scope(tenant, fut).await
}

/// Synchronous counterpart of [`with_tenant`].
pub fn sync_with_tenant<R>(tenant: Option<TenantId>, f: impl FnOnce() -> R) -> R {
    CURRENT_TENANT.sync_scope(tenant, f)
}

/// Snapshot of the submitting task's tenant, handed to background work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantBaton {
    tenant: Option<TenantId>,
}

impl TenantBaton {
    /// Captures the tenant of the calling task.
    pub fn capture() -> Self {
        Self {
            tenant: current_tenant(),
        }
    }

    /// The captured tenant.
    pub fn tenant(&self) -> Option<&TenantId> {
        self.tenant.as_ref()
    }

    /// Runs `fut` with the captured tenant installed. An empty baton installs
    /// "no tenant" rather than leaving whatever the executing task had.
    pub async fn run<F>(self, fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_TENANT.scope(self.tenant, fut).await
    }
}
