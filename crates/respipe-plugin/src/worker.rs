//! Bounded fire-and-forget execution of async-mode hooks.
//!
//! Submission never blocks the caller: each job is spawned immediately and
//! waits for one of `concurrency` permits before running. Runtime worker
//! threads are shared by unrelated requests, so every job runs inside the
//! [`TenantBaton`] captured on the submitting side and sees exactly that
//! tenant, never one left behind by a previous job.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use respipe_core::config::WorkerConfig;
use respipe_core::tenant::TenantBaton;

use crate::guard::panic_message;

/// Fixed-size executor for background plugin hooks.
#[derive(Debug)]
pub struct BackgroundPool {
    /// Limits how many jobs run at once.
    semaphore: Arc<Semaphore>,
    /// Tracks spawned jobs so shutdown can drain them.
    tracker: TaskTracker,
    /// Configured number of permits.
    concurrency: usize,
    /// Cleared once shutdown starts.
    accepting: AtomicBool,
    /// How long shutdown waits for in-flight jobs.
    shutdown_timeout: Duration,
}

impl BackgroundPool {
    /// Creates a pool running at most `concurrency` jobs at once.
    pub fn new(concurrency: usize) -> Self {
        Self::with_timeout(concurrency, Duration::from_secs(30))
    }

    /// Creates a pool with an explicit shutdown drain timeout.
    pub fn with_timeout(concurrency: usize, shutdown_timeout: Duration) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            tracker: TaskTracker::new(),
            concurrency,
            accepting: AtomicBool::new(true),
            shutdown_timeout,
        }
    }

    /// Creates a pool from configuration.
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::with_timeout(
            config.effective_concurrency(),
            Duration::from_secs(config.shutdown_timeout_seconds),
        )
    }

    /// Maximum number of jobs running at once.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Number of submitted jobs that have not finished yet.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Whether the pool still accepts jobs.
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Submits a job under the calling task's tenant.
    pub fn submit<F>(&self, label: &str, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.submit_with_baton(label, TenantBaton::capture(), job)
    }

    /// Submits a job that runs with `baton`'s tenant installed.
    ///
    /// Returns `false` when the pool is shutting down and the job was dropped.
    /// A panicking job is logged and contained.
    pub fn submit_with_baton<F>(&self, label: &str, baton: TenantBaton, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.is_accepting() {
            warn!(job = %label, "Background pool is shut down, dropping job");
            return false;
        }

        let semaphore = Arc::clone(&self.semaphore);
        let label = label.to_string();

        self.tracker.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                warn!(job = %label, "Background pool closed before job started");
                return;
            };

            debug!(job = %label, tenant = ?baton.tenant(), "Running background job");

            if let Err(payload) = AssertUnwindSafe(baton.run(job)).catch_unwind().await {
                error!(
                    job = %label,
                    error = %panic_message(payload.as_ref()),
                    "Background job panicked"
                );
            }
        });

        true
    }

    /// Stops accepting jobs and waits for submitted ones to finish, bounded by
    /// the shutdown timeout. Returns whether every job finished in time.
    pub async fn shutdown(&self) -> bool {
        if self.accepting.swap(false, Ordering::AcqRel) {
            info!(pending = self.pending(), "Draining background pool");
        }

        self.tracker.close();
        let drained = tokio::time::timeout(self.shutdown_timeout, self.tracker.wait())
            .await
            .is_ok();

        if drained {
            info!("Background pool drained");
        } else {
            warn!(
                pending = self.pending(),
                timeout_seconds = self.shutdown_timeout.as_secs(),
                "Background pool shutdown timed out"
            );
        }

        drained
    }
}

impl Default for BackgroundPool {
    fn default() -> Self {
        Self::from_config(&WorkerConfig::default())
    }
}
