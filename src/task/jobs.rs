//! Supervised background jobs.
//!
//! A submission returns as soon as the director accepts its task, but the
//! director call that created the task keeps running until the task ends.
//! Those calls run here as registered jobs that can be listed and cancelled.
//! A job removes itself from the registry when it ends, however it ends.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::Operation;

/// Identifier of a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct JobId(Uuid);

impl JobId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of a running job.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: JobId,
    pub operation: Operation,
    pub deployment: String,
    /// Director task the job started, once reported
    pub task_id: Option<u64>,
    pub started_at: DateTime<Utc>,
}

struct JobEntry {
    info: JobInfo,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Inner {
    jobs: Mutex<HashMap<JobId, JobEntry>>,
    changed: Notify,
}

impl Inner {
    fn jobs(&self) -> MutexGuard<'_, HashMap<JobId, JobEntry>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Deregisters a job when its future completes, panics, or is dropped.
struct JobGuard {
    inner: Arc<Inner>,
    id: JobId,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if let Some(entry) = self.inner.jobs().remove(&self.id) {
            debug!(
                job_id = %self.id,
                deployment = %entry.info.deployment,
                "background job ended"
            );
        }
        self.inner.changed.notify_waiters();
    }
}

/// Registry of running background jobs. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<Inner>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job and run the future built by `work` on the runtime.
    ///
    /// `work` receives the job's cancellation token and is expected to stop
    /// once it fires.
    pub fn spawn<W, F>(&self, operation: Operation, deployment: &str, work: W) -> JobId
    where
        W: FnOnce(CancellationToken) -> F,
        F: Future<Output = ()> + Send + 'static,
    {
        let id = JobId::new();
        let cancel = CancellationToken::new();
        self.inner.jobs().insert(
            id,
            JobEntry {
                info: JobInfo {
                    id,
                    operation,
                    deployment: deployment.to_string(),
                    task_id: None,
                    started_at: Utc::now(),
                },
                cancel: cancel.clone(),
            },
        );

        let guard = JobGuard {
            inner: self.inner.clone(),
            id,
        };
        let fut = work(cancel);
        tokio::spawn(async move {
            let _guard = guard;
            fut.await;
        });

        debug!(job_id = %id, deployment, %operation, "background job registered");
        id
    }

    /// Attach the director task id a job started.
    pub fn record_task(&self, id: JobId, task_id: u64) {
        if let Some(entry) = self.inner.jobs().get_mut(&id) {
            entry.info.task_id = Some(task_id);
        }
    }

    /// Cancel one job. Returns false if it is no longer running.
    pub fn cancel(&self, id: JobId) -> bool {
        match self.inner.jobs().get(&id) {
            Some(entry) => {
                info!(job_id = %id, deployment = %entry.info.deployment, "cancelling background job");
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every running job, returning how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let jobs = self.inner.jobs();
        for entry in jobs.values() {
            entry.cancel.cancel();
        }
        if !jobs.is_empty() {
            info!(count = jobs.len(), "cancelled all background jobs");
        }
        jobs.len()
    }

    pub fn get(&self, id: JobId) -> Option<JobInfo> {
        self.inner.jobs().get(&id).map(|entry| entry.info.clone())
    }

    /// Running jobs, oldest first.
    pub fn list(&self) -> Vec<JobInfo> {
        let mut jobs: Vec<_> = self
            .inner
            .jobs()
            .values()
            .map(|entry| entry.info.clone())
            .collect();
        jobs.sort_by_key(|job| job.started_at);
        jobs
    }

    pub fn len(&self) -> usize {
        self.inner.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until no jobs are running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_empty() {
                return;
            }
            notified.await;
        }
    }
}
