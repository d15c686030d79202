//! Seam to the remote fleet-management director.
//!
//! The director owns deployments and tasks. Mutating deployment calls block
//! until the director-side task finishes and report progress through the
//! `TaskReporter` carried in their `TaskContext`.

pub mod cell;
mod error;
#[cfg(test)]
pub(crate) mod fake;
pub mod http;
pub mod reporter;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::task::Task;

pub use error::DirectorError;
pub use reporter::{NoopTaskReporter, ReporterError, TaskReporter};

/// Self-description returned by the director's info endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectorInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uuid: String,
    pub version: String,
}

/// Server-side filter for recent task listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TasksFilter {
    /// Include tasks of every type, not only deployment-affecting ones.
    pub all: bool,
    pub deployment: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOpts {
    pub recreate: bool,
    pub fix: bool,
    pub skip_drain: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecreateOpts {
    pub fix: bool,
    pub skip_drain: bool,
    pub dry_run: bool,
}

/// Per-call context for mutating deployment operations.
#[derive(Clone)]
pub struct TaskContext {
    /// Correlation token attached to the task the call creates.
    pub context_id: Option<String>,
    pub reporter: Arc<dyn TaskReporter>,
}

impl TaskContext {
    pub fn new(context_id: Option<String>, reporter: Arc<dyn TaskReporter>) -> Self {
        Self {
            context_id,
            reporter,
        }
    }
}

#[async_trait]
pub trait Director: Send + Sync {
    async fn info(&self) -> Result<DirectorInfo, DirectorError>;

    /// Resolve a deployment handle. Fails with `DirectorError::DeploymentNotFound`
    /// when the director does not know `name`.
    async fn find_deployment(&self, name: &str) -> Result<Arc<dyn Deployment>, DirectorError>;

    async fn recent_tasks(
        &self,
        limit: usize,
        filter: TasksFilter,
    ) -> Result<Vec<Task>, DirectorError>;

    async fn find_tasks_by_context_id(&self, context_id: &str) -> Result<Vec<Task>, DirectorError>;

    /// Stream the result output of `task_id` into `reporter` chunk by chunk.
    async fn task_result_output(
        &self,
        task_id: u64,
        reporter: &dyn TaskReporter,
    ) -> Result<(), DirectorError>;
}

/// Handle on one deployment. Every mutating call returns only once the
/// director-side task has finished.
#[async_trait]
pub trait Deployment: Send + Sync {
    fn name(&self) -> &str;

    async fn update(
        &self,
        manifest: &str,
        opts: UpdateOpts,
        ctx: TaskContext,
    ) -> Result<(), DirectorError>;

    async fn recreate(&self, opts: RecreateOpts, ctx: TaskContext) -> Result<(), DirectorError>;

    async fn delete(&self, force: bool, ctx: TaskContext) -> Result<(), DirectorError>;
}
