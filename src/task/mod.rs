//! Task module - submission, tracking, and classification of director tasks.
//!
//! - `submitter` starts deployment-affecting operations and returns once the
//!   director has accepted them
//! - `tracker` lists tasks for a deployment, optionally scoped to a context ID
//! - `classifier` derives the effective state of each task
//! - `jobs` supervises the background calls a submission leaves running

pub mod classifier;
pub mod jobs;
pub mod reporter;
pub mod submitter;
pub mod task;
pub mod tracker;

use thiserror::Error;

use crate::director::cell::CellError;
use crate::director::DirectorError;

pub use classifier::{reinterpret_errand_state, ClassifierOptions, TaskClassifier};
pub use jobs::{JobId, JobInfo, JobRegistry};
pub use reporter::{AsyncTaskReporter, TaskOutputCollector};
pub use submitter::TaskSubmitter;
pub use task::{Task, TaskOutput, TaskState, Tasks};
pub use tracker::TaskTracker;

/// Deployment-affecting operation submitted to the director.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Deploy,
    Recreate,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self {
            Operation::Deploy => "update",
            Operation::Recreate => "recreate",
            Operation::Delete => "delete",
        };
        f.write_str(verb)
    }
}

/// Errors surfaced by task submission and tracking.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("deployment '{deployment}' not found")]
    DeploymentNotFound { deployment: String },

    #[error("could not find deployment '{deployment}': {source}")]
    FindDeployment {
        deployment: String,
        #[source]
        source: DirectorError,
    },

    #[error("could not {operation} deployment '{deployment}': {source}")]
    Operation {
        operation: Operation,
        deployment: String,
        #[source]
        source: DirectorError,
    },

    #[error("could not {operation} deployment '{deployment}': director finished without starting a task")]
    NoTaskStarted {
        operation: Operation,
        deployment: String,
    },

    #[error("{operation} of deployment '{deployment}' was cancelled")]
    Cancelled {
        operation: Operation,
        deployment: String,
    },

    #[error("could not get tasks for deployment '{deployment}': {source}")]
    ListTasks {
        deployment: String,
        #[source]
        source: DirectorError,
    },

    #[error("could not get tasks for deployment '{deployment}' with context '{context_id}': {source}")]
    ListTasksByContext {
        deployment: String,
        context_id: String,
        #[source]
        source: DirectorError,
    },

    #[error("could not fetch output of task {task_id}: {source}")]
    TaskOutput {
        task_id: u64,
        #[source]
        source: DirectorError,
    },

    #[error("task reporter cannot be reused: {0}")]
    ReporterReused(#[source] CellError),
}
