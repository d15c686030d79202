//! # director_tasks
//!
//! Asynchronous deployment-task orchestration against a fleet-management
//! director, for use by a service broker.
//!
//! This library provides:
//! - Submission of deploy / recreate / delete operations that returns as soon
//!   as the director accepts the task
//! - Task tracking per deployment, optionally scoped to a context ID shared
//!   by several tasks of one logical operation
//! - Errand exit-code correction for tasks the director reports as `done`
//! - Director version parsing into capability tiers
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────┐   ┌───────────────┐   ┌──────────────┐
//!   │ TaskSubmitter │   │  TaskTracker  │   │ VersionProbe │
//!   └───────┬───────┘   └───────┬───────┘   └──────┬───────┘
//!           │ JobRegistry       │ TaskClassifier   │
//!           ▼                   ▼                  ▼
//!   ┌──────────────────────────────────────────────────────┐
//!   │              Director (trait, HttpDirector)          │
//!   └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Submission Flow
//! 1. Resolve the deployment on the director
//! 2. Run the blocking director call as a background job
//! 3. Return the task id on the first `task_started`, or the first error
//!
//! ## Modules
//! - `director`: director seam, reporters, and the HTTP client
//! - `task`: task types, submitter, tracker, classifier, background jobs
//! - `version`: director version parsing

pub mod config;
pub mod director;
pub mod task;
pub mod util;
pub mod version;

pub use config::Config;
pub use director::{Director, DirectorError};
pub use task::{AsyncTaskReporter, Task, TaskError, TaskState, TaskSubmitter, TaskTracker, Tasks};
pub use version::{Version, VersionType};
