//! Director task records and their derived states.
//!
//! # Invariants
//! - `TaskState` is a pure function of the state string.
//! - `Tasks` keeps the director's ordering; nothing here sorts or deduplicates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const STATE_DONE: &str = "done";
pub const STATE_PROCESSING: &str = "processing";
pub const STATE_QUEUED: &str = "queued";
pub const STATE_CANCELLING: &str = "cancelling";
pub const STATE_CANCELLED: &str = "cancelled";
pub const STATE_ERROR: &str = "error";
pub const STATE_TIMEOUT: &str = "timeout";

/// A director-tracked unit of asynchronous work.
///
/// Only the director creates tasks; this crate reads them and, when
/// classifying, derives a copy carrying the effective state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,

    /// Raw state string as reported by the director
    pub state: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub result: String,

    /// Correlation token, empty when the task was created without one
    #[serde(default, deserialize_with = "null_as_empty")]
    pub context_id: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub deployment: String,

    #[serde(
        default,
        rename = "timestamp",
        with = "chrono::serde::ts_seconds_option"
    )]
    pub started_at: Option<DateTime<Utc>>,
}

// Queued tasks carry `"result": null`, and tasks outside a deployment `"deployment": null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Task {
    pub fn new(id: u64, state: impl Into<String>) -> Self {
        Self {
            id,
            state: state.into(),
            description: String::new(),
            result: String::new(),
            context_id: String::new(),
            deployment: String::new(),
            started_at: None,
        }
    }

    pub fn with_deployment(mut self, deployment: impl Into<String>) -> Self {
        self.deployment = deployment.into();
        self
    }

    pub fn with_context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = context_id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Copy of this task carrying `state` instead of the raw one.
    pub fn with_state(&self, state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            ..self.clone()
        }
    }

    pub fn state_type(&self) -> TaskState {
        TaskState::from_state(&self.state)
    }
}

/// Coarse lifecycle bucket derived from a task's state string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Complete,
    Incomplete,
    Failed,
    Unknown,
}

impl TaskState {
    pub fn from_state(state: &str) -> Self {
        match state {
            STATE_DONE => TaskState::Complete,
            STATE_PROCESSING | STATE_QUEUED | STATE_CANCELLING => TaskState::Incomplete,
            STATE_CANCELLED | STATE_ERROR | STATE_TIMEOUT => TaskState::Failed,
            _ => TaskState::Unknown,
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TaskState::Complete => "complete",
            TaskState::Incomplete => "incomplete",
            TaskState::Failed => "failed",
            TaskState::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Result record of an errand-style task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutput {
    pub exit_code: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

/// Ordered collection of tasks, as the director returned them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tasks(Vec<Task>);

impl Tasks {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self(tasks)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Task> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<Task> {
        self.0
    }

    pub fn incomplete_tasks(&self) -> Tasks {
        self.with_state_type(TaskState::Incomplete)
    }

    pub fn failed_tasks(&self) -> Tasks {
        self.with_state_type(TaskState::Failed)
    }

    pub fn done_tasks(&self) -> Tasks {
        self.with_state_type(TaskState::Complete)
    }

    /// True when every task is complete. An empty collection counts as done.
    pub fn all_tasks_are_done(&self) -> bool {
        self.done_tasks().len() == self.len()
    }

    fn with_state_type(&self, wanted: TaskState) -> Tasks {
        self.0
            .iter()
            .filter(|task| task.state_type() == wanted)
            .cloned()
            .collect()
    }
}

impl FromIterator<Task> for Tasks {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Tasks {
    type Item = Task;
    type IntoIter = std::vec::IntoIter<Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Tasks {
    type Item = &'a Task;
    type IntoIter = std::slice::Iter<'a, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
