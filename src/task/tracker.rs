//! Polling view of director tasks for a deployment.

use std::sync::Arc;

use tracing::debug;

use super::classifier::TaskClassifier;
use super::task::{Task, Tasks};
use super::TaskError;
use crate::director::{Director, TasksFilter};

pub struct TaskTracker {
    director: Arc<dyn Director>,
    classifier: TaskClassifier,
    recent_tasks_limit: usize,
}

impl TaskTracker {
    pub fn new(
        director: Arc<dyn Director>,
        classifier: TaskClassifier,
        recent_tasks_limit: usize,
    ) -> Self {
        Self {
            director,
            classifier,
            recent_tasks_limit,
        }
    }

    /// Recent tasks of `deployment`, each carrying its effective state.
    pub async fn get_tasks(&self, deployment: &str) -> Result<Tasks, TaskError> {
        let filter = TasksFilter {
            all: true,
            deployment: Some(deployment.to_string()),
        };
        let tasks = self
            .director
            .recent_tasks(self.recent_tasks_limit, filter)
            .await
            .map_err(|source| TaskError::ListTasks {
                deployment: deployment.to_string(),
                source,
            })?;
        debug!(deployment, count = tasks.len(), "listed recent tasks");

        self.normalise(deployment, tasks).await
    }

    /// Tasks created under `context_id` for `deployment`.
    ///
    /// Tasks sharing the context ID but belonging to another deployment are
    /// dropped.
    pub async fn get_normalised_tasks_by_context(
        &self,
        deployment: &str,
        context_id: &str,
    ) -> Result<Tasks, TaskError> {
        let tasks = self
            .director
            .find_tasks_by_context_id(context_id)
            .await
            .map_err(|source| TaskError::ListTasksByContext {
                deployment: deployment.to_string(),
                context_id: context_id.to_string(),
                source,
            })?;
        debug!(deployment, context_id, count = tasks.len(), "listed tasks by context");

        self.normalise(deployment, tasks).await
    }

    async fn normalise(&self, deployment: &str, tasks: Vec<Task>) -> Result<Tasks, TaskError> {
        let matching = tasks
            .into_iter()
            .filter(|task| task.deployment == deployment);
        self.classifier.classify_all(matching).await
    }
}
