//! Effective task state, including the errand exit-code correction.
//!
//! The director reports errand tasks as `done` whatever the errand's own exit
//! code was. When the correction is enabled, `done` tasks have their result
//! output fetched and a non-zero exit code turns the state into `error`.

use std::sync::Arc;

use tracing::debug;

use super::reporter::TaskOutputCollector;
use super::task::{Task, TaskOutput, Tasks, STATE_DONE, STATE_ERROR};
use super::TaskError;
use crate::director::Director;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierOptions {
    /// Fetch output of `done` tasks and downgrade failed errands to `error`.
    pub errand_exit_code_correction: bool,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            errand_exit_code_correction: true,
        }
    }
}

/// Downgrade `done` to `error` when the errand exited non-zero.
///
/// Only ever moves `done` to `error`; every other state passes through.
pub fn reinterpret_errand_state<'a>(state: &'a str, output: Option<&TaskOutput>) -> &'a str {
    match output {
        Some(output) if state == STATE_DONE && output.exit_code != 0 => STATE_ERROR,
        _ => state,
    }
}

#[derive(Clone)]
pub struct TaskClassifier {
    director: Arc<dyn Director>,
    options: ClassifierOptions,
}

impl TaskClassifier {
    pub fn new(director: Arc<dyn Director>, options: ClassifierOptions) -> Self {
        Self { director, options }
    }

    pub fn options(&self) -> ClassifierOptions {
        self.options
    }

    /// Return a copy of `task` carrying its effective state.
    pub async fn classify(&self, task: &Task) -> Result<Task, TaskError> {
        if !self.options.errand_exit_code_correction || task.state != STATE_DONE {
            return Ok(task.clone());
        }

        let output = self.fetch_output(task.id).await?;
        let state = reinterpret_errand_state(&task.state, output.as_ref());
        if state != task.state {
            debug!(
                task_id = task.id,
                exit_code = output.as_ref().map(|o| o.exit_code),
                "errand task reported done with non-zero exit code, treating as {}",
                state
            );
        }
        Ok(task.with_state(state))
    }

    /// Classify every task, keeping order. The first failure aborts the batch.
    pub async fn classify_all<I>(&self, tasks: I) -> Result<Tasks, TaskError>
    where
        I: IntoIterator<Item = Task>,
    {
        let mut classified = Vec::new();
        for task in tasks {
            classified.push(self.classify(&task).await?);
        }
        Ok(Tasks::new(classified))
    }

    async fn fetch_output(&self, task_id: u64) -> Result<Option<TaskOutput>, TaskError> {
        let collector = TaskOutputCollector::new();
        self.director
            .task_result_output(task_id, &collector)
            .await
            .map_err(|source| TaskError::TaskOutput { task_id, source })?;
        Ok(collector.finish(task_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::director::fake::FakeDirector;
    use crate::task::TaskState;

    fn classifier(director: FakeDirector, correction: bool) -> (Arc<FakeDirector>, TaskClassifier) {
        let director = Arc::new(director);
        let classifier = TaskClassifier::new(
            director.clone(),
            ClassifierOptions {
                errand_exit_code_correction: correction,
            },
        );
        (director, classifier)
    }

    #[test]
    fn adapter_only_downgrades_done() {
        let failed = TaskOutput {
            exit_code: 1,
            ..TaskOutput::default()
        };
        let passed = TaskOutput::default();

        assert_eq!(reinterpret_errand_state("done", Some(&failed)), "error");
        assert_eq!(reinterpret_errand_state("done", Some(&passed)), "done");
        assert_eq!(reinterpret_errand_state("done", None), "done");
        assert_eq!(reinterpret_errand_state("error", Some(&passed)), "error");
        assert_eq!(reinterpret_errand_state("processing", Some(&failed)), "processing");
    }

    #[tokio::test]
    async fn done_with_zero_exit_code_stays_complete() {
        let (_, classifier) = classifier(
            FakeDirector::new().with_output(1, &[br#"{"exit_code":0}"#]),
            true,
        );
        let task = classifier.classify(&Task::new(1, "done")).await.unwrap();
        assert_eq!(task.state, "done");
        assert_eq!(task.state_type(), TaskState::Complete);
    }

    #[tokio::test]
    async fn done_with_non_zero_exit_code_becomes_failed() {
        let (_, classifier) = classifier(
            FakeDirector::new().with_output(2, &[b"{\"exit_code\":1,\"stderr\":\"boom\"}\n"]),
            true,
        );
        let task = classifier.classify(&Task::new(2, "done")).await.unwrap();
        assert_eq!(task.state, "error");
        assert_eq!(task.state_type(), TaskState::Failed);
    }

    #[tokio::test]
    async fn non_done_states_skip_the_output_fetch() {
        let (director, classifier) = classifier(FakeDirector::new(), true);
        for state in ["processing", "queued", "error", "timeout", "cancelled"] {
            let task = classifier.classify(&Task::new(3, state)).await.unwrap();
            assert_eq!(task.state, state);
        }
        assert!(director.output_calls().is_empty());
    }

    #[tokio::test]
    async fn non_errand_output_is_treated_as_done() {
        let (_, classifier) = classifier(
            FakeDirector::new().with_output(4, &[b"/deployments/redis"]),
            true,
        );
        let task = classifier.classify(&Task::new(4, "done")).await.unwrap();
        assert_eq!(task.state, "done");
    }

    #[tokio::test]
    async fn disabled_correction_trusts_the_director() {
        let (director, classifier) = classifier(
            FakeDirector::new().with_output(5, &[br#"{"exit_code":3}"#]),
            false,
        );
        let task = classifier.classify(&Task::new(5, "done")).await.unwrap();
        assert_eq!(task.state, "done");
        assert!(director.output_calls().is_empty());
    }

    #[tokio::test]
    async fn output_fetch_failure_is_an_error() {
        let mut director = FakeDirector::new();
        director.output_error_for = Some(6);
        let (_, classifier) = classifier(director, true);
        let err = classifier.classify(&Task::new(6, "done")).await.unwrap_err();
        assert!(matches!(err, TaskError::TaskOutput { task_id: 6, .. }));
    }

    #[tokio::test]
    async fn classification_is_idempotent() {
        let (_, classifier) = classifier(
            FakeDirector::new().with_output(7, &[br#"{"exit_code":0}"#]),
            true,
        );
        let raw = Task::new(7, "done");
        let first = classifier.classify(&raw).await.unwrap();
        let second = classifier.classify(&first).await.unwrap();
        assert_eq!(first, second);
    }
}
