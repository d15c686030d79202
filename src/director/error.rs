//! Errors raised by director implementations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectorError {
    /// The named deployment does not exist on the director.
    #[error("deployment '{0}' not found")]
    DeploymentNotFound(String),

    #[error("task {0} not found")]
    TaskNotFound(u64),

    /// The director answered with a non-success status.
    #[error("director responded {status}: {body}")]
    Api { status: u16, body: String },

    /// The request never got a usable response.
    #[error("director request failed: {0}")]
    Transport(String),

    #[error("unexpected director response: {0}")]
    UnexpectedResponse(String),

    /// A director task reached a terminal state other than `done`.
    #[error("task {task_id} finished in state '{state}'")]
    TaskFailed { task_id: u64, state: String },
}

impl DirectorError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DirectorError::DeploymentNotFound(_) | DirectorError::TaskNotFound(_)
        )
    }
}

impl From<reqwest::Error> for DirectorError {
    fn from(err: reqwest::Error) -> Self {
        DirectorError::Transport(err.to_string())
    }
}
