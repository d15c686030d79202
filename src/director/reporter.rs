//! Callback interface through which a director reports task progress.
//!
//! Director implementations call these from whatever thread or task drives
//! the request, so every method must return promptly.

use thiserror::Error;

use super::cell::CellError;

#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("could not signal {signal} for task {task_id}: {source}")]
    Signal {
        signal: &'static str,
        task_id: u64,
        #[source]
        source: CellError,
    },
}

/// Receives task lifecycle notifications from a director.
pub trait TaskReporter: Send + Sync {
    /// The director accepted the request and created `task_id`.
    fn task_started(&self, task_id: u64) -> Result<(), ReporterError>;

    /// `task_id` reached the terminal `state`.
    fn task_finished(&self, task_id: u64, state: &str) -> Result<(), ReporterError>;

    /// A piece of task output arrived. Chunks may split records arbitrarily.
    fn task_output_chunk(&self, task_id: u64, chunk: &[u8]) -> Result<(), ReporterError>;
}

/// Reporter for calls whose progress nobody is waiting on.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTaskReporter;

impl TaskReporter for NoopTaskReporter {
    fn task_started(&self, _task_id: u64) -> Result<(), ReporterError> {
        Ok(())
    }

    fn task_finished(&self, _task_id: u64, _state: &str) -> Result<(), ReporterError> {
        Ok(())
    }

    fn task_output_chunk(&self, _task_id: u64, _chunk: &[u8]) -> Result<(), ReporterError> {
        Ok(())
    }
}
