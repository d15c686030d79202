//! Reporters that turn director callbacks into something request code can await.

use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::task::TaskOutput;
use super::TaskError;
use crate::director::cell::{CellError, CompletionCell};
use crate::director::{ReporterError, TaskReporter};
use crate::util::truncate_for_log;

/// Single-use handshake between one submission and the director call it starts.
///
/// Holds three completion cells: the started task id, the submission error,
/// and the finished task id. Writers never block; a second write to the same
/// cell fails with `CellError::AlreadyCompleted`.
#[derive(Debug, Default)]
pub struct AsyncTaskReporter {
    started: CompletionCell<u64>,
    error: CompletionCell<TaskError>,
    finished: CompletionCell<u64>,
    finished_state: Mutex<Option<String>>,
}

impl AsyncTaskReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the error that ends this submission.
    pub fn report_error(&self, err: TaskError) -> Result<(), CellError> {
        self.error.complete(err)
    }

    pub fn take_started_receiver(&self) -> Result<oneshot::Receiver<u64>, CellError> {
        self.started.take_receiver()
    }

    pub fn take_error_receiver(&self) -> Result<oneshot::Receiver<TaskError>, CellError> {
        self.error.take_receiver()
    }

    pub fn take_finished_receiver(&self) -> Result<oneshot::Receiver<u64>, CellError> {
        self.finished.take_receiver()
    }

    pub fn is_started(&self) -> bool {
        self.started.is_completed()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_completed()
    }

    /// Terminal state recorded by `task_finished`, if it has fired.
    pub fn finished_state(&self) -> Option<String> {
        self.finished_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TaskReporter for AsyncTaskReporter {
    fn task_started(&self, task_id: u64) -> Result<(), ReporterError> {
        debug!(task_id, "director task started");
        match self.started.complete(task_id) {
            // Nobody waiting any more is fine; the submission already returned.
            Ok(()) | Err(CellError::ReceiverDropped) => Ok(()),
            Err(source) => Err(ReporterError::Signal {
                signal: "task started",
                task_id,
                source,
            }),
        }
    }

    fn task_finished(&self, task_id: u64, state: &str) -> Result<(), ReporterError> {
        debug!(task_id, state, "director task finished");
        *self
            .finished_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(state.to_string());
        match self.finished.complete(task_id) {
            Ok(()) | Err(CellError::ReceiverDropped) => Ok(()),
            Err(source) => Err(ReporterError::Signal {
                signal: "task finished",
                task_id,
                source,
            }),
        }
    }

    fn task_output_chunk(&self, _task_id: u64, _chunk: &[u8]) -> Result<(), ReporterError> {
        Ok(())
    }
}

/// Collects the newline-delimited JSON result output of an errand task.
///
/// Records may be split across chunks. Lines that are not a valid
/// `TaskOutput` are logged and skipped; the last valid record wins.
#[derive(Debug, Default)]
pub struct TaskOutputCollector {
    state: Mutex<CollectorState>,
}

#[derive(Debug, Default)]
struct CollectorState {
    buffer: Vec<u8>,
    output: Option<TaskOutput>,
}

impl CollectorState {
    fn parse_line(&mut self, task_id: u64, line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match serde_json::from_str::<TaskOutput>(text) {
            Ok(output) => self.output = Some(output),
            Err(e) => warn!(
                task_id,
                "Unexpected task output: {} - line: {}",
                e,
                truncate_for_log(text, 200)
            ),
        }
    }
}

impl TaskOutputCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse whatever is still buffered and return the collected record.
    pub fn finish(&self, task_id: u64) -> Option<TaskOutput> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let rest = std::mem::take(&mut state.buffer);
        state.parse_line(task_id, &rest);
        state.output.clone()
    }
}

impl TaskReporter for TaskOutputCollector {
    fn task_started(&self, _task_id: u64) -> Result<(), ReporterError> {
        Ok(())
    }

    fn task_finished(&self, _task_id: u64, _state: &str) -> Result<(), ReporterError> {
        Ok(())
    }

    fn task_output_chunk(&self, task_id: u64, chunk: &[u8]) -> Result<(), ReporterError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.buffer.extend_from_slice(chunk);
        while let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = state.buffer.drain(..=pos).collect();
            state.parse_line(task_id, &line);
        }
        Ok(())
    }
}
