//! Single-use completion cell.
//!
//! A `CompletionCell` carries exactly one value from one writer to one reader.
//! Both ends are claimed at most once: a second write or a second reader fails
//! immediately instead of blocking.

use std::sync::Mutex;

use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CellError {
    #[error("completion cell was already completed")]
    AlreadyCompleted,

    #[error("completion cell receiver was already taken")]
    AlreadyTaken,

    #[error("completion cell receiver was dropped before the value arrived")]
    ReceiverDropped,
}

/// One-shot value slot with enforced single-writer / single-reader use.
#[derive(Debug)]
pub struct CompletionCell<T> {
    sender: Mutex<Option<oneshot::Sender<T>>>,
    receiver: Mutex<Option<oneshot::Receiver<T>>>,
}

impl<T> CompletionCell<T> {
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
        }
    }

    /// Publish the value. Never blocks.
    ///
    /// The write slot is consumed even when the reader is gone, so a second
    /// call always reports `AlreadyCompleted`.
    pub fn complete(&self, value: T) -> Result<(), CellError> {
        let sender = lock(&self.sender).take().ok_or(CellError::AlreadyCompleted)?;
        sender.send(value).map_err(|_| CellError::ReceiverDropped)
    }

    /// Claim the read end.
    pub fn take_receiver(&self) -> Result<oneshot::Receiver<T>, CellError> {
        lock(&self.receiver).take().ok_or(CellError::AlreadyTaken)
    }

    pub fn is_completed(&self) -> bool {
        lock(&self.sender).is_none()
    }
}

impl<T> Default for CompletionCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

// Poisoning only happens if a holder panicked mid-`take`; the Option is still valid.
fn lock<V>(mutex: &Mutex<V>) -> std::sync::MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
