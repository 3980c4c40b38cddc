use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::task::FaultCause;

/// Final result of a parallel-for task, observed at `wait`.
#[derive(Debug)]
pub enum Outcome {
    /// Every index in the range was processed.
    Success,
    /// The per-index function failed. `index` is the lowest failing index
    /// observed; outputs may be partially written.
    Failed { index: usize, cause: FaultCause },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn into_result(self) -> Result<(), TaskError> {
        match self {
            Outcome::Success => Ok(()),
            Outcome::Failed { index, cause } => Err(TaskError { index, cause }),
        }
    }
}

/// A per-index fault, as a propagatable error.
#[derive(Debug, thiserror::Error)]
#[error("task failed at index {index}: {cause}")]
pub struct TaskError {
    pub index: usize,
    #[source]
    pub cause: FaultCause,
}

/// Completion bookkeeping shared by the handle and the task's chunks.
///
/// Holds no reference to the per-index function: chunk executors drop their
/// function handle *before* reporting completion, so once `wait` returns
/// the closure (and everything it captured) is gone.
pub(crate) struct TaskSync {
    state: Mutex<TaskProgress>,
    done: Condvar,
    failed: AtomicBool,
}

struct TaskProgress {
    remaining_chunks: usize,
    first_error: Option<(usize, FaultCause)>,
}

impl TaskSync {
    pub(crate) fn new(chunk_count: usize) -> Self {
        Self {
            state: Mutex::new(TaskProgress {
                remaining_chunks: chunk_count,
                first_error: None,
            }),
            done: Condvar::new(),
            failed: AtomicBool::new(false),
        }
    }

    /// True once any chunk has failed. Workers consult this before starting
    /// a queued chunk; set chunks are skipped, never aborted mid-run.
    pub(crate) fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Record one chunk as finished (ran, failed, or was skipped).
    pub(crate) fn complete_chunk(&self, failure: Option<(usize, FaultCause)>) {
        if failure.is_some() {
            self.failed.store(true, Ordering::Release);
        }
        let mut progress = self.lock();
        if let Some((index, cause)) = failure {
            // Lowest failing index wins when several chunks fail.
            let replace = progress
                .first_error
                .as_ref()
                .is_none_or(|(existing, _)| index < *existing);
            if replace {
                progress.first_error = Some((index, cause));
            }
        }
        progress.remaining_chunks -= 1;
        if progress.remaining_chunks == 0 {
            drop(progress);
            self.done.notify_all();
        }
    }

    fn wait_done(&self) -> Option<(usize, FaultCause)> {
        let mut progress = self.lock();
        while progress.remaining_chunks > 0 {
            progress = match self.done.wait(progress) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        progress.first_error.take()
    }

    fn is_done(&self) -> bool {
        self.lock().remaining_chunks == 0
    }

    // Worker panics are caught at chunk boundaries, so a poisoned lock only
    // means a panic mid-bookkeeping; the counters themselves stay coherent.
    fn lock(&self) -> MutexGuard<'_, TaskProgress> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Token for one in-flight parallel-for submission.
///
/// `wait` consumes the handle: a task can be waited on exactly once.
pub struct CompletionHandle {
    sync: Arc<TaskSync>,
}

impl CompletionHandle {
    pub(crate) fn new(sync: Arc<TaskSync>) -> Self {
        Self { sync }
    }

    /// Block until every chunk has finished (ran to completion, failed, or
    /// was skipped after a failure).
    pub fn wait(self) -> Outcome {
        match self.sync.wait_done() {
            Some((index, cause)) => {
                tracing::debug!(index, "task failed");
                Outcome::Failed { index, cause }
            }
            None => Outcome::Success,
        }
    }

    /// Non-blocking probe.
    pub fn is_complete(&self) -> bool {
        self.sync.is_done()
    }
}

impl std::fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("complete", &self.is_complete())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_outcome_into_result() {
        assert!(Outcome::Success.into_result().is_ok());
        assert!(Outcome::Success.is_success());
    }

    #[test]
    fn failed_outcome_carries_index_and_cause() {
        let outcome = Outcome::Failed {
            index: 7,
            cause: "boom".into(),
        };
        let err = outcome.into_result().unwrap_err();
        assert_eq!(err.index, 7);
        assert_eq!(err.to_string(), "task failed at index 7: boom");
    }

    #[test]
    fn zero_chunk_sync_is_immediately_done() {
        let sync = Arc::new(TaskSync::new(0));
        let handle = CompletionHandle::new(sync);
        assert!(handle.is_complete());
        assert!(handle.wait().is_success());
    }

    #[test]
    fn lowest_failing_index_wins() {
        let sync = TaskSync::new(3);
        sync.complete_chunk(Some((20, "late".into())));
        sync.complete_chunk(Some((5, "early".into())));
        sync.complete_chunk(None);
        let (index, cause) = sync.wait_done().expect("must be failed");
        assert_eq!(index, 5);
        assert_eq!(cause.to_string(), "early");
    }
}
