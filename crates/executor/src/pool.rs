use std::cell::Cell;
use std::ops::Range;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::handle::{CompletionHandle, TaskSync};
use crate::task::{FaultCause, ParallelFor, SubmitError};

/// Pool configuration. Loadable from JSON by host applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Number of worker threads. Clamped to at least 1.
    pub workers: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let workers = thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Self { workers }
    }
}

type IndexFn = dyn Fn(usize) -> Result<(), FaultCause> + Send + Sync;

struct Chunk {
    body: Arc<IndexFn>,
    sync: Arc<TaskSync>,
    range: Range<usize>,
}

/// Fixed pool of workers pulling chunks from a shared queue.
///
/// `submit` is non-blocking; the only blocking point is
/// [`CompletionHandle::wait`]. Dropping the executor closes the queue,
/// lets workers drain in-flight chunks, and joins them.
pub struct Executor {
    queue: Option<Sender<Chunk>>,
    workers: Vec<JoinHandle<()>>,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> std::io::Result<Self> {
        let (queue, feed) = crossbeam_channel::unbounded::<Chunk>();
        let count = config.workers.max(1);
        let mut workers = Vec::with_capacity(count);
        for id in 0..count {
            let feed = feed.clone();
            let handle = thread::Builder::new()
                .name(format!("jobspace-worker-{id}"))
                .spawn(move || worker_loop(id, feed))?;
            workers.push(handle);
        }
        tracing::debug!(workers = count, "executor started");
        Ok(Self {
            queue: Some(queue),
            workers,
        })
    }

    /// Submit a per-index function over the descriptor's range.
    ///
    /// Returns immediately with a handle; an empty range yields an
    /// already-complete handle and queues nothing.
    pub fn submit<F>(&self, desc: ParallelFor, func: F) -> Result<CompletionHandle, SubmitError>
    where
        F: Fn(usize) -> Result<(), FaultCause> + Send + Sync + 'static,
    {
        let _span = tracing::debug_span!(
            "submit",
            len = desc.len(),
            granularity = desc.granularity()
        )
        .entered();

        let queue = self.queue.as_ref().ok_or(SubmitError::Shutdown)?;
        let sync = Arc::new(TaskSync::new(desc.chunk_count()));
        let body: Arc<IndexFn> = Arc::new(func);
        for range in desc.chunks() {
            queue
                .send(Chunk {
                    body: Arc::clone(&body),
                    sync: Arc::clone(&sync),
                    range,
                })
                .map_err(|_| SubmitError::Shutdown)?;
        }
        Ok(CompletionHandle::new(sync))
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        // Closing the queue ends each worker's receive loop once drained.
        self.queue.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(worker: usize, feed: Receiver<Chunk>) {
    tracing::debug!(worker, "worker started");
    for chunk in feed.iter() {
        run_chunk(chunk);
    }
    tracing::debug!(worker, "worker stopped");
}

fn run_chunk(chunk: Chunk) {
    let Chunk { body, sync, range } = chunk;
    let mut failure = None;
    // Skip chunks of an already-failed task; never abort a chunk mid-run.
    if !sync.is_failed() {
        let progress = Cell::new(range.start);
        let result = catch_unwind(AssertUnwindSafe(|| {
            for index in range.clone() {
                progress.set(index);
                (*body)(index).map_err(|cause| (index, cause))?;
            }
            Ok(())
        }));
        failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(fault)) => Some(fault),
            Err(payload) => Some((progress.get(), panic_cause(payload))),
        };
    }
    // Release the function (and its captures) before completion becomes
    // observable at `wait`.
    drop(body);
    sync.complete_chunk(failure);
}

fn panic_cause(payload: Box<dyn std::any::Any + Send>) -> FaultCause {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "per-index function panicked".to_string()
    };
    message.into()
}
