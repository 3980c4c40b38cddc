//! Parallel-for executor: runs a per-index function over `[0, N)` by
//! splitting the range into chunks and distributing them across a fixed
//! pool of worker threads.
//!
//! # Invariants
//! - Each index in `[0, N)` is visited exactly once per submission (absent
//!   failure), in ascending order within a chunk.
//! - No two concurrently executing chunks overlap, so per-index writes are
//!   race-free by partitioning alone ... "partition, don't synchronize".
//! - A single-chunk submission (granularity = N) is observably identical to
//!   a fully split one (granularity = 1) for any pure per-index function.
//! - After the first failure, no new chunk starts; chunks already picked up
//!   run to completion, and the lowest failing index is reported at wait.

mod handle;
mod pool;
mod task;

pub use handle::{CompletionHandle, Outcome, TaskError};
pub use pool::{Executor, ExecutorConfig};
pub use task::{FaultCause, ParallelFor, SubmitError};

pub fn crate_info() -> &'static str {
    "jobspace-executor v0.1.0"
}
