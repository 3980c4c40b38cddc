//! Scratch buffers: fixed-length, task-scoped numeric storage.
//!
//! An arena hands out buffers for the duration of one job and takes them
//! back when the caller is done. Buffers are shared handles so the same
//! storage can be captured by a task closure and read by the caller after
//! the job's completion handle is waited on.
//!
//! # Invariants
//! - A buffer never resizes; its length is fixed at allocation.
//! - A buffer must not outlive its owning task's scope; release it after
//!   waiting on the task.
//! - Output slots follow the partitioned-write discipline: during a job,
//!   slot `i` is written only by the chunk that owns index `i`.

mod arena;
mod buffer;

pub use arena::{ScratchArena, ScratchError};
pub use buffer::ScratchBuffer;

pub fn crate_info() -> &'static str {
    "jobspace-scratch v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("scratch"));
    }
}
