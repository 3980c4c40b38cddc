use std::ops::Range;

/// Cause of a per-index failure, surfaced in the task outcome.
pub type FaultCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors reported synchronously by `submit`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("granularity must be at least 1")]
    ZeroGranularity,
    #[error("executor is shut down")]
    Shutdown,
}

/// Describes one parallel-for submission: the index range `[0, len)` and
/// the granularity (indices per chunk, at least 1).
///
/// Buffers and target sets a task touches are captured by its closure;
/// the descriptor carries only the shape of the work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelFor {
    len: usize,
    granularity: usize,
}

impl ParallelFor {
    pub fn new(len: usize, granularity: usize) -> Result<Self, SubmitError> {
        if granularity == 0 {
            return Err(SubmitError::ZeroGranularity);
        }
        Ok(Self { len, granularity })
    }

    /// A single-chunk descriptor: the degenerate serial mode.
    pub fn single_chunk(len: usize) -> Self {
        Self {
            len,
            granularity: len.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn granularity(&self) -> usize {
        self.granularity
    }

    /// `ceil(len / granularity)`.
    pub fn chunk_count(&self) -> usize {
        self.len.div_ceil(self.granularity)
    }

    /// Contiguous chunks covering `[0, len)`; only the last may be shorter
    /// than the granularity.
    pub fn chunks(&self) -> impl Iterator<Item = Range<usize>> {
        let len = self.len;
        let granularity = self.granularity;
        (0..self.chunk_count()).map(move |c| {
            let start = c * granularity;
            start..(start + granularity).min(len)
        })
    }
}
