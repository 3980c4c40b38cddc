use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::buffer::ScratchBuffer;

/// Errors from scratch allocation and release.
#[derive(Debug, thiserror::Error)]
pub enum ScratchError {
    #[error("scratch budget exhausted: requested {requested} bytes, {available} available")]
    BudgetExhausted { requested: usize, available: usize },
    #[error("scratch allocation overflows: {len} elements of {elem_size} bytes each")]
    SizeOverflow { len: usize, elem_size: usize },
    #[error("scratch buffer (tag {tag}) already released")]
    UseAfterRelease { tag: u64 },
}

/// Byte accounting shared between an arena and its live buffers.
pub(crate) struct ArenaShared {
    capacity: usize,
    in_use: AtomicUsize,
    next_tag: AtomicU64,
}

impl ArenaShared {
    /// Return `bytes` to the budget. Called on explicit release and by the
    /// buffer's drop backstop.
    pub(crate) fn credit(&self, bytes: usize) {
        self.in_use.fetch_sub(bytes, Ordering::AcqRel);
    }

    fn reserve(&self, bytes: usize) -> Result<(), ScratchError> {
        let mut current = self.in_use.load(Ordering::Relaxed);
        loop {
            let next = match current.checked_add(bytes) {
                Some(n) if n <= self.capacity => n,
                _ => {
                    return Err(ScratchError::BudgetExhausted {
                        requested: bytes,
                        available: self.capacity.saturating_sub(current),
                    });
                }
            };
            match self.in_use.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(()),
                Err(observed) => current = observed,
            }
        }
    }
}

/// Allocates and releases fixed-length scratch buffers for single jobs.
///
/// `new()` gives an unbounded arena; `with_capacity(bytes)` enforces a byte
/// budget across all live buffers. Each buffer carries a monotonically
/// increasing tag used in release errors and debug assertions.
pub struct ScratchArena {
    shared: Arc<ArenaShared>,
}

impl ScratchArena {
    pub fn new() -> Self {
        Self::with_capacity(usize::MAX)
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            shared: Arc::new(ArenaShared {
                capacity: bytes,
                in_use: AtomicUsize::new(0),
                next_tag: AtomicU64::new(0),
            }),
        }
    }

    /// Allocate a default-initialized buffer of exactly `len` elements.
    pub fn allocate<T: Copy + Default + Send>(
        &self,
        len: usize,
    ) -> Result<ScratchBuffer<T>, ScratchError> {
        let elem_size = size_of::<T>();
        let bytes = len
            .checked_mul(elem_size)
            .ok_or(ScratchError::SizeOverflow { len, elem_size })?;
        self.shared.reserve(bytes)?;

        let tag = self.shared.next_tag.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(tag, len, bytes, "scratch allocate");
        Ok(ScratchBuffer::new(
            len,
            bytes,
            tag,
            Arc::downgrade(&self.shared),
        ))
    }

    /// Invalidate `buffer` and return its bytes to the budget.
    ///
    /// Clones of the handle become unusable; in debug builds any further
    /// access asserts. Releasing twice reports `UseAfterRelease`.
    pub fn release<T>(&self, buffer: ScratchBuffer<T>) -> Result<(), ScratchError> {
        tracing::trace!(tag = buffer.tag(), "scratch release");
        buffer.mark_released()
    }

    /// Bytes currently held by live buffers.
    pub fn bytes_in_use(&self) -> usize {
        self.shared.in_use.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

impl Default for ScratchArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_tracks_bytes() {
        let arena = ScratchArena::with_capacity(1024);
        let buf = arena.allocate::<u64>(16).unwrap();
        assert_eq!(arena.bytes_in_use(), 128);
        arena.release(buf).unwrap();
        assert_eq!(arena.bytes_in_use(), 0);
    }

    #[test]
    fn budget_exhausted_reports_available() {
        let arena = ScratchArena::with_capacity(100);
        let _held = arena.allocate::<u8>(60).unwrap();
        let err = arena.allocate::<u8>(60).unwrap_err();
        match err {
            ScratchError::BudgetExhausted {
                requested,
                available,
            } => {
                assert_eq!(requested, 60);
                assert_eq!(available, 40);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn size_overflow_rejected() {
        let arena = ScratchArena::new();
        let err = arena.allocate::<u64>(usize::MAX).unwrap_err();
        assert!(matches!(err, ScratchError::SizeOverflow { .. }));
    }

    #[test]
    fn zero_length_allocation_is_fine() {
        let arena = ScratchArena::with_capacity(0);
        let buf = arena.allocate::<i64>(0).unwrap();
        assert_eq!(buf.len(), 0);
        arena.release(buf).unwrap();
    }

    #[test]
    fn double_release_is_an_error() {
        let arena = ScratchArena::new();
        let buf = arena.allocate::<i32>(4).unwrap();
        let clone = buf.clone();
        arena.release(buf).unwrap();
        let err = arena.release(clone).unwrap_err();
        assert!(matches!(err, ScratchError::UseAfterRelease { tag: 0 }));
    }

    #[test]
    fn drop_without_release_returns_budget() {
        let arena = ScratchArena::with_capacity(64);
        {
            let _buf = arena.allocate::<u8>(64).unwrap();
            assert_eq!(arena.bytes_in_use(), 64);
        }
        assert_eq!(arena.bytes_in_use(), 0);
    }

    #[test]
    fn tags_are_unique_per_arena() {
        let arena = ScratchArena::new();
        let a = arena.allocate::<u8>(1).unwrap();
        let b = arena.allocate::<u8>(1).unwrap();
        assert_ne!(a.tag(), b.tag());
    }
}
