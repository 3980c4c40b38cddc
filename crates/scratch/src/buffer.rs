use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::arena::{ArenaShared, ScratchError};

struct BufferInner<T> {
    cells: Box<[UnsafeCell<T>]>,
    released: AtomicBool,
    tag: u64,
    bytes: usize,
    arena: Weak<ArenaShared>,
}

// Slots are written through `&self` under the partitioned-write discipline:
// during a job, each index is touched by exactly one chunk, so distinct
// indices never alias. The buffer itself holds no references into the cells.
unsafe impl<T: Send> Send for BufferInner<T> {}
unsafe impl<T: Send> Sync for BufferInner<T> {}

impl<T> Drop for BufferInner<T> {
    fn drop(&mut self) {
        // Backstop for buffers dropped without an explicit release.
        if !self.released.load(Ordering::Acquire)
            && let Some(arena) = self.arena.upgrade()
        {
            arena.credit(self.bytes);
        }
    }
}

/// A contiguous, fixed-length scratch buffer.
///
/// Cloning is cheap and shares the same storage, so a job closure and the
/// submitting caller can both hold the buffer; the caller reads results
/// after waiting on the job's completion handle.
///
/// # Caller contract
/// While a job referencing this buffer is in flight, slot `i` may be
/// written only by the chunk that owns index `i`, and no thread outside the
/// executor may touch the buffer. Violations are data races the buffer
/// cannot detect.
pub struct ScratchBuffer<T> {
    inner: Arc<BufferInner<T>>,
}

impl<T> std::fmt::Debug for ScratchBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchBuffer")
            .field("len", &self.inner.cells.len())
            .finish_non_exhaustive()
    }
}

impl<T> Clone for ScratchBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Copy + Default + Send> ScratchBuffer<T> {
    pub(crate) fn new(len: usize, bytes: usize, tag: u64, arena: Weak<ArenaShared>) -> Self {
        let cells = (0..len)
            .map(|_| UnsafeCell::new(T::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            inner: Arc::new(BufferInner {
                cells,
                released: AtomicBool::new(false),
                tag,
                bytes,
                arena,
            }),
        }
    }
}

impl<T> ScratchBuffer<T> {
    pub fn len(&self) -> usize {
        self.inner.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.cells.is_empty()
    }

    /// Arena-assigned generation tag, for diagnostics.
    pub fn tag(&self) -> u64 {
        self.inner.tag
    }

    pub(crate) fn mark_released(&self) -> Result<(), ScratchError> {
        if self.inner.released.swap(true, Ordering::AcqRel) {
            return Err(ScratchError::UseAfterRelease {
                tag: self.inner.tag,
            });
        }
        if let Some(arena) = self.inner.arena.upgrade() {
            arena.credit(self.inner.bytes);
        }
        Ok(())
    }

    #[inline]
    #[track_caller]
    fn check_live(&self) {
        #[cfg(debug_assertions)]
        assert!(
            !self.inner.released.load(Ordering::Acquire),
            "scratch buffer (tag {}) used after release",
            self.inner.tag
        );
    }
}

impl<T: Copy> ScratchBuffer<T> {
    /// Read slot `index`. Panics on out-of-range, like a slice.
    #[track_caller]
    pub fn get(&self, index: usize) -> T {
        self.check_live();
        assert!(
            index < self.len(),
            "index {index} out of bounds (len {})",
            self.len()
        );
        unsafe { *self.inner.cells[index].get() }
    }

    /// Write slot `index`. Panics on out-of-range, like a slice.
    ///
    /// Subject to the partitioned-write contract: one writer per index
    /// while a job is in flight.
    #[track_caller]
    pub fn set(&self, index: usize, value: T) {
        self.check_live();
        assert!(
            index < self.len(),
            "index {index} out of bounds (len {})",
            self.len()
        );
        unsafe {
            *self.inner.cells[index].get() = value;
        }
    }

    /// Snapshot the contents. Only meaningful once no job referencing the
    /// buffer is in flight.
    pub fn to_vec(&self) -> Vec<T> {
        self.check_live();
        (0..self.len())
            .map(|i| unsafe { *self.inner.cells[i].get() })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ScratchArena;

    #[test]
    fn set_then_get_roundtrip() {
        let arena = ScratchArena::new();
        let buf = arena.allocate::<i64>(8).unwrap();
        for i in 0..8 {
            buf.set(i, (i as i64) * 10);
        }
        for i in 0..8 {
            assert_eq!(buf.get(i), (i as i64) * 10);
        }
        assert_eq!(buf.to_vec(), vec![0, 10, 20, 30, 40, 50, 60, 70]);
    }

    #[test]
    fn freshly_allocated_is_default_initialized() {
        let arena = ScratchArena::new();
        let buf = arena.allocate::<u32>(16).unwrap();
        assert!(buf.to_vec().iter().all(|&v| v == 0));
    }

    #[test]
    fn clones_share_storage() {
        let arena = ScratchArena::new();
        let buf = arena.allocate::<i32>(4).unwrap();
        let clone = buf.clone();
        clone.set(2, 99);
        assert_eq!(buf.get(2), 99);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn out_of_range_get_panics() {
        let arena = ScratchArena::new();
        let buf = arena.allocate::<i32>(4).unwrap();
        let _ = buf.get(4);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "used after release")]
    fn use_after_release_asserts_in_debug() {
        let arena = ScratchArena::new();
        let buf = arena.allocate::<i32>(4).unwrap();
        let clone = buf.clone();
        arena.release(buf).unwrap();
        let _ = clone.get(0);
    }
}
