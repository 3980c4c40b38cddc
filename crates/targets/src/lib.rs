//! Indexed external-target adapter: binds the executor to an ordered
//! collection of externally owned mutable handles (the transform-array
//! analogue) so a per-index function can write through the adapter rather
//! than only through scratch buffers.
//!
//! # Invariants
//! - Each index maps to exactly one handle, so writes to distinct indices
//!   from different chunks never alias.
//! - The adapter takes the host's values for the duration of its tasks and
//!   hands them back through `into_inner`; it carries no ownership
//!   semantics over the host's objects beyond that.

use std::cell::UnsafeCell;
use std::sync::Arc;

use jobspace_executor::{CompletionHandle, Executor, FaultCause, ParallelFor, SubmitError};

/// Bounds failure at a target-access call site.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("target index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },
}

struct SetInner<T> {
    slots: Box<[UnsafeCell<T>]>,
}

// Writes go through `&self` under the partitioned-write discipline: while
// a task referencing the set is in flight, each index is written by at
// most one chunk.
unsafe impl<T: Send> Send for SetInner<T> {}
unsafe impl<T: Send> Sync for SetInner<T> {}

/// An ordered, index-addressable collection of mutable handles.
///
/// Cloning is cheap and shares the same slots, so a task closure and the
/// submitting caller can both hold the set. Prefer [`scatter`], which pairs
/// the set with the executor and upholds the one-writer-per-index contract
/// by construction.
///
/// # Caller contract
/// Direct `set`/`update` calls from concurrent chunks must target distinct
/// indices, and no thread outside the executor may mutate the set while a
/// task referencing it is in flight. Violations are data races the adapter
/// cannot detect.
pub struct TargetSet<T> {
    inner: Arc<SetInner<T>>,
}

impl<T> std::fmt::Debug for TargetSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetSet")
            .field("len", &self.inner.slots.len())
            .finish_non_exhaustive()
    }
}

impl<T> Clone for TargetSet<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send> TargetSet<T> {
    /// Wrap the host's values. Index `i` addresses `values[i]`.
    pub fn from_vec(values: Vec<T>) -> Self {
        let slots = values
            .into_iter()
            .map(UnsafeCell::new)
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            inner: Arc::new(SetInner { slots }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots.is_empty()
    }

    /// Overwrite the handle at `index`.
    pub fn set(&self, index: usize, value: T) -> Result<(), TargetError> {
        let slot = self.slot(index)?;
        unsafe {
            *slot.get() = value;
        }
        Ok(())
    }

    /// Mutate the handle at `index` in place: the mutable-handle analogue.
    pub fn update(&self, index: usize, mutate: impl FnOnce(&mut T)) -> Result<(), TargetError> {
        let slot = self.slot(index)?;
        mutate(unsafe { &mut *slot.get() });
        Ok(())
    }

    /// Recover the values once all task clones are gone.
    ///
    /// Fails with the set unchanged while another handle (a still-running
    /// task's clone) exists. After `wait` returns on every task referencing
    /// the set, the submitting caller's handle is the only one left.
    pub fn into_inner(self) -> Result<Vec<T>, TargetSet<T>> {
        match Arc::try_unwrap(self.inner) {
            Ok(inner) => Ok(inner
                .slots
                .into_vec()
                .into_iter()
                .map(UnsafeCell::into_inner)
                .collect()),
            Err(inner) => Err(TargetSet { inner }),
        }
    }

    fn slot(&self, index: usize) -> Result<&UnsafeCell<T>, TargetError> {
        self.inner.slots.get(index).ok_or(TargetError::OutOfRange {
            index,
            len: self.inner.slots.len(),
        })
    }
}

impl<T: Copy + Send> TargetSet<T> {
    /// Snapshot the handle at `index`.
    pub fn get(&self, index: usize) -> Result<T, TargetError> {
        let slot = self.slot(index)?;
        Ok(unsafe { *slot.get() })
    }
}

/// Run `produce(i)` for every index of the set and write the result into
/// slot `i`: the parallel-for-over-transforms pattern.
///
/// Partitions `[0, set.len())` at the given granularity; each index is
/// written by exactly one chunk, so the adapter's aliasing contract holds
/// by construction.
pub fn scatter<T, F>(
    executor: &Executor,
    targets: &TargetSet<T>,
    granularity: usize,
    produce: F,
) -> Result<CompletionHandle, SubmitError>
where
    T: Send + 'static,
    F: Fn(usize) -> Result<T, FaultCause> + Send + Sync + 'static,
{
    let desc = ParallelFor::new(targets.len(), granularity)?;
    tracing::debug!(len = targets.len(), granularity, "scatter submitted");
    let targets = targets.clone();
    executor.submit(desc, move |index| {
        let value = produce(index)?;
        // In range by construction; surfaced as a task fault if not.
        targets
            .set(index, value)
            .map_err(|e| -> FaultCause { Box::new(e) })?;
        Ok(())
    })
}

pub fn crate_info() -> &'static str {
    "jobspace-targets v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use jobspace_common::{SeededRng, Transform, transforms_hash};
    use jobspace_executor::ExecutorConfig;

    fn executor(workers: usize) -> Executor {
        Executor::new(ExecutorConfig { workers }).unwrap()
    }

    #[test]
    fn set_and_get_roundtrip() {
        let set = TargetSet::from_vec(vec![0u64; 4]);
        set.set(2, 99).unwrap();
        assert_eq!(set.get(2), Ok(99));
        assert_eq!(set.get(0), Ok(0));
    }

    #[test]
    fn update_mutates_in_place() {
        let set = TargetSet::from_vec(vec![10u64, 20, 30]);
        set.update(1, |v| *v += 5).unwrap();
        assert_eq!(set.get(1), Ok(25));
    }

    #[test]
    fn out_of_range_access_is_an_error() {
        let set = TargetSet::from_vec(vec![0u64; 3]);
        assert_eq!(
            set.get(3),
            Err(TargetError::OutOfRange { index: 3, len: 3 })
        );
        assert_eq!(
            set.set(7, 1),
            Err(TargetError::OutOfRange { index: 7, len: 3 })
        );
    }

    #[test]
    fn into_inner_recovers_values() {
        let set = TargetSet::from_vec(vec![1u64, 2, 3]);
        assert_eq!(set.into_inner().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn into_inner_fails_while_shared() {
        let set = TargetSet::from_vec(vec![1u64]);
        let clone = set.clone();
        let set = set.into_inner().unwrap_err();
        drop(clone);
        assert_eq!(set.into_inner().unwrap(), vec![1]);
    }

    #[test]
    fn scatter_writes_every_slot() {
        let exec = executor(4);
        let set = TargetSet::from_vec(vec![0u64; 256]);
        let handle = scatter(&exec, &set, 16, |i| Ok(i as u64 * 3)).unwrap();
        assert!(handle.wait().is_success());
        let values = set.into_inner().unwrap();
        for (i, v) in values.iter().enumerate() {
            assert_eq!(*v, i as u64 * 3);
        }
    }

    #[test]
    fn scatter_on_empty_set_completes_immediately() {
        let exec = executor(2);
        let set = TargetSet::from_vec(Vec::<u64>::new());
        let handle = scatter(&exec, &set, 1, |i| Ok(i as u64)).unwrap();
        assert!(handle.wait().is_success());
        assert!(set.into_inner().unwrap().is_empty());
    }

    #[test]
    fn scatter_zero_granularity_rejected() {
        let exec = executor(1);
        let set = TargetSet::from_vec(vec![0u64; 8]);
        assert_eq!(
            scatter(&exec, &set, 0, |i| Ok(i as u64)).unwrap_err(),
            SubmitError::ZeroGranularity
        );
    }

    #[test]
    fn scatter_fault_surfaces_at_wait() {
        let exec = executor(1);
        let set = TargetSet::from_vec(vec![0u64; 32]);
        let handle = scatter(&exec, &set, 4, |i| {
            if i == 9 {
                return Err("bad target".into());
            }
            Ok(i as u64)
        })
        .unwrap();
        let err = handle.wait().into_result().unwrap_err();
        assert_eq!(err.index, 9);
    }

    fn random_position(seed: u64, index: usize) -> Vec3 {
        let mut rng = SeededRng::for_index(seed, index);
        Vec3::new(
            rng.range_f32(-15.0, 15.0),
            rng.range_f32(-15.0, 15.0),
            rng.range_f32(-15.0, 15.0),
        )
    }

    #[test]
    fn scattered_transforms_match_serial_loop() {
        let seed = 42u64;
        let count = 300;

        // Serial path.
        let mut serial = vec![Transform::default(); count];
        for (i, t) in serial.iter_mut().enumerate() {
            *t = Transform::at(random_position(seed, i));
        }

        // Scheduled path.
        let exec = executor(4);
        let set = TargetSet::from_vec(vec![Transform::default(); count]);
        let handle = scatter(&exec, &set, 8, move |i| {
            Ok(Transform::at(random_position(seed, i)))
        })
        .unwrap();
        assert!(handle.wait().is_success());
        let scheduled = set.into_inner().unwrap();

        assert_eq!(transforms_hash(&serial), transforms_hash(&scheduled));
    }
}
