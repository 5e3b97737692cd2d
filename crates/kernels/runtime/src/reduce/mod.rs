//! The reduction engine.
//!
//! A [`Reducer`] keeps one accumulator slot per worker. Loop bodies fold
//! their contributions into the slot of the worker they run on, and
//! [`Reducer::get`] combines the slots once the loop's barrier has passed.
//!
//! # Architecture
//!
//! ```text
//! Reducer<HostReduce, Sum, i64>
//!   slots: Arc<[Slot]>            one per pool worker + one for outside threads
//!   ┌──────────┬──────────┬──────────┬──────────┐
//!   │ worker 0 │ worker 1 │ worker 2 │ outside  │   local() / combine()
//!   └────┬─────┴────┬─────┴────┬─────┴────┬─────┘
//!        └──── tree_reduce over touched slots ┘      get()
//!                          │
//!                  op(init, folded)
//! ```
//!
//! Slots are indexed by the rayon worker index rather than a map keyed by
//! thread identity, so the first touch of a slot needs no allocation. Each
//! slot sits behind its own lock; a worker only ever contends with threads
//! that fell back onto the shared outside slot.
//!
//! # Example
//!
//! ```
//! use nestor_runtime::{HostDynamic, HostReduce, RangeSegment, ReduceSum, forall};
//!
//! let sum = ReduceSum::<HostReduce, i64>::new(0);
//! forall(&HostDynamic::new(2), &RangeSegment::new(1, 6), |i| sum.combine(i)).unwrap();
//! assert_eq!(sum.get(), 15);
//! ```

mod ops;
mod tree;

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use ops::{
    BitAnd, BitOr, LogicalAnd, LogicalOr, Max, MaxLoc, Min, MinLoc, ReduceOperator, ReduceValue,
    Sum, ValLoc,
};
pub use tree::tree_reduce;

use crate::policy::{DeviceReduce, HostReduce, Policy, SeqReduce};
use crate::types::Index;

// ============================================================================
// Slot Allocation
// ============================================================================

/// How a reduce policy lays out and selects worker slots.
pub trait ReducePolicy: Policy {
    /// Number of slots a reducer allocates when it is created.
    fn slot_count() -> usize;

    /// Slot owned by the calling thread, in `0..slots`.
    fn current_slot(slots: usize) -> usize;
}

impl ReducePolicy for SeqReduce {
    fn slot_count() -> usize {
        1
    }

    fn current_slot(_slots: usize) -> usize {
        0
    }
}

/// Pool workers own slots `0..slots - 1`; every other thread shares the last.
fn worker_slot(slots: usize) -> usize {
    let outside = slots - 1;
    rayon::current_thread_index()
        .filter(|&worker| worker < outside)
        .unwrap_or(outside)
}

impl ReducePolicy for HostReduce {
    fn slot_count() -> usize {
        rayon::current_num_threads() + 1
    }

    fn current_slot(slots: usize) -> usize {
        worker_slot(slots)
    }
}

impl ReducePolicy for DeviceReduce {
    fn slot_count() -> usize {
        rayon::current_num_threads() + 1
    }

    fn current_slot(slots: usize) -> usize {
        worker_slot(slots)
    }
}

// ============================================================================
// Reducer
// ============================================================================

#[repr(align(64))]
struct Slot<T> {
    value: Mutex<T>,
    touched: AtomicBool,
}

impl<T> Slot<T> {
    fn new(identity: T) -> Self {
        Self {
            value: Mutex::new(identity),
            touched: AtomicBool::new(false),
        }
    }
}

fn fresh_slots<T: Copy>(count: usize, identity: T) -> Arc<[Slot<T>]> {
    (0..count).map(|_| Slot::new(identity)).collect()
}

/// Per-worker accumulator combined with the operator `Op`.
///
/// Clones share the same slots, so a reducer can be captured by value in a
/// privatized loop body and still contribute to one result.
pub struct Reducer<P, Op, T> {
    slots: Arc<[Slot<T>]>,
    init: T,
    identity: T,
    _marker: PhantomData<(P, Op)>,
}

impl<P, Op, T> Reducer<P, Op, T>
where
    P: ReducePolicy,
    Op: ReduceOperator<T>,
    T: Copy + Send,
{
    /// Reducer whose result starts at `init`, with the operator's identity
    /// for fresh worker slots.
    pub fn new(init: T) -> Self {
        Self::with_identity(init, <Op as ReduceOperator<T>>::identity())
    }

    /// Reducer with an explicit neutral element for fresh worker slots.
    pub fn with_identity(init: T, identity: T) -> Self {
        Self {
            slots: fresh_slots(P::slot_count(), identity),
            init,
            identity,
            _marker: PhantomData,
        }
    }

    /// Mutable handle to the calling worker's accumulator.
    ///
    /// The first touch of a slot initializes it to the identity value.
    ///
    /// # Deadlocks
    ///
    /// The handle holds the lock on the worker's slot until it is dropped.
    /// Drop it before calling back into the same reducer, and before any
    /// nested `forall` or kernel launch: the worker may pick up other
    /// iterations while it waits, and those lock the same slot.
    pub fn local(&self) -> Local<'_, T> {
        let slot = &self.slots[P::current_slot(self.slots.len())];
        let mut guard = slot.value.lock().unwrap_or_else(PoisonError::into_inner);
        if !slot.touched.swap(true, Ordering::Relaxed) {
            *guard = self.identity;
        }
        Local { guard }
    }

    /// Fold `value` into the calling worker's accumulator.
    pub fn combine(&self, value: T) {
        let mut local = self.local();
        *local = <Op as ReduceOperator<T>>::apply(*local, value);
    }

    /// Combined result of every worker slot.
    ///
    /// Only meaningful once every contributing loop has returned. Touched
    /// slots are folded in slot order along a fixed tree, then combined
    /// with the initial value.
    pub fn get(&self) -> T {
        let partials: Vec<T> = self
            .slots
            .iter()
            .filter(|slot| slot.touched.load(Ordering::Relaxed))
            .map(|slot| *slot.value.lock().unwrap_or_else(PoisonError::into_inner))
            .collect();

        match tree_reduce(&partials, <Op as ReduceOperator<T>>::apply) {
            Some(folded) => <Op as ReduceOperator<T>>::apply(self.init, folded),
            None => self.init,
        }
    }

    /// Discard every worker's state and re-arm the reducer.
    ///
    /// Clones made before the reset keep the old slots.
    pub fn reset(&mut self, init: T, identity: T) {
        self.slots = fresh_slots(P::slot_count(), identity);
        self.init = init;
        self.identity = identity;
    }

    /// Number of slots that have been touched since creation or reset.
    pub fn touched_slots(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.touched.load(Ordering::Relaxed))
            .count()
    }
}

impl<P, T> Reducer<P, MinLoc, ValLoc<T>>
where
    P: ReducePolicy,
    T: ReduceValue,
{
    /// Offer `value`, found at `loc`, as a minimum candidate.
    pub fn minloc(&self, value: T, loc: Index) {
        self.combine(ValLoc::new(value, loc));
    }

    /// Location of the minimum, or [`UNDEFINED_VALUE`](crate::UNDEFINED_VALUE)
    /// if nothing was offered.
    pub fn get_loc(&self) -> Index {
        self.get().loc
    }
}

impl<P, T> Reducer<P, MaxLoc, ValLoc<T>>
where
    P: ReducePolicy,
    T: ReduceValue,
{
    /// Offer `value`, found at `loc`, as a maximum candidate.
    pub fn maxloc(&self, value: T, loc: Index) {
        self.combine(ValLoc::new(value, loc));
    }

    pub fn get_loc(&self) -> Index {
        self.get().loc
    }
}

impl<P, Op, T: Copy> Clone for Reducer<P, Op, T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
            init: self.init,
            identity: self.identity,
            _marker: PhantomData,
        }
    }
}

impl<P: Policy, Op, T: fmt::Debug> fmt::Debug for Reducer<P, Op, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reducer")
            .field("policy", &P::NAME)
            .field("slots", &self.slots.len())
            .field("init", &self.init)
            .field("identity", &self.identity)
            .finish()
    }
}

/// Guard over one worker's accumulator.
pub struct Local<'a, T> {
    guard: MutexGuard<'a, T>,
}

impl<T> Deref for Local<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for Local<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

// ============================================================================
// Aliases
// ============================================================================

pub type ReduceSum<P, T> = Reducer<P, Sum, T>;
pub type ReduceMin<P, T> = Reducer<P, Min, T>;
pub type ReduceMax<P, T> = Reducer<P, Max, T>;
pub type ReduceBitAnd<P, T> = Reducer<P, BitAnd, T>;
pub type ReduceBitOr<P, T> = Reducer<P, BitOr, T>;
pub type ReduceLogicalAnd<P> = Reducer<P, LogicalAnd, bool>;
pub type ReduceLogicalOr<P> = Reducer<P, LogicalOr, bool>;
pub type ReduceMinLoc<P, T> = Reducer<P, MinLoc, ValLoc<T>>;
pub type ReduceMaxLoc<P, T> = Reducer<P, MaxLoc, ValLoc<T>>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forall::forall;
    use crate::policy::{DeviceExec, HostDynamic, HostStatic, SeqExec};
    use crate::segment::{ListSegment, RangeSegment};
    use crate::types::UNDEFINED_VALUE;

    #[test]
    fn test_untouched_reducer_returns_init() {
        let sum = ReduceSum::<HostReduce, i32>::new(7);
        assert_eq!(sum.get(), 7);
        assert_eq!(sum.touched_slots(), 0);
    }

    #[test]
    fn test_seq_sum() {
        let sum = ReduceSum::<SeqReduce, i64>::new(0);
        forall(&SeqExec, &RangeSegment::new(1, 6), |i| sum.combine(i)).unwrap();
        assert_eq!(sum.get(), 15);
        assert_eq!(sum.touched_slots(), 1);
    }

    #[test]
    fn test_host_sum_matches_serial_fold() {
        let values: Vec<i64> = (0..5_000).map(|i| (i * 37) % 101 - 50).collect();
        let expected: i64 = values.iter().sum();

        let sum = ReduceSum::<HostReduce, i64>::new(0);
        forall(&HostDynamic::new(16), &RangeSegment::new(0, values.len() as Index), |i| {
            sum.combine(values[i as usize]);
        })
        .unwrap();
        assert_eq!(sum.get(), expected);
    }

    #[test]
    fn test_init_is_folded_in() {
        let max = ReduceMax::<HostReduce, i32>::new(100);
        forall(&HostStatic::<8>, &RangeSegment::new(0, 50), |i| max.combine(i as i32)).unwrap();
        assert_eq!(max.get(), 100);
    }

    #[test]
    fn test_local_handle_accumulates() {
        let count = ReduceSum::<HostReduce, usize>::new(0);
        forall(&HostDynamic::new(4), &RangeSegment::new(0, 100), |_| {
            *count.local() += 1;
        })
        .unwrap();
        assert_eq!(count.get(), 100);
    }

    #[test]
    fn test_local_handle_released_before_nested_loop() {
        let count = ReduceSum::<HostReduce, usize>::new(0);
        forall(&HostDynamic::new(2), &RangeSegment::new(0, 8), |_| {
            {
                let mut local = count.local();
                *local += 1;
            }
            forall(&HostDynamic::new(1), &RangeSegment::new(0, 4), |_| {
                count.combine(1);
            })
            .unwrap();
        })
        .unwrap();
        assert_eq!(count.get(), 8 + 8 * 4);
    }

    #[test]
    fn test_minloc_and_maxloc() {
        let data = ListSegment::owned(vec![5, 3, 9, 3, 9, 1, 1]);
        let min = ReduceMinLoc::<DeviceReduce, i64>::new(ValLoc::new(i64::MAX, UNDEFINED_VALUE));
        let max = ReduceMaxLoc::<DeviceReduce, i64>::new(ValLoc::new(i64::MIN, UNDEFINED_VALUE));

        forall(&DeviceExec::<2>::new(), &RangeSegment::new(0, 7), |i| {
            let value = data.as_slice()[i as usize];
            min.minloc(value, i);
            max.maxloc(value, i);
        })
        .unwrap();

        assert_eq!(min.get(), ValLoc::new(1, 5));
        assert_eq!(max.get_loc(), 2);
    }

    #[test]
    fn test_untouched_minloc_has_undefined_location() {
        let min = ReduceMinLoc::<SeqReduce, f64>::new(MinLoc::identity());
        assert_eq!(min.get_loc(), UNDEFINED_VALUE);
    }

    #[test]
    fn test_logical_and_bitwise() {
        let all_even = ReduceLogicalAnd::<HostReduce>::new(true);
        let any_big = ReduceLogicalOr::<HostReduce>::new(false);
        let bits = ReduceBitOr::<HostReduce, u32>::new(0);
        let mask = ReduceBitAnd::<HostReduce, u32>::new(u32::MAX);

        forall(&HostDynamic::new(3), &RangeSegment::new(0, 32), |i| {
            all_even.combine(i % 2 == 0);
            any_big.combine(i > 30);
            bits.combine(1 << (i % 8));
            mask.combine(0xff00 | i as u32);
        })
        .unwrap();

        assert!(!all_even.get());
        assert!(any_big.get());
        assert_eq!(bits.get(), 0xff);
        assert_eq!(mask.get(), 0xff00);
    }

    #[test]
    fn test_reset_rearms() {
        let mut sum = ReduceSum::<HostReduce, i32>::new(0);
        forall(&HostDynamic::new(2), &RangeSegment::new(0, 10), |_| sum.combine(1)).unwrap();
        assert_eq!(sum.get(), 10);

        sum.reset(5, 0);
        assert_eq!(sum.get(), 5);
        forall(&HostDynamic::new(2), &RangeSegment::new(0, 3), |_| sum.combine(1)).unwrap();
        assert_eq!(sum.get(), 8);
    }

    #[test]
    fn test_clones_share_slots() {
        let sum = ReduceSum::<HostReduce, i32>::new(0);
        let handle = sum.clone();
        handle.combine(4);
        sum.combine(3);
        assert_eq!(sum.get(), 7);
        assert_eq!(handle.get(), 7);
    }

    #[test]
    fn test_reducer_inside_smaller_pool() {
        // Built outside the pool: more slots than workers is fine.
        let sum = ReduceSum::<HostReduce, i64>::new(0);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        pool.install(|| {
            forall(&HostDynamic::new(1), &RangeSegment::new(0, 100), |i| sum.combine(i)).unwrap();
        });
        assert_eq!(sum.get(), 4950);
    }
}
