//! The forall dispatcher.
//!
//! `forall(policy, iterable, body)` invokes `body(i)` exactly once for every
//! index `i` of `iterable` and returns only after every invocation finished.
//!
//! # Architecture
//!
//! ```text
//! forall(policy, iter, body)
//!   │
//!   ├─ policy.validate()                 ← rejected policies never launch
//!   ├─ policy.launch(len, ...)           ← device: grid check + fault capture
//!   │    └─ policy.for_each_chunk(len, |offsets| ...)
//!   │         ├─ SeqExec       one chunk on the calling thread
//!   │         ├─ HostDynamic   grain-sized chunks, taken on demand
//!   │         ├─ HostStatic    CHUNK-sized chunks, dealt round-robin
//!   │         └─ DeviceExec    one chunk per workgroup, tail lanes masked
//!   │
//!   └─ per chunk: worker = body.privatize()
//!                 for offset in chunk { worker(iter.at(offset)) }
//! ```
//!
//! The per-element path is fully monomorphized: the policy type picks the
//! `for_each_chunk` implementation, and no branch on the policy remains
//! inside a chunk.

use std::fmt;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use rayon::prelude::*;
use tracing::{instrument, trace};

use crate::error::{Error, Result};
use crate::grid::LaunchGrid;
use crate::partition::{StaticSchedule, chunk_count, chunk_range};
use crate::policy::{DeviceExec, HostDynamic, HostStatic, Policy, SeqExec};
use crate::privatize::{LoopBody, Private, Shared};
use crate::segment::Iterable;
use crate::types::Index;

// ============================================================================
// Backend Primitive
// ============================================================================

/// The parallel-for primitive behind a forall policy.
pub trait ForallPolicy: Policy {
    /// Invoke `chunk` on ranges of offsets that together cover `0..len`
    /// exactly once, and return after every invocation completed.
    fn for_each_chunk<C>(&self, len: usize, chunk: C)
    where
        C: Fn(Range<usize>) + Sync;

    /// Run one batch of `len` elements.
    ///
    /// Host backends run the batch directly and let panics propagate.
    fn launch<R>(&self, _len: usize, batch: impl FnOnce() -> R) -> Result<R> {
        Ok(batch())
    }
}

impl ForallPolicy for SeqExec {
    fn for_each_chunk<C>(&self, len: usize, chunk: C)
    where
        C: Fn(Range<usize>) + Sync,
    {
        chunk(0..len);
    }
}

impl ForallPolicy for HostDynamic {
    fn for_each_chunk<C>(&self, len: usize, chunk: C)
    where
        C: Fn(Range<usize>) + Sync,
    {
        let grain = self.grain_size();
        let chunks = chunk_count(len, grain);
        trace!(chunks, grain, "dynamic partition");

        // One chunk per rayon job keeps the grain as the unit of stealing.
        (0..chunks)
            .into_par_iter()
            .with_max_len(1)
            .for_each(|c| chunk(chunk_range(c, grain, len)));
    }
}

impl<const CHUNK: usize> ForallPolicy for HostStatic<CHUNK> {
    fn for_each_chunk<C>(&self, len: usize, chunk: C)
    where
        C: Fn(Range<usize>) + Sync,
    {
        let schedule = StaticSchedule::new(len, CHUNK, rayon::current_num_threads());
        trace!(chunks = schedule.chunk_count(), chunk_size = CHUNK, "static partition");

        rayon::broadcast(|ctx| {
            for range in schedule.chunks_for(ctx.index()) {
                chunk(range);
            }
        });
    }
}

impl<const WORKGROUP: usize> ForallPolicy for DeviceExec<WORKGROUP> {
    fn for_each_chunk<C>(&self, len: usize, chunk: C)
    where
        C: Fn(Range<usize>) + Sync,
    {
        // Lanes past `len` in the last workgroup are masked by clamping.
        (0..chunk_count(len, WORKGROUP))
            .into_par_iter()
            .for_each(|group| chunk(chunk_range(group, WORKGROUP, len)));
    }

    fn launch<R>(&self, len: usize, batch: impl FnOnce() -> R) -> Result<R> {
        LaunchGrid::new(len, WORKGROUP, self.limits())?;
        catch_device_fault(batch)
    }
}

/// Run a device launch, turning any lane panic into one aggregate fault.
pub(crate) fn catch_device_fault<R>(launch: impl FnOnce() -> R) -> Result<R> {
    panic::catch_unwind(AssertUnwindSafe(launch)).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "lane panicked".to_string());
        Error::DeviceFault(message)
    })
}

// ============================================================================
// Dispatch
// ============================================================================

/// Shared driver of every forall variant.
///
/// `item` maps an offset to the value handed to the body.
fn dispatch<P, I, T, G, B>(policy: &P, iter: &I, item: G, body: &B) -> Result<()>
where
    P: ForallPolicy,
    I: Iterable + ?Sized,
    G: Fn(&I, usize) -> T + Sync,
    B: LoopBody<T>,
{
    policy.validate()?;

    let len = iter.len();
    if len == 0 {
        trace!("empty iteration space");
        return Ok(());
    }

    policy.launch(len, || {
        policy.for_each_chunk(len, |offsets| {
            trace!(start = offsets.start, end = offsets.end, "chunk");
            let mut worker = body.privatize();
            for offset in offsets {
                worker(item(iter, offset));
            }
        })
    })
}

/// Invoke `body(i)` once for every index of `iter`.
///
/// The body is shared by reference between workers, so it must be `Fn`;
/// use [`forall_private`] for bodies that carry mutable state.
///
/// # Errors
///
/// - [`Error::InvalidPolicy`] if the policy is rejected; nothing runs.
/// - [`Error::LaunchTooLarge`] / [`Error::DeviceFault`] on device policies.
///
/// A panicking body on a sequential or host policy resumes its panic in the
/// caller once the batch has stopped.
#[instrument(skip_all, name = "forall", fields(policy = P::NAME, len = iter.len()))]
pub fn forall<P, I, F>(policy: &P, iter: &I, body: F) -> Result<()>
where
    P: ForallPolicy,
    I: Iterable + ?Sized,
    F: Fn(Index) + Sync,
{
    dispatch(policy, iter, |it, offset| it.at(offset), &Shared(body))
}

/// Invoke a stateful body once per index, privatized per chunk.
///
/// Every chunk starts from a fresh clone of `body`, so state captured by
/// value is never observed across workers or chunks.
#[instrument(skip_all, name = "forall_private", fields(policy = P::NAME, len = iter.len()))]
pub fn forall_private<P, I, F>(policy: &P, iter: &I, body: F) -> Result<()>
where
    P: ForallPolicy,
    I: Iterable + ?Sized,
    F: FnMut(Index) + Clone + Sync,
{
    dispatch(policy, iter, |it, offset| it.at(offset), &Private(body))
}

/// Index-count forall: the body receives `(icount_start + offset, index)`.
#[instrument(skip_all, name = "forall_icount", fields(policy = P::NAME, len = iter.len()))]
pub fn forall_icount<P, I, F>(policy: &P, iter: &I, icount_start: Index, body: F) -> Result<()>
where
    P: ForallPolicy,
    I: Iterable + ?Sized,
    F: Fn(Index, Index) + Sync,
{
    dispatch(
        policy,
        iter,
        |it, offset| (icount_start + offset as Index, it.at(offset)),
        &Shared(|(icount, index): (Index, Index)| body(icount, index)),
    )
}

/// Forall over a fallible body.
///
/// The first error aborts the batch: invocations that have not started yet
/// are skipped, and the error is returned as [`Error::BodyFault`] once the
/// batch has stopped. Which error is "first" is only defined for sequential
/// policies.
#[instrument(skip_all, name = "try_forall", fields(policy = P::NAME, len = iter.len()))]
pub fn try_forall<P, I, F, E>(policy: &P, iter: &I, body: F) -> Result<()>
where
    P: ForallPolicy,
    I: Iterable + ?Sized,
    F: Fn(Index) -> std::result::Result<(), E> + Sync,
    E: fmt::Display,
{
    let aborted = AtomicBool::new(false);
    let fault: Mutex<Option<(Index, String)>> = Mutex::new(None);

    let guarded = |index: Index| {
        if aborted.load(Ordering::Relaxed) {
            return;
        }
        if let Err(err) = body(index) {
            let mut slot = fault.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some((index, err.to_string()));
            }
            aborted.store(true, Ordering::Relaxed);
        }
    };
    dispatch(policy, iter, |it, offset| it.at(offset), &Shared(guarded))?;

    match fault.into_inner().unwrap_or_else(PoisonError::into_inner) {
        Some((index, message)) => Err(Error::BodyFault { index, message }),
        None => Ok(()),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, AtomicUsize};

    use super::*;
    use crate::segment::{ListSegment, RangeSegment};

    fn visit_counts<P: ForallPolicy>(policy: &P, len: usize) -> Vec<usize> {
        let counts: Vec<AtomicUsize> = (0..len).map(|_| AtomicUsize::new(0)).collect();
        forall(policy, &RangeSegment::new(0, len as Index), |i| {
            counts[i as usize].fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
        counts.into_iter().map(AtomicUsize::into_inner).collect()
    }

    #[test]
    fn test_every_policy_visits_each_index_once() {
        for len in [0, 1, 7, 100, 1023] {
            assert!(visit_counts(&SeqExec, len).iter().all(|&c| c == 1));
            assert!(visit_counts(&HostDynamic::new(3), len).iter().all(|&c| c == 1));
            assert!(visit_counts(&HostStatic::<4>, len).iter().all(|&c| c == 1));
            assert!(visit_counts(&DeviceExec::<64>::new(), len).iter().all(|&c| c == 1));
        }
    }

    #[test]
    fn test_seq_preserves_order() {
        let seen = Mutex::new(Vec::new());
        let list = ListSegment::owned(vec![9, 2, 5]);
        forall(&SeqExec, &list, |i| seen.lock().unwrap().push(i)).unwrap();
        assert_eq!(seen.into_inner().unwrap(), vec![9, 2, 5]);
    }

    /// Indices each chunk visited, in visit order, one run per chunk.
    fn chunk_runs<P: ForallPolicy>(policy: &P, list: &ListSegment<'_>) -> Vec<Vec<Index>> {
        let runs = Mutex::new(Vec::<Vec<Index>>::new());
        let runs_ref = &runs;
        let mut slot: Option<usize> = None;
        forall_private(policy, list, move |i| {
            let mut runs = runs_ref.lock().unwrap();
            let run = *slot.get_or_insert_with(|| {
                runs.push(Vec::new());
                runs.len() - 1
            });
            runs[run].push(i);
        })
        .unwrap();
        runs.into_inner().unwrap()
    }

    fn assert_contiguous_runs<P: ForallPolicy>(policy: &P, chunk: usize) {
        // Distinct, non-monotonic indices: 37 is invertible mod 211.
        let order: Vec<Index> = (0..200).map(|i| (i * 37) % 211).collect();
        let list = ListSegment::owned(order.clone());

        let mut starts = Vec::new();
        for run in chunk_runs(policy, &list) {
            let start = order.iter().position(|&i| i == run[0]).unwrap();
            assert_eq!(start % chunk, 0, "{}: run starts mid-chunk", P::NAME);
            assert_eq!(run.len(), chunk.min(order.len() - start), "{}", P::NAME);
            assert_eq!(run, order[start..start + run.len()], "{}", P::NAME);
            starts.push(start);
        }
        starts.sort_unstable();
        let expected: Vec<usize> = (0..order.len()).step_by(chunk).collect();
        assert_eq!(starts, expected, "{}: chunks must cover the list once", P::NAME);
    }

    #[test]
    fn test_chunks_walk_list_order() {
        assert_contiguous_runs(&SeqExec, 200);
        assert_contiguous_runs(&HostDynamic::new(7), 7);
        assert_contiguous_runs(&HostStatic::<5>, 5);
        assert_contiguous_runs(&DeviceExec::<16>::new(), 16);
    }

    #[test]
    fn test_zero_grain_rejected_before_launch() {
        let hits = AtomicUsize::new(0);
        let err = forall(&HostDynamic::new(0), &RangeSegment::new(0, 10), |_| {
            hits.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidPolicy { .. }));
        assert_eq!(hits.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_icount_pairs_offsets_with_indices() {
        let pairs = Mutex::new(Vec::new());
        let list = ListSegment::owned(vec![40, 10, 30]);
        forall_icount(&SeqExec, &list, 100, |icount, i| {
            pairs.lock().unwrap().push((icount, i));
        })
        .unwrap();
        assert_eq!(pairs.into_inner().unwrap(), vec![(100, 40), (101, 10), (102, 30)]);
    }

    #[test]
    fn test_private_state_restarts_per_chunk() {
        // Each chunk of two gets a fresh copy of `seen`, so the running count
        // never exceeds the grain.
        let max_seen = AtomicUsize::new(0);
        let max_ref = &max_seen;
        let mut seen = 0usize;
        forall_private(&HostDynamic::new(2), &RangeSegment::new(0, 11), move |_| {
            seen += 1;
            max_ref.fetch_max(seen, Ordering::Relaxed);
        })
        .unwrap();
        assert_eq!(max_seen.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_try_forall_reports_first_error() {
        let sum = AtomicI64::new(0);
        let err = try_forall(&SeqExec, &RangeSegment::new(0, 10), |i| {
            if i == 4 {
                return Err(format!("bad index {i}"));
            }
            sum.fetch_add(i, Ordering::Relaxed);
            Ok(())
        })
        .unwrap_err();

        match err {
            Error::BodyFault { index, message } => {
                assert_eq!(index, 4);
                assert_eq!(message, "bad index 4");
            }
            other => panic!("unexpected error: {other}"),
        }
        // 0 + 1 + 2 + 3; indices after the fault are skipped.
        assert_eq!(sum.load(Ordering::Relaxed), 6);
    }

    #[test]
    fn test_try_forall_ok() {
        let result = try_forall(&HostDynamic::new(4), &RangeSegment::new(0, 64), |_| {
            Ok::<(), String>(())
        });
        assert!(result.is_ok());
    }

    #[test]
    fn test_device_panic_becomes_single_fault() {
        let err = forall(&DeviceExec::<32>::new(), &RangeSegment::new(0, 256), |i| {
            if i % 50 == 7 {
                panic!("lane {i} failed");
            }
        })
        .unwrap_err();
        match err {
            Error::DeviceFault(message) => assert!(message.contains("failed")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    #[should_panic(expected = "host body failed")]
    fn test_host_panic_propagates() {
        let _ = forall(&HostDynamic::new(8), &RangeSegment::new(0, 64), |i| {
            if i == 13 {
                panic!("host body failed");
            }
        });
    }

    #[test]
    fn test_device_workgroup_over_limit_rejected() {
        let err = forall(&DeviceExec::<1024>::new(), &RangeSegment::new(0, 4), |_| {}).unwrap_err();
        assert!(matches!(err, Error::InvalidPolicy { policy: "device_exec", .. }));
    }
}
