//! Reference numerical workloads.
//!
//! Each workload is generic over its policy, so the caller picks the
//! backend once and the loop body is compiled for it. Inputs are generated
//! deterministically from the problem size; every policy must produce the
//! same answer for the same size.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use nestor_runtime::{
    AlignedBuffer, Args, DataLayout, ForallPolicy, HostReduce, Index, Kernel, KernelPolicy,
    RangeSegment, ReduceMinLoc, ReduceSum, Result, Statement, UNDEFINED_VALUE, ValLoc, forall,
};

/// Number of bins used by [`histogram`].
pub const HISTOGRAM_BINS: usize = 16;

fn dot_inputs(len: usize) -> (Vec<f64>, Vec<f64>) {
    let a = (0..len).map(|i| (i % 7) as f64).collect();
    let b = (0..len).map(|i| 0.5 + (i % 3) as f64).collect();
    (a, b)
}

/// `sum_i a[i] * b[i]` over two aligned input vectors of length `len`.
pub fn dot<P: ForallPolicy>(policy: &P, layout: &DataLayout, len: usize) -> Result<f64> {
    let (a, b) = dot_inputs(len);
    let a = AlignedBuffer::from_slice(layout, &a)?;
    let b = AlignedBuffer::from_slice(layout, &b)?;
    debug!(len, alignment = a.alignment(), "dot inputs ready");

    let sum = ReduceSum::<HostReduce, f64>::new(0.0);
    forall(policy, &RangeSegment::new(0, len as Index), |i| {
        let i = i as usize;
        sum.combine(a[i] * b[i]);
    })?;
    Ok(sum.get())
}

fn min_loc_input(len: usize) -> Vec<f64> {
    let center = (len / 3) as f64;
    (0..len).map(|i| (i as f64 - center).powi(2) - 1.0).collect()
}

/// Smallest value of a parabola sampled at `len` points, and where it is.
pub fn min_loc<P: ForallPolicy>(policy: &P, len: usize) -> Result<ValLoc<f64>> {
    let values = min_loc_input(len);
    let min = ReduceMinLoc::<HostReduce, f64>::new(ValLoc::new(f64::INFINITY, UNDEFINED_VALUE));
    forall(policy, &RangeSegment::new(0, len as Index), |i| {
        min.minloc(values[i as usize], i);
    })?;
    Ok(min.get())
}

fn matrix_entry(i: Index, j: Index) -> f64 {
    ((i + 2 * j) % 5) as f64 - 2.0
}

/// Frobenius norm of an `n x n` matrix.
///
/// Rows are distributed; each row walks its columns sequentially and folds
/// the squares into a shared sum.
pub fn frobenius<KP: KernelPolicy>(policy: &KP, n: usize) -> Result<f64> {
    let sum = ReduceSum::<HostReduce, f64>::new(0.0);
    let kernel = Kernel::new(
        vec![RangeSegment::new(0, n as Index).into(), RangeSegment::new(0, n as Index).into()],
        vec![Statement::for_loop(0, vec![Statement::seq_for(1, vec![Statement::lambda(0)])])],
        (|args: &Args<'_>| {
            let entry = matrix_entry(args.index(0), args.index(1));
            sum.combine(entry * entry);
        },),
    );
    kernel.launch(policy)?;
    Ok(sum.get().sqrt())
}

/// Histogram of `(i * j) % HISTOGRAM_BINS` over an `n x n` grid.
///
/// Both loops are parallel, so on the device backend the grid is rounded up
/// to whole workgroups and the extra lanes are masked.
pub fn histogram<KP: KernelPolicy>(policy: &KP, n: usize) -> Result<Vec<u64>> {
    let bins: Vec<AtomicU64> = (0..HISTOGRAM_BINS).map(|_| AtomicU64::new(0)).collect();
    let kernel = Kernel::new(
        vec![RangeSegment::new(0, n as Index).into(), RangeSegment::new(0, n as Index).into()],
        vec![Statement::for_loop(0, vec![Statement::for_loop(1, vec![Statement::lambda(0)])])],
        (|args: &Args<'_>| {
            let bin = (args.index(0) * args.index(1)) as usize % HISTOGRAM_BINS;
            bins[bin].fetch_add(1, Ordering::Relaxed);
        },),
    );
    let shape = kernel.launch_shape();
    debug!(extents = ?shape.extents(), "histogram kernel");
    kernel.launch(policy)?;
    drop(kernel);
    Ok(bins.into_iter().map(AtomicU64::into_inner).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestor_runtime::{DeviceExec, HostDynamic, HostStatic, SeqExec};

    #[test]
    fn test_dot_matches_serial() {
        let (a, b) = dot_inputs(1_000);
        let expected: f64 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        let layout = DataLayout::default();

        assert_eq!(dot(&SeqExec, &layout, 1_000).unwrap(), expected);
        // Integer-valued partials keep the float sum exact in any order.
        assert_eq!(dot(&HostDynamic::new(33), &layout, 1_000).unwrap(), expected);
        assert_eq!(dot(&DeviceExec::<64>::new(), &layout, 1_000).unwrap(), expected);
    }

    #[test]
    fn test_min_loc_finds_vertex() {
        for len in [1, 2, 10, 301] {
            let seq = min_loc(&SeqExec, len).unwrap();
            assert_eq!(seq.loc, (len / 3) as Index);
            assert_eq!(seq.value, -1.0);
            assert_eq!(min_loc(&HostStatic::<4>, len).unwrap(), seq);
        }
    }

    #[test]
    fn test_min_loc_empty() {
        let empty = min_loc(&HostDynamic::new(1), 0).unwrap();
        assert_eq!(empty.loc, UNDEFINED_VALUE);
    }

    #[test]
    fn test_frobenius_across_policies() {
        let n = 20;
        let expected = (0..n as Index)
            .flat_map(|i| (0..n as Index).map(move |j| matrix_entry(i, j).powi(2)))
            .sum::<f64>()
            .sqrt();

        assert_eq!(frobenius(&SeqExec, n).unwrap(), expected);
        assert_eq!(frobenius(&HostDynamic::new(3), n).unwrap(), expected);
        assert_eq!(frobenius(&DeviceExec::<8>::new(), n).unwrap(), expected);
    }

    #[test]
    fn test_histogram_counts_every_cell_once() {
        let n = 37;
        let seq = histogram(&SeqExec, n).unwrap();
        assert_eq!(seq.iter().sum::<u64>(), (n * n) as u64);
        // i == 0 or j == 0 puts 2n - 1 cells in bin 0, plus the rest.
        assert!(seq[0] >= (2 * n - 1) as u64);

        assert_eq!(histogram(&HostStatic::<5>, n).unwrap(), seq);
        assert_eq!(histogram(&DeviceExec::<64>::new(), n).unwrap(), seq);
    }
}
