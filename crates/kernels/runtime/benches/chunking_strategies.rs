//! Chunking strategy benchmarks.
//!
//! Compares the dispatch policies on the same loop body to measure:
//! - Grain size sensitivity of dynamic chunking
//! - Static versus dynamic partitioning across iteration counts
//! - Device-style workgroup launches for 1-D and 2-D kernels
//! - The auto grain heuristic itself

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use nestor_runtime::partition::auto_grain_size;
use nestor_runtime::{
    Args, DeviceExec, HostDynamic, HostReduce, HostStatic, Index, Kernel, RangeSegment,
    ReduceSum, SeqExec, Statement, forall,
};

fn test_values(len: usize) -> Vec<f64> {
    (0..len).map(|i| i as f64 * 0.1).collect()
}

/// Serial baseline for comparison
fn sum_serial(values: &[f64]) -> f64 {
    values.iter().map(|v| v * 0.5 + 1.0).sum()
}

fn sum_forall<P: nestor_runtime::ForallPolicy>(policy: &P, values: &[f64]) -> f64 {
    let sum = ReduceSum::<HostReduce, f64>::new(0.0);
    forall(policy, &RangeSegment::new(0, values.len() as Index), |i| {
        sum.combine(values[i as usize] * 0.5 + 1.0)
    })
    .unwrap();
    sum.get()
}

/// Benchmark different grain sizes for a fixed iteration count
fn bench_grain_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("grain_sizes");

    let len = 100_000;
    let values = test_values(len);
    group.throughput(Throughput::Elements(len as u64));

    for grain in [64, 256, 1024, 4096, 16_384] {
        let policy = HostDynamic::new(grain);
        group.bench_with_input(BenchmarkId::from_parameter(grain), &grain, |b, _| {
            b.iter(|| sum_forall(&policy, black_box(&values)))
        });
    }

    let auto = HostDynamic::new(auto_grain_size(len, rayon::current_num_threads()));
    group.bench_function("auto", |b| b.iter(|| sum_forall(&auto, black_box(&values))));

    group.finish();
}

/// Benchmark static and dynamic partitioning against the serial baseline
fn bench_partitioning(c: &mut Criterion) {
    let mut group = c.benchmark_group("partitioning");

    for len in [1_000, 10_000, 100_000, 1_000_000] {
        let values = test_values(len);
        group.throughput(Throughput::Elements(len as u64));

        group.bench_with_input(BenchmarkId::new("serial", len), &len, |b, _| {
            b.iter(|| sum_serial(black_box(&values)))
        });
        group.bench_with_input(BenchmarkId::new("seq_exec", len), &len, |b, _| {
            b.iter(|| sum_forall(&SeqExec, black_box(&values)))
        });
        group.bench_with_input(BenchmarkId::new("dynamic", len), &len, |b, _| {
            b.iter(|| sum_forall(&HostDynamic::default(), black_box(&values)))
        });
        group.bench_with_input(BenchmarkId::new("static_1024", len), &len, |b, _| {
            b.iter(|| sum_forall(&HostStatic::<1024>, black_box(&values)))
        });
        group.bench_with_input(BenchmarkId::new("device_256", len), &len, |b, _| {
            b.iter(|| sum_forall(&DeviceExec::<256>::new(), black_box(&values)))
        });
    }

    group.finish();
}

/// Benchmark 2-D kernel launches, where the device path pays for masking
fn bench_kernel_shapes(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel_shapes");

    for (rows, cols) in [(64, 64), (256, 256), (1000, 37)] {
        let values = test_values((rows * cols) as usize);
        group.throughput(Throughput::Elements((rows * cols) as u64));

        let id = format!("{rows}x{cols}");
        group.bench_with_input(BenchmarkId::new("host_dynamic", &id), &id, |b, _| {
            b.iter(|| kernel_sum(&HostDynamic::new(1), rows, cols, black_box(&values)))
        });
        group.bench_with_input(BenchmarkId::new("device_64", &id), &id, |b, _| {
            b.iter(|| kernel_sum(&DeviceExec::<64>::new(), rows, cols, black_box(&values)))
        });
        group.bench_with_input(BenchmarkId::new("device_256", &id), &id, |b, _| {
            b.iter(|| kernel_sum(&DeviceExec::<256>::new(), rows, cols, black_box(&values)))
        });
    }

    group.finish();
}

fn kernel_sum<KP: nestor_runtime::KernelPolicy>(
    policy: &KP,
    rows: Index,
    cols: Index,
    values: &[f64],
) -> f64 {
    let sum = ReduceSum::<HostReduce, f64>::new(0.0);
    let kernel = Kernel::new(
        vec![RangeSegment::new(0, rows).into(), RangeSegment::new(0, cols).into()],
        vec![Statement::for_loop(0, vec![Statement::for_loop(1, vec![Statement::lambda(0)])])],
        (|args: &Args<'_>| {
            let (i, j) = (args.index(0), args.index(1));
            sum.combine(values[(i * cols + j) as usize]);
        },),
    );
    kernel.launch(policy).unwrap();
    sum.get()
}

/// Benchmark the auto grain heuristic itself
fn bench_grain_heuristic(c: &mut Criterion) {
    let mut group = c.benchmark_group("grain_heuristic");

    for len in [100, 1_000, 10_000, 100_000, 1_000_000] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            b.iter(|| auto_grain_size(black_box(len), black_box(8)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_grain_sizes,
    bench_partitioning,
    bench_kernel_shapes,
    bench_grain_heuristic,
);
criterion_main!(benches);
