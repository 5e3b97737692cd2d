//! Nestor Runtime.
//!
//! A policy-dispatched execution engine: one loop-nest expression runs
//! unmodified on a sequential backend, on a host thread pool, or as a
//! device-class grid launch. The backend is picked by the type of the
//! policy value passed to the call, so the choice is made once at compile
//! time and never re-examined per element.
//!
//! # Architecture
//!
//! - [`policy`] - Execution policy tags: [`SeqExec`], [`HostDynamic`],
//!   [`HostStatic`], [`DeviceExec`] and the reduce/region tags
//! - [`privatize`] - Per-worker copies of loop bodies
//! - [`forall`] - The forall dispatcher and its variants
//! - [`region`] - One body invocation per worker
//! - [`reduce`] - Per-worker accumulators and reduction operators
//! - [`kernel`] - Statement trees, argument binding, launch shapes, masking
//! - [`segment`] - Iteration spaces: ranges, strided ranges, lists, index sets
//! - [`partition`] / [`grid`] - Chunking and device grid sizing
//! - [`layout`] - Aligned buffers driven by the injected [`DataLayout`]
//! - [`runtime`] - The configured worker pool
//! - [`error`] - Error types
//!
//! # Execution Model
//!
//! ```text
//! policy + iterable + body
//!        │
//!        ▼
//! ForallPolicy / KernelPolicy impl   (chosen by monomorphization)
//!        │
//!        ├─ SeqExec      calling thread
//!        ├─ HostDynamic  rayon, grain-sized chunks on demand
//!        ├─ HostStatic   rayon broadcast, fixed chunk → worker map
//!        └─ DeviceExec   workgroups of lockstep lanes, overshoot masked
//!        │
//!        ▼
//! body(i) per index ── optionally folding into a Reducer slot
//!        │
//!        ▼
//! implicit barrier: the call returns once every worker is done
//! ```
//!
//! # Example
//!
//! ```
//! use nestor_runtime::{HostDynamic, HostReduce, RangeSegment, ReduceSum, SeqExec, forall};
//!
//! let data: [i64; 5] = [1, 2, 3, 4, 5];
//! let seg = RangeSegment::new(0, data.len() as i64);
//!
//! let seq = ReduceSum::<HostReduce, i64>::new(0);
//! forall(&SeqExec, &seg, |i| seq.combine(data[i as usize])).unwrap();
//!
//! let par = ReduceSum::<HostReduce, i64>::new(0);
//! forall(&HostDynamic::new(2), &seg, |i| par.combine(data[i as usize])).unwrap();
//!
//! assert_eq!(seq.get(), par.get());
//! ```

pub mod config;
pub mod error;
pub mod forall;
pub mod grid;
pub mod kernel;
pub mod layout;
pub mod partition;
pub mod policy;
pub mod privatize;
pub mod reduce;
pub mod region;
pub mod runtime;
pub mod segment;
pub mod types;

pub use config::{DataLayout, DeviceLimits, RuntimeConfig};
pub use error::{Error, Result};
pub use forall::{ForallPolicy, forall, forall_icount, forall_private, try_forall};
pub use grid::LaunchGrid;
pub use kernel::{
    Arg, ArgValue, Args, BoxedLambda, Kernel, KernelData, KernelPolicy, LambdaTable, LaunchShape,
    LoopExec, Statement, calculate_dimensions,
};
pub use layout::AlignedBuffer;
pub use partition::StaticSchedule;
pub use policy::{
    Backend, DeviceExec, DeviceReduce, HostDynamic, HostExec, HostReduce, HostRegion, HostStatic,
    Pattern, Platform, Policy, SeqExec, SeqReduce, SeqRegion,
};
pub use privatize::{LoopBody, Private, Shared};
pub use reduce::{
    BitAnd, BitOr, LogicalAnd, LogicalOr, Max, MaxLoc, Min, MinLoc, ReduceBitAnd, ReduceBitOr,
    ReduceLogicalAnd, ReduceLogicalOr, ReduceMax, ReduceMaxLoc, ReduceMin, ReduceMinLoc,
    ReduceOperator, ReducePolicy, ReduceSum, ReduceValue, Reducer, Sum, ValLoc,
};
pub use region::{RegionPolicy, region};
pub use runtime::Runtime;
pub use segment::{
    IndexSet, Iterable, ListSegment, RangeSegment, RangeStrideSegment, Segment,
};
pub use types::{Index, IndexOwnership, SegmentType, UNDEFINED_VALUE};
