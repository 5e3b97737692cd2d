//! The kernel statement executor.
//!
//! A kernel is a fixed tree of statements over a set of segments, one
//! segment per loop dimension. Lambda leaves name a callable from the
//! kernel's lambda table and the arguments to bind:
//!
//! ```text
//! Kernel
//!   segments: [rows, cols]          dimension 0, dimension 1
//!   params:   [alpha]
//!   body:
//!     For(dim 0)
//!       For(dim 1)
//!         Lambda(0, [Seg(0), Seg(1), Param(0)])   → lambda_0(row, col, &alpha)
//!       Sync
//!       Lambda(1, [Seg(0)])                       → lambda_1(row)
//! ```
//!
//! # Lowering
//!
//! | Policy | Lowering |
//! |--------|----------|
//! | [`SeqExec`] | in-order walk on the calling thread |
//! | [`HostDynamic`], [`HostStatic`] | outermost parallel loop distributed through forall |
//! | [`DeviceExec`] | launch grid sized by [`Kernel::launch_shape`], lanes in lockstep |
//!
//! The tree is validated before anything runs: every loop dimension, lambda
//! and argument descriptor must refer to something the kernel declares.
//!
//! # Example
//!
//! ```
//! use nestor_runtime::{Args, HostDynamic, Kernel, RangeSegment, ReduceSum, HostReduce, Statement};
//!
//! let total = ReduceSum::<HostReduce, i64>::new(0);
//! let kernel = Kernel::new(
//!     vec![RangeSegment::new(0, 4).into(), RangeSegment::new(0, 3).into()],
//!     vec![Statement::for_loop(0, vec![Statement::for_loop(1, vec![Statement::lambda(0)])])],
//!     (|args: &Args<'_>| total.combine(args.index(0) * args.index(1)),),
//! );
//! kernel.launch(&HostDynamic::default()).unwrap();
//! assert_eq!(total.get(), 18);
//! ```

mod data;
mod device;
mod host;
mod shape;

use tracing::instrument;

pub use data::{ArgValue, Args, BoxedLambda, KernelData, LambdaTable};
pub use shape::{LaunchShape, calculate_dimensions};

use crate::error::{Error, Result};
use crate::policy::{DeviceExec, HostDynamic, HostStatic, Policy, SeqExec};
use crate::segment::Segment;

// ============================================================================
// Statements
// ============================================================================

/// How a For statement is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoopExec {
    /// Spread across workers: distributed on host-threaded backends,
    /// mapped onto lanes on the device backend.
    #[default]
    Parallel,
    /// Iterated inside the worker that reaches it.
    Seq,
}

/// What a lambda argument binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
    /// Current index of a dimension.
    Seg(usize),
    /// Current offset within a dimension's segment.
    Offset(usize),
    /// A kernel parameter.
    Param(usize),
}

/// A node of the kernel's statement tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Loop over the segment bound to `dim`.
    For {
        dim: usize,
        exec: LoopExec,
        body: Vec<Statement>,
    },
    /// Call lambda `index`. `None` binds every segment index, in dimension
    /// order.
    Lambda {
        index: usize,
        args: Option<Vec<Arg>>,
    },
    /// Barrier between the lanes of a device workgroup.
    Sync,
}

impl Statement {
    pub fn for_loop(dim: usize, body: Vec<Statement>) -> Self {
        Statement::For {
            dim,
            exec: LoopExec::Parallel,
            body,
        }
    }

    pub fn seq_for(dim: usize, body: Vec<Statement>) -> Self {
        Statement::For {
            dim,
            exec: LoopExec::Seq,
            body,
        }
    }

    pub fn lambda(index: usize) -> Self {
        Statement::Lambda { index, args: None }
    }

    pub fn lambda_with(index: usize, args: impl Into<Vec<Arg>>) -> Self {
        Statement::Lambda {
            index,
            args: Some(args.into()),
        }
    }

    pub fn sync() -> Self {
        Statement::Sync
    }
}

// ============================================================================
// Kernel
// ============================================================================

/// A statement tree bound to its segments, parameters and lambdas.
pub struct Kernel<'a, L, P = ()> {
    segments: Vec<Segment<'a>>,
    params: Vec<P>,
    body: Vec<Statement>,
    lambdas: L,
}

impl<'a, L> Kernel<'a, L, ()> {
    pub fn new(segments: Vec<Segment<'a>>, body: Vec<Statement>, lambdas: L) -> Self {
        Self {
            segments,
            params: Vec::new(),
            body,
            lambdas,
        }
    }
}

impl<'a, L, P> Kernel<'a, L, P> {
    /// Bind external parameters, addressed by [`Arg::Param`].
    pub fn with_params<Q>(self, params: Vec<Q>) -> Kernel<'a, L, Q> {
        Kernel {
            segments: self.segments,
            params,
            body: self.body,
            lambdas: self.lambdas,
        }
    }

    pub fn segments(&self) -> &[Segment<'a>] {
        &self.segments
    }

    pub fn params(&self) -> &[P] {
        &self.params
    }

    pub fn body(&self) -> &[Statement] {
        &self.body
    }

    pub fn lambdas(&self) -> &L {
        &self.lambdas
    }

    /// Fresh context with no dimension bound.
    pub fn data(&self) -> KernelData<'_, P> {
        KernelData::new(&self.segments, &self.params)
    }

    /// Worker grid needed to cover the whole tree.
    pub fn launch_shape(&self) -> LaunchShape {
        calculate_dimensions(&self.body, &self.data())
    }
}

impl<L, P> Kernel<'_, L, P>
where
    L: LambdaTable<P>,
    P: Sync,
{
    /// Check every statement against the kernel's declarations.
    pub fn validate(&self) -> Result<()> {
        self.validate_statements(&self.body)
    }

    fn validate_statements(&self, statements: &[Statement]) -> Result<()> {
        let dims = self.segments.len();
        for statement in statements {
            match statement {
                Statement::For { dim, body, .. } => {
                    if *dim >= dims {
                        return Err(Error::DimensionOutOfRange { dim: *dim, dims });
                    }
                    self.validate_statements(body)?;
                }
                Statement::Lambda { index, args } => {
                    if *index >= self.lambdas.len() {
                        return Err(Error::LambdaOutOfRange {
                            index: *index,
                            len: self.lambdas.len(),
                        });
                    }
                    for (position, arg) in args.iter().flatten().enumerate() {
                        self.validate_arg(*index, position, arg)?;
                    }
                }
                Statement::Sync => {}
            }
        }
        Ok(())
    }

    fn validate_arg(&self, lambda: usize, position: usize, arg: &Arg) -> Result<()> {
        let (kind, value, limit) = match *arg {
            Arg::Seg(dim) => ("segment", dim, self.segments.len()),
            Arg::Offset(dim) => ("offset of segment", dim, self.segments.len()),
            Arg::Param(i) => ("parameter", i, self.params.len()),
        };
        if value >= limit {
            return Err(Error::ArgumentOutOfRange {
                lambda,
                position,
                message: format!("{kind} {value} not declared ({limit} available)"),
            });
        }
        Ok(())
    }

    /// Validate the tree, then execute it under `policy`.
    ///
    /// Returns after every lambda invocation has completed.
    #[instrument(skip_all, name = "kernel", fields(policy = KP::NAME, dims = self.segments.len()))]
    pub fn launch<KP: KernelPolicy>(&self, policy: &KP) -> Result<()> {
        policy.validate()?;
        self.validate()?;
        policy.launch_kernel(self)
    }
}

// ============================================================================
// Kernel Policies
// ============================================================================

/// Policies that can lower a kernel.
pub trait KernelPolicy: Policy {
    /// Execute an already validated kernel.
    fn launch_kernel<L, P>(&self, kernel: &Kernel<'_, L, P>) -> Result<()>
    where
        L: LambdaTable<P>,
        P: Sync;
}

impl KernelPolicy for SeqExec {
    fn launch_kernel<L, P>(&self, kernel: &Kernel<'_, L, P>) -> Result<()>
    where
        L: LambdaTable<P>,
        P: Sync,
    {
        host::launch(self, kernel)
    }
}

impl KernelPolicy for HostDynamic {
    fn launch_kernel<L, P>(&self, kernel: &Kernel<'_, L, P>) -> Result<()>
    where
        L: LambdaTable<P>,
        P: Sync,
    {
        host::launch(self, kernel)
    }
}

impl<const CHUNK: usize> KernelPolicy for HostStatic<CHUNK> {
    fn launch_kernel<L, P>(&self, kernel: &Kernel<'_, L, P>) -> Result<()>
    where
        L: LambdaTable<P>,
        P: Sync,
    {
        host::launch(self, kernel)
    }
}

impl<const WORKGROUP: usize> KernelPolicy for DeviceExec<WORKGROUP> {
    fn launch_kernel<L, P>(&self, kernel: &Kernel<'_, L, P>) -> Result<()>
    where
        L: LambdaTable<P>,
        P: Sync,
    {
        device::launch(self, kernel)
    }
}

// ============================================================================
// Tests
// ============================================================================
