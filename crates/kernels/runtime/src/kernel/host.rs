//! Host-side statement walk.
//!
//! The outermost parallel loop on every path is distributed through the
//! policy's forall primitive; each chunk walks the subtree with its own copy
//! of the context. Loops below it, and all sequential loops, iterate inside
//! the worker. Host workers never overshoot, so every walk is active.

use tracing::trace;

use crate::error::Result;
use crate::forall::ForallPolicy;

use super::data::{KernelData, LambdaTable};
use super::{Kernel, LoopExec, Statement};

pub(crate) fn launch<FP, L, P>(policy: &FP, kernel: &Kernel<'_, L, P>) -> Result<()>
where
    FP: ForallPolicy,
    L: LambdaTable<P>,
    P: Sync,
{
    let mut data = kernel.data();
    policy.launch(1, || walk(policy, kernel.body(), &mut data, kernel.lambdas(), true))
}

fn walk<FP, L, P>(
    policy: &FP,
    statements: &[Statement],
    data: &mut KernelData<'_, P>,
    lambdas: &L,
    distribute: bool,
) where
    FP: ForallPolicy,
    L: LambdaTable<P>,
    P: Sync,
{
    for statement in statements {
        match statement {
            Statement::Lambda { index, args } => data.invoke(lambdas, *index, args.as_deref()),
            // Every distributed loop already ends in the policy's barrier.
            Statement::Sync => {}
            Statement::For { dim, exec, body } => {
                let dim = *dim;
                let len = data.segment_len(dim);
                if distribute && *exec == LoopExec::Parallel {
                    trace!(dim, len, "distribute loop");
                    let prototype = data.clone();
                    policy.for_each_chunk(len, |offsets| {
                        let mut local = prototype.clone();
                        for offset in offsets {
                            local.set_offset(dim, offset);
                            walk(policy, body, &mut local, lambdas, false);
                        }
                    });
                } else {
                    for offset in 0..len {
                        data.set_offset(dim, offset);
                        walk(policy, body, data, lambdas, distribute);
                    }
                }
                data.unbind(dim);
            }
        }
    }
}
