//! Device-class statement walk.
//!
//! # Architecture
//!
//! ```text
//! LaunchShape [6, 3] = 18 lanes ── LaunchGrid (WORKGROUP = 8) ── 3 groups, 24 lanes
//!
//! group g (runs on one pool worker)
//!   lane l: id = g * 8 + l, coords = shape.coords(id), active = id < 18
//!
//!   statement 1 ──▶ all 8 lanes
//!   statement 2 ──▶ all 8 lanes            Sync is free: every lane finished
//!   ...                                    the previous statement
//! ```
//!
//! Every lane walks the whole tree. A parallel loop at depth `d` maps the
//! lane's `d`-th coordinate onto its offset; lanes whose coordinate is past
//! the loop's length, or whose id is past the shape, walk the skeleton with
//! `active == false` and never invoke a lambda. A lambda nested under fewer
//! parallel loops than the shape's rank runs only on the lanes whose deeper
//! coordinates are all zero.

use rayon::prelude::*;
use tracing::debug;

use crate::error::{Error, Result};
use crate::forall::catch_device_fault;
use crate::grid::LaunchGrid;
use crate::policy::DeviceExec;

use super::data::{KernelData, LambdaTable};
use super::shape::{LaunchShape, calculate_dimensions};
use super::{Kernel, LoopExec, Statement};

/// One lane of a workgroup.
struct Lane<'k, P> {
    data: KernelData<'k, P>,
    coords: Vec<usize>,
    active: bool,
}

impl<P> Lane<'_, P> {
    /// Whether this lane is the one that runs a statement at `depth`.
    ///
    /// Statements shallower than the launch shape are replicated across the
    /// deeper coordinates; only the lane at coordinate 0 in each of them
    /// runs them.
    fn leads(&self, depth: usize) -> bool {
        self.active && self.coords.iter().skip(depth).all(|&coord| coord == 0)
    }
}

pub(crate) fn launch<const WORKGROUP: usize, L, P>(
    policy: &DeviceExec<WORKGROUP>,
    kernel: &Kernel<'_, L, P>,
) -> Result<()>
where
    L: LambdaTable<P>,
    P: Sync,
{
    let prototype = kernel.data();
    let shape = calculate_dimensions(kernel.body(), &prototype);
    let lanes = shape.checked_size().ok_or_else(|| Error::LaunchTooLarge {
        lanes: usize::MAX,
        message: format!("launch shape {:?} overflows the lane count", shape.extents()),
    })?;
    let grid = LaunchGrid::new(lanes, WORKGROUP, policy.limits())?;
    debug!(
        extents = ?shape.extents(),
        lanes = grid.launched_lanes(),
        workgroups = grid.active_groups(),
        "device kernel launch"
    );

    catch_device_fault(|| {
        (0..grid.active_groups()).into_par_iter().for_each(|group| {
            run_workgroup(group, &grid, &shape, kernel, &prototype);
        })
    })
}

fn run_workgroup<L, P>(
    group: usize,
    grid: &LaunchGrid,
    shape: &LaunchShape,
    kernel: &Kernel<'_, L, P>,
    prototype: &KernelData<'_, P>,
) where
    L: LambdaTable<P>,
{
    let workgroup_size = grid.workgroup_size();
    let live = grid.live_lanes();
    let mut lanes: Vec<Lane<'_, P>> = (0..workgroup_size)
        .map(|lane| {
            let id = group * workgroup_size + lane;
            Lane {
                data: prototype.clone(),
                coords: shape.coords(id),
                active: id < live,
            }
        })
        .collect();

    exec_lanes(kernel.body(), kernel.lambdas(), &mut lanes, 0);
}

fn exec_lanes<L, P>(statements: &[Statement], lambdas: &L, lanes: &mut [Lane<'_, P>], depth: usize)
where
    L: LambdaTable<P>,
{
    for statement in statements {
        match statement {
            Statement::Lambda { index, args } => {
                for lane in lanes.iter_mut().filter(|lane| lane.leads(depth)) {
                    lane.data.invoke(lambdas, *index, args.as_deref());
                }
            }
            // Lanes advance statement by statement, so the barrier holds.
            Statement::Sync => {}
            Statement::For {
                dim,
                exec: LoopExec::Parallel,
                body,
            } => {
                let len = lanes.first().map_or(0, |lane| lane.data.segment_len(*dim));
                let saved: Vec<bool> = lanes.iter().map(|lane| lane.active).collect();
                for lane in lanes.iter_mut() {
                    let coord = lane.coords.get(depth).copied().unwrap_or(0);
                    lane.data.set_offset(*dim, coord);
                    lane.active &= coord < len;
                }

                exec_lanes(body, lambdas, lanes, depth + 1);

                for (lane, active) in lanes.iter_mut().zip(saved) {
                    lane.data.unbind(*dim);
                    lane.active = active;
                }
            }
            Statement::For {
                dim,
                exec: LoopExec::Seq,
                body,
            } => {
                let len = lanes.first().map_or(0, |lane| lane.data.segment_len(*dim));
                for offset in 0..len {
                    for lane in lanes.iter_mut() {
                        lane.data.set_offset(*dim, offset);
                    }
                    exec_lanes(body, lambdas, lanes, depth);
                }
                for lane in lanes.iter_mut() {
                    lane.data.unbind(*dim);
                }
            }
        }
    }
}
