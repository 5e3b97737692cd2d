//! Parallel regions: one body invocation per worker.
//!
//! A region is the building block for per-worker setup and teardown, such as
//! allocating worker-local scratch before a statically partitioned loop
//! reuses it.

use tracing::instrument;

use crate::error::Result;
use crate::policy::{HostRegion, Policy, SeqRegion};

/// Backend primitive of a region policy.
pub trait RegionPolicy: Policy {
    /// Invoke `body(worker)` once on every worker and wait for all of them.
    fn for_each_worker<F>(&self, body: F)
    where
        F: Fn(usize) + Sync;
}

impl RegionPolicy for SeqRegion {
    fn for_each_worker<F>(&self, body: F)
    where
        F: Fn(usize) + Sync,
    {
        body(0);
    }
}

impl RegionPolicy for HostRegion {
    fn for_each_worker<F>(&self, body: F)
    where
        F: Fn(usize) + Sync,
    {
        rayon::broadcast(|ctx| body(ctx.index()));
    }
}

/// Run `body(worker_id)` once per worker of the region policy's backend.
///
/// Worker ids match the worker numbering of static forall partitioning in
/// the same pool.
#[instrument(skip_all, name = "region", fields(policy = P::NAME))]
pub fn region<P, F>(policy: &P, body: F) -> Result<()>
where
    P: RegionPolicy,
    F: Fn(usize) + Sync,
{
    policy.validate()?;
    policy.for_each_worker(body);
    Ok(())
}
