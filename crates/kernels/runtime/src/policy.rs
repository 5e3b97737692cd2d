//! Execution policies: compile-time tags that select a backend.
//!
//! A policy is a small immutable value, usually zero-sized, passed by
//! reference to a dispatch call. The call is generic over the policy type, so
//! the backend is chosen by monomorphization and the per-element path carries
//! no runtime branching on the policy.
//!
//! | Policy | Backend | Pattern | Partitioning |
//! |--------|---------|---------|--------------|
//! | [`SeqExec`] | Sequential | Forall | one chunk, in order |
//! | [`HostDynamic`] | Host | Forall | `grain_size` chunks handed out on demand |
//! | [`HostStatic<CHUNK>`] | Host | Forall | `CHUNK` chunks dealt round-robin to workers |
//! | [`DeviceExec<WORKGROUP>`] | Device | Forall | grid of `WORKGROUP`-lane workgroups |
//! | [`SeqReduce`], [`HostReduce`], [`DeviceReduce`] | per backend | Reduce | – |
//! | [`SeqRegion`], [`HostRegion`] | per backend | Region | one call per worker |

use std::fmt;

use crate::config::DeviceLimits;
use crate::error::{Error, Result};

// ============================================================================
// Policy Classification
// ============================================================================

/// Concurrency substrate a policy runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// One logical worker, no concurrency.
    Sequential,
    /// Cooperating OS threads of the host pool.
    Host,
    /// A grid of lightweight lanes launched together.
    Device,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Sequential => "sequential",
            Backend::Host => "host",
            Backend::Device => "device",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Execution pattern a policy is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// Elementwise loops and kernels.
    Forall,
    /// Reducer slot allocation.
    Reduce,
    /// One body invocation per worker.
    Region,
}

/// Where the policy's workers live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Host,
    Device,
}

/// Common interface of every policy tag.
pub trait Policy: Copy + Send + Sync + fmt::Debug + 'static {
    /// Short name used in logs and errors.
    const NAME: &'static str;
    const BACKEND: Backend;
    const PATTERN: Pattern;
    const PLATFORM: Platform;

    /// Check the policy's parameters before anything launches.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Forall Policies
// ============================================================================

/// Sequential execution on the calling thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeqExec;

impl Policy for SeqExec {
    const NAME: &'static str = "seq_exec";
    const BACKEND: Backend = Backend::Sequential;
    const PATTERN: Pattern = Pattern::Forall;
    const PLATFORM: Platform = Platform::Host;
}

/// Host threads with dynamic, load-balanced partitioning.
///
/// The iteration space is cut into chunks of `grain_size` indices that idle
/// workers take on demand. Suited to top-level loops with uneven per-index
/// cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostDynamic {
    grain_size: usize,
}

impl HostDynamic {
    pub fn new(grain_size: usize) -> Self {
        Self { grain_size }
    }

    pub fn grain_size(&self) -> usize {
        self.grain_size
    }
}

impl Default for HostDynamic {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Policy for HostDynamic {
    const NAME: &'static str = "host_dynamic";
    const BACKEND: Backend = Backend::Host;
    const PATTERN: Pattern = Pattern::Forall;
    const PLATFORM: Platform = Platform::Host;

    fn validate(&self) -> Result<()> {
        if self.grain_size == 0 {
            return Err(Error::invalid_policy(Self::NAME, "grain size must be >= 1"));
        }
        Ok(())
    }
}

/// Host threads with static, deterministic partitioning.
///
/// Chunks of `CHUNK` indices are dealt round-robin to workers: chunk `c` runs
/// on worker `c % workers`. The mapping only depends on the iteration count
/// and the pool size, so two loops over equally sized iterables touch the
/// same worker-local data for the same offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStatic<const CHUNK: usize = 1>;

/// Static host policy with single-index chunks.
pub type HostExec = HostStatic<1>;

impl<const CHUNK: usize> HostStatic<CHUNK> {
    const CHUNK_IS_POSITIVE: () = assert!(CHUNK > 0, "static chunk size must be >= 1");

    pub const fn chunk_size(&self) -> usize {
        CHUNK
    }
}

impl<const CHUNK: usize> Policy for HostStatic<CHUNK> {
    const NAME: &'static str = "host_static";
    const BACKEND: Backend = Backend::Host;
    const PATTERN: Pattern = Pattern::Forall;
    const PLATFORM: Platform = Platform::Host;

    fn validate(&self) -> Result<()> {
        let () = Self::CHUNK_IS_POSITIVE;
        Ok(())
    }
}

/// Device-class grid launch with `WORKGROUP` lanes per workgroup.
///
/// Lanes beyond the iteration space are launched to fill the last workgroup
/// and run masked. The policy carries the device limits it is validated
/// against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceExec<const WORKGROUP: usize = 256> {
    limits: DeviceLimits,
}

impl<const WORKGROUP: usize> DeviceExec<WORKGROUP> {
    const WORKGROUP_IS_POSITIVE: () = assert!(WORKGROUP > 0, "workgroup size must be >= 1");

    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default())
    }

    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self { limits }
    }

    pub const fn workgroup_size(&self) -> usize {
        WORKGROUP
    }

    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }
}

impl<const WORKGROUP: usize> Default for DeviceExec<WORKGROUP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const WORKGROUP: usize> Policy for DeviceExec<WORKGROUP> {
    const NAME: &'static str = "device_exec";
    const BACKEND: Backend = Backend::Device;
    const PATTERN: Pattern = Pattern::Forall;
    const PLATFORM: Platform = Platform::Device;

    fn validate(&self) -> Result<()> {
        let () = Self::WORKGROUP_IS_POSITIVE;
        self.limits
            .validate()
            .map_err(|err| Error::invalid_policy(Self::NAME, err.to_string()))?;
        if WORKGROUP > self.limits.max_workgroup_invocations as usize {
            return Err(Error::invalid_policy(
                Self::NAME,
                format!(
                    "workgroup of {WORKGROUP} lanes exceeds device limit of {}",
                    self.limits.max_workgroup_invocations
                ),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Reduce Policies
// ============================================================================

/// Single accumulator, no synchronization needed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeqReduce;

/// One accumulator per host worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostReduce;

/// One accumulator per worker executing device workgroups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceReduce;

impl Policy for SeqReduce {
    const NAME: &'static str = "seq_reduce";
    const BACKEND: Backend = Backend::Sequential;
    const PATTERN: Pattern = Pattern::Reduce;
    const PLATFORM: Platform = Platform::Host;
}

impl Policy for HostReduce {
    const NAME: &'static str = "host_reduce";
    const BACKEND: Backend = Backend::Host;
    const PATTERN: Pattern = Pattern::Reduce;
    const PLATFORM: Platform = Platform::Host;
}

impl Policy for DeviceReduce {
    const NAME: &'static str = "device_reduce";
    const BACKEND: Backend = Backend::Device;
    const PATTERN: Pattern = Pattern::Reduce;
    const PLATFORM: Platform = Platform::Device;
}

// ============================================================================
// Region Policies
// ============================================================================

/// Region executed once on the calling thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeqRegion;

/// Region executed once on every host worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostRegion;

impl Policy for SeqRegion {
    const NAME: &'static str = "seq_region";
    const BACKEND: Backend = Backend::Sequential;
    const PATTERN: Pattern = Pattern::Region;
    const PLATFORM: Platform = Platform::Host;
}

impl Policy for HostRegion {
    const NAME: &'static str = "host_region";
    const BACKEND: Backend = Backend::Host;
    const PATTERN: Pattern = Pattern::Region;
    const PLATFORM: Platform = Platform::Host;
}

// ============================================================================
// Tests
// ============================================================================
