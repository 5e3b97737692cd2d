//! The host worker pool and the policies it hands out.

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{info, instrument};

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::partition::auto_grain_size;
use crate::policy::{DeviceExec, HostDynamic};

/// A dedicated worker pool configured from a [`RuntimeConfig`].
///
/// Dispatch calls made inside [`Runtime::install`] run on this pool; the
/// reducers, regions and static schedules they use see its worker count.
pub struct Runtime {
    config: RuntimeConfig,
    pool: ThreadPool,
}

impl Runtime {
    /// Validate `config` and build the worker pool.
    #[instrument(skip_all, name = "runtime_new", fields(num_threads = config.num_threads))]
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .thread_name(|i| format!("nestor-worker-{i}"))
            .build()?;

        info!(
            workers = pool.current_num_threads(),
            grain_size = config.grain_size,
            alignment = config.layout.alignment,
            "runtime created"
        );
        Ok(Self { config, pool })
    }

    /// Run `op` on the worker pool and wait for its result.
    pub fn install<R, OP>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    pub fn num_workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Dynamic policy with the configured grain size.
    pub fn dynamic_policy(&self) -> HostDynamic {
        HostDynamic::new(self.config.grain_size)
    }

    /// Dynamic policy with a grain sized for `len` iterations on this pool.
    pub fn auto_dynamic_policy(&self, len: usize) -> HostDynamic {
        HostDynamic::new(auto_grain_size(len, self.num_workers()))
    }

    /// Device policy bound to the configured device limits.
    pub fn device_policy<const WORKGROUP: usize>(&self) -> DeviceExec<WORKGROUP> {
        DeviceExec::with_limits(self.config.device)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("workers", &self.num_workers())
            .field("config", &self.config)
            .finish()
    }
}
