//! GPU adapter probe for nestor device launches.
//!
//! The runtime emulates device-class execution on the host, but sizes its
//! grids against [`DeviceLimits`]. This crate fills those limits in from a
//! real adapter so a launch that would not fit the hardware is rejected
//! the same way it would be on the device.
//!
//! # Feature Gate
//!
//! wgpu is only pulled in with the `gpu` feature. Without it every probe
//! returns [`GpuError::FeatureNotEnabled`] and [`configure_device_limits`]
//! keeps the configured defaults.

#[cfg(feature = "gpu")]
mod context;

mod error;

#[cfg(feature = "gpu")]
pub use context::{AdapterProbe, ProbeOptions};

pub use error::GpuError;

use nestor_runtime::{DeviceLimits, RuntimeConfig};
use tracing::warn;

/// Limits of the best available adapter.
///
/// # Errors
///
/// Returns [`GpuError::FeatureNotEnabled`] when built without `gpu`, and
/// [`GpuError::NoAdapter`] when no adapter is present.
#[cfg(feature = "gpu")]
pub fn probe_device_limits() -> Result<DeviceLimits, GpuError> {
    AdapterProbe::new()?.device_limits()
}

#[cfg(not(feature = "gpu"))]
pub fn probe_device_limits() -> Result<DeviceLimits, GpuError> {
    Err(GpuError::FeatureNotEnabled)
}

/// Replace `config.device` with probed limits.
///
/// Returns whether the probe succeeded. On failure the configured limits
/// stay in place and the reason is logged.
pub fn configure_device_limits(config: &mut RuntimeConfig) -> bool {
    match probe_device_limits() {
        Ok(limits) => {
            config.device = limits;
            true
        }
        Err(err) => {
            warn!(error = %err, "keeping configured device limits");
            false
        }
    }
}

/// Build runtime limits from raw adapter values.
pub(crate) fn limits_from(
    max_workgroup_invocations: u32,
    max_workgroups_per_dimension: u32,
) -> Result<DeviceLimits, GpuError> {
    let limits = DeviceLimits {
        max_workgroup_invocations,
        max_workgroups_per_dimension,
    };
    limits.validate()?;
    Ok(limits)
}
