//! wgpu adapter selection.
//!
//! The [`AdapterProbe`] asks wgpu for the best available adapter and reads
//! its compute limits. No device or queue is created: the limits are all
//! the runtime needs to size its device-class grids.

use nestor_runtime::DeviceLimits;

use crate::error::GpuError;
use crate::limits_from;

/// A selected GPU adapter and the compute limits it reports.
pub struct AdapterProbe {
    adapter_info: wgpu::AdapterInfo,
    limits: wgpu::Limits,
}

impl AdapterProbe {
    /// Probe with default options.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::NoAdapter`] if no compatible GPU is found.
    pub fn new() -> Result<Self, GpuError> {
        Self::with_options(ProbeOptions::default())
    }

    pub fn with_options(options: ProbeOptions) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: options.backends,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: options.power_preference,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|_| GpuError::NoAdapter)?;

        let adapter_info = adapter.get_info();
        let limits = adapter.limits();
        tracing::info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            max_invocations = limits.max_compute_invocations_per_workgroup,
            max_workgroups = limits.max_compute_workgroups_per_dimension,
            "GPU adapter selected"
        );

        Ok(Self {
            adapter_info,
            limits,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_info.name
    }

    pub fn backend(&self) -> wgpu::Backend {
        self.adapter_info.backend
    }

    /// Device type (discrete, integrated, etc.).
    pub fn device_type(&self) -> wgpu::DeviceType {
        self.adapter_info.device_type
    }

    /// The adapter's compute limits in runtime terms.
    pub fn device_limits(&self) -> Result<DeviceLimits, GpuError> {
        limits_from(
            self.limits.max_compute_invocations_per_workgroup,
            self.limits.max_compute_workgroups_per_dimension,
        )
    }
}

/// Options for adapter selection.
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// Backend APIs to consider.
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::PRIMARY,
            power_preference: wgpu::PowerPreference::HighPerformance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Run with: cargo test --features gpu -- --ignored

    #[test]
    #[ignore = "requires GPU"]
    fn test_probe_reports_limits() {
        let probe = AdapterProbe::new().unwrap();
        println!("Adapter: {}", probe.adapter_name());
        println!("Backend: {:?}", probe.backend());
        println!("Device type: {:?}", probe.device_type());

        let limits = probe.device_limits().unwrap();
        assert!(limits.max_workgroup_invocations >= 1);
        assert!(limits.max_workgroups_per_dimension >= 1);
    }
}
