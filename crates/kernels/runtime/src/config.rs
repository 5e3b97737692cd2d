//! Runtime configuration.
//!
//! Configuration is explicit and injected: a [`RuntimeConfig`] is validated
//! once when a [`Runtime`](crate::Runtime) is built, and the pieces the
//! engine needs (grain size, device limits, data layout) are handed to the
//! policies and buffers that use them. Nothing is read from globals.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker threads in the host pool. `0` lets rayon decide.
    pub num_threads: usize,
    /// Default grain size for dynamically partitioned loops.
    pub grain_size: usize,
    /// Data layout hints for the data-access layer.
    pub layout: DataLayout,
    /// Launch limits of the device-class backend.
    pub device: DeviceLimits,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            num_threads: 0,
            grain_size: 1,
            layout: DataLayout::default(),
            device: DeviceLimits::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.grain_size == 0 {
            return Err(Error::InvalidConfig("grain_size must be > 0".to_string()));
        }
        self.layout.validate()?;
        self.device.validate()
    }
}

/// Alignment hint for buffers shared with loop bodies.
///
/// Replaces compiler-specific aligned/restrict pointer typedefs: the hint is
/// resolved once, where buffers are allocated, and never threaded through
/// the engine's own types. Exclusive access needs no hint in Rust, so only
/// alignment is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataLayout {
    /// Byte alignment of the first element. Must be a power of two.
    pub alignment: usize,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self { alignment: 64 }
    }
}

impl DataLayout {
    pub fn validate(&self) -> Result<()> {
        if !self.alignment.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "layout.alignment must be a power of two, got {}",
                self.alignment
            )));
        }
        Ok(())
    }
}

/// Launch limits of a device-class backend.
///
/// Defaults match the portable limits every wgpu adapter guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceLimits {
    /// Maximum lanes in one workgroup.
    pub max_workgroup_invocations: u32,
    /// Maximum workgroups along each grid dimension.
    pub max_workgroups_per_dimension: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_workgroup_invocations: 256,
            max_workgroups_per_dimension: 65_535,
        }
    }
}

impl DeviceLimits {
    pub fn validate(&self) -> Result<()> {
        if self.max_workgroup_invocations == 0 {
            return Err(Error::InvalidConfig(
                "device.max_workgroup_invocations must be > 0".to_string(),
            ));
        }
        if self.max_workgroups_per_dimension == 0 {
            return Err(Error::InvalidConfig(
                "device.max_workgroups_per_dimension must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grain_size, 1);
        assert_eq!(config.device.max_workgroup_invocations, 256);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = RuntimeConfig::from_json_str(r#"{ "num_threads": 3 }"#).unwrap();
        assert_eq!(config.num_threads, 3);
        assert_eq!(config.layout, DataLayout::default());
        assert_eq!(config.device, DeviceLimits::default());
    }

    #[test]
    fn test_rejects_zero_grain() {
        let err = RuntimeConfig::from_json_str(r#"{ "grain_size": 0 }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_unaligned_layout() {
        let config = RuntimeConfig {
            layout: DataLayout { alignment: 48 },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_malformed_json() {
        let err = RuntimeConfig::from_json_str("{ num_threads: }").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nestor.json");
        let json = r#"{ "grain_size": 8, "device": { "max_workgroup_invocations": 1024 } }"#;
        std::fs::write(&path, json).unwrap();

        let config = RuntimeConfig::from_path(&path).unwrap();
        assert_eq!(config.grain_size, 8);
        assert_eq!(config.device.max_workgroup_invocations, 1024);
        assert_eq!(config.device.max_workgroups_per_dimension, 65_535);
    }
}
