//! Error types for the GPU adapter probe.

use thiserror::Error;

/// Errors that can occur while probing a GPU adapter.
#[derive(Error, Debug)]
pub enum GpuError {
    /// No compatible GPU adapter was found.
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    /// The adapter reported limits the runtime cannot launch with.
    #[error("adapter reported unusable limits: {0}")]
    InvalidLimits(#[from] nestor_runtime::Error),

    /// GPU feature not enabled.
    #[error("GPU feature not enabled - compile with --features gpu")]
    FeatureNotEnabled,
}
