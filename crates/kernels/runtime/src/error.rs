//! Runtime errors for policy dispatch and kernel execution.
//!
//! # Error Categories
//!
//! - **Configuration errors**: [`Error::InvalidPolicy`], [`Error::InvalidSegment`],
//!   [`Error::InvalidConfig`], [`Error::DimensionOutOfRange`],
//!   [`Error::LambdaOutOfRange`], [`Error::ArgumentOutOfRange`],
//!   [`Error::LaunchTooLarge`]
//! - **Execution errors**: [`Error::DeviceFault`], [`Error::BodyFault`]
//! - **Environment errors**: [`Error::ThreadPool`], [`Error::ConfigParse`], [`Error::Io`]
//!
//! # Error Handling Policy
//!
//! Configuration errors are always reported before any worker launches, so a
//! rejected dispatch never runs part of its iteration space. The engine does
//! not retry and does not recover partial results: a faulted batch is
//! reported once, at the barrier that ends the dispatch call.

use thiserror::Error;

use crate::types::Index;

/// Runtime result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while dispatching loops, reductions and kernels.
#[derive(Debug, Error)]
pub enum Error {
    /// A policy carries a parameter the backend cannot honor.
    ///
    /// Raised for a zero grain size, or for a device workgroup larger than
    /// the configured device limit.
    #[error("invalid policy {policy}: {message}")]
    InvalidPolicy {
        /// Name of the offending policy.
        policy: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// A segment could not be constructed.
    #[error("invalid segment: {0}")]
    InvalidSegment(String),

    /// A For statement names a segment the kernel does not declare.
    #[error("loop dimension {dim} out of range for kernel with {dims} segments")]
    DimensionOutOfRange {
        /// Dimension named by the statement.
        dim: usize,
        /// Number of segments bound to the kernel.
        dims: usize,
    },

    /// A Lambda statement names a callable the lambda table does not hold.
    #[error("lambda index {index} out of range for table of {len} lambdas")]
    LambdaOutOfRange {
        /// Lambda index named by the statement.
        index: usize,
        /// Number of callables in the table.
        len: usize,
    },

    /// An argument descriptor binds something the kernel does not declare.
    #[error("argument {position} of lambda {lambda} out of range: {message}")]
    ArgumentOutOfRange {
        /// Lambda index of the offending statement.
        lambda: usize,
        /// Position of the descriptor in the argument list.
        position: usize,
        /// Description of the missing binding.
        message: String,
    },

    /// The launch grid cannot be expressed within the device limits.
    #[error("launch of {lanes} lanes exceeds device grid limits: {message}")]
    LaunchTooLarge {
        /// Number of lanes the launch shape requires.
        lanes: usize,
        /// Which limit was exceeded.
        message: String,
    },

    /// A device-class launch faulted.
    ///
    /// Lane panics are not reported individually; the whole launch fails
    /// with the first captured message.
    #[error("device launch faulted: {0}")]
    DeviceFault(String),

    /// A fallible loop body returned an error and the batch was aborted.
    #[error("loop body failed at index {index}: {message}")]
    BodyFault {
        /// Index whose body invocation failed.
        index: Index,
        /// The body's error, rendered.
        message: String,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The host worker pool could not be built.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// A configuration file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid_policy(policy: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidPolicy {
            policy,
            message: message.into(),
        }
    }
}
