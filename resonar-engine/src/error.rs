//! Engine error types.
//!
//! Only resource-level failures surface as errors. Parameter anomalies (out of
//! range values, unknown ids, unknown IR type names) are absorbed where they
//! occur and never reach this module.

use thiserror::Error;

/// Result type alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors returned by [`ConvolutionEngine::initialize`](crate::ConvolutionEngine::initialize)
/// and configuration loading.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Sample rate of zero.
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    /// `initialize` called on a live engine; call `cleanup` first.
    #[error("Engine is already initialized at {0} Hz")]
    AlreadyInitialized(u32),

    /// A kernel/history/partition buffer could not be allocated.
    #[error("Failed to allocate {what} ({samples} samples)")]
    Allocation { what: &'static str, samples: usize },

    /// Rejected engine configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error while reading a config file.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed TOML.
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Well-formed but out-of-range settings.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl EngineError {
    /// Stable integer code used across the C boundary (0 is success).
    pub fn code(&self) -> i32 {
        match self {
            EngineError::InvalidSampleRate(_) => -1,
            EngineError::AlreadyInitialized(_) => -2,
            EngineError::Allocation { .. } => -3,
            EngineError::Config(_) => -4,
        }
    }
}
