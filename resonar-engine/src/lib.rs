//! Resonar Engine — procedural impulse responses + streaming convolution.
//!
//! Crate layout:
//! - [`params`]    : parameter ids, names, ranges and IR characters
//! - [`ir`]        : impulse-response synthesis (early reflections, tail, shaping)
//! - [`convolver`] : direct and FFT-partitioned streaming convolution
//! - [`engine`]    : `ConvolutionEngine`, the stateful realtime front end
//! - [`config`]    : TOML-backed engine configuration
//! - [`error`]     : error types
//!
//! The engine allocates everything in `initialize`; `process` never allocates.
//! Parameter changes are cheap: they mark the kernel dirty and the next
//! `process` (or an explicit `prepare`) rebuilds it.

pub mod config;
pub mod convolver;
pub mod engine;
pub mod error;
pub mod ir;
pub mod params;

/// Crate version, as reported by [`ConvolutionEngine::version`].
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export the commonly used items to make downstream imports ergonomic.
pub use config::{ConvolutionMode, EngineConfig};
pub use convolver::Strategy;
pub use engine::ConvolutionEngine;
pub use error::{ConfigError, EngineError, Result};
pub use ir::{generate_impulse_response, kernel_length, synthesize, IrStats};
pub use params::{IrType, Param, ReverbParams, UnknownName};
