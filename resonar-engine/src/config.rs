//! Engine configuration.
//!
//! All fields have defaults, so an empty TOML document is a valid config:
//!
//! ```toml
//! max_kernel_seconds = 15.0
//! target_peak = 0.95
//! soft_clip_threshold = 0.95
//! convolution = "auto"        # "auto" | "direct" | "partitioned"
//! direct_max_taps = 4096
//! partition_size = 1024
//! # seed = 42                 # fix the IR generator's RNG
//! ir_type = "hall"            # starting character after `initialize`
//!
//! # Starting parameters; same names and ranges as the setters.
//! [params]
//! decayTime = 2.5
//! mix = 30.0
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::params::{IrType, ReverbParams};

/// Which convolution strategy the engine runs.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvolutionMode {
    /// Direct form when the kernel is at most `direct_max_taps`, partitioned FFT otherwise.
    #[default]
    Auto,
    /// Always the time-domain ring-buffer form.
    Direct,
    /// Always uniformly partitioned FFT convolution.
    Partitioned,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ceiling on the kernel (and history) length, in seconds of audio.
    pub max_kernel_seconds: f32,
    /// Peak the kernel is normalized to, in (0, 1].
    pub target_peak: f32,
    /// Output level above which the soft knee engages, in (0, 1).
    pub soft_clip_threshold: f32,
    pub convolution: ConvolutionMode,
    /// Largest kernel `Auto` will convolve in the time domain.
    pub direct_max_taps: usize,
    /// FFT partition length in samples (rounded up to a power of two).
    pub partition_size: usize,
    /// Fixed RNG seed; `None` seeds from OS entropy.
    pub seed: Option<u64>,
    /// Parameters `initialize` starts from. Clamped when applied.
    pub params: ReverbParams,
    /// IR character `initialize` starts from.
    pub ir_type: IrType,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_kernel_seconds: 15.0,
            target_peak: 0.95,
            soft_clip_threshold: 0.95,
            convolution: ConvolutionMode::Auto,
            direct_max_taps: 4096,
            partition_size: 1024,
            seed: None,
            params: ReverbParams::default(),
            ir_type: IrType::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: EngineConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_kernel_seconds.is_finite() && self.max_kernel_seconds >= 0.5) {
            return Err(ConfigError::Invalid(format!(
                "max_kernel_seconds must be >= 0.5, got {}",
                self.max_kernel_seconds
            )));
        }
        if !(self.target_peak > 0.0 && self.target_peak <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "target_peak must be in (0, 1], got {}",
                self.target_peak
            )));
        }
        if !(self.soft_clip_threshold > 0.0 && self.soft_clip_threshold < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "soft_clip_threshold must be in (0, 1), got {}",
                self.soft_clip_threshold
            )));
        }
        if self.partition_size < 16 || self.partition_size > 65_536 {
            return Err(ConfigError::Invalid(format!(
                "partition_size must be in [16, 65536], got {}",
                self.partition_size
            )));
        }
        Ok(())
    }

    /// Kernel/history capacity at `sample_rate`.
    pub fn max_kernel_samples(&self, sample_rate: u32) -> usize {
        (self.max_kernel_seconds * sample_rate as f32) as usize
    }

    /// Builder-style seed override, handy in tests.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_mode(mut self, mode: ConvolutionMode) -> Self {
        self.convolution = mode;
        self
    }
}
