//! The streaming convolution reverb engine.
//!
//! Lifecycle: `new` → `initialize(sr)` → any number of `set_*` / `process` calls →
//! `cleanup`. Before `initialize` (and after `cleanup`) `process` is a passthrough.
//!
//! Parameter setters only touch plain fields and a dirty flag. The kernel is
//! rebuilt lazily on the next `process` (or eagerly via [`ConvolutionEngine::prepare`]
//! from a non-realtime thread), and every rebuild clears the input history so a
//! new kernel is never convolved against stale input.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use resonar_core::dsp::{linear_gains, soft_knee};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::convolver::{alloc_zeroed, Convolver, Strategy};
use crate::error::{EngineError, Result};
use crate::ir::{generate_impulse_response, kernel_length, IrStats};
use crate::params::{IrType, Param, ReverbParams};

/// Sharpness of the output saturation above the threshold.
const SOFT_KNEE: f32 = 10.0;

/// Wet scratch size; `process` works through longer buffers in chunks of this.
const WET_CHUNK: usize = 1024;

/// Buffers that exist only while the engine is initialized.
#[derive(Debug)]
struct Live {
    /// Capacity `max_kernel_samples`; the active kernel is `kernel[..ir_len]`.
    kernel: Vec<f32>,
    ir_len: usize,
    stats: IrStats,
    convolver: Convolver,
    wet: Vec<f32>,
}

/// Mono convolution reverb with a procedurally generated impulse response.
///
/// `R` is the randomness source for kernel synthesis; seed it (or set
/// [`EngineConfig::seed`]) for reproducible kernels.
#[derive(Debug)]
pub struct ConvolutionEngine<R: Rng = StdRng> {
    config: EngineConfig,
    params: ReverbParams,
    ir_type: IrType,
    kernel_dirty: bool,
    sample_rate: u32,
    rng: R,
    live: Option<Live>,
}

impl ConvolutionEngine<StdRng> {
    /// Engine seeded from `config.seed`, or from OS entropy when unset.
    pub fn new(config: EngineConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }
}

impl Default for ConvolutionEngine<StdRng> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl<R: Rng> ConvolutionEngine<R> {
    pub fn with_rng(config: EngineConfig, rng: R) -> Self {
        Self {
            config,
            params: ReverbParams::default(),
            ir_type: IrType::default(),
            kernel_dirty: true,
            sample_rate: 48_000,
            rng,
            live: None,
        }
    }

    // --------------------------------- lifecycle ----------------------------------

    /// Allocate kernel and history for `sample_rate` and reset parameters and IR
    /// type to the configured starting values (`config.params`, clamped, and
    /// `config.ir_type`). On error the engine stays uninitialized.
    pub fn initialize(&mut self, sample_rate: u32) -> Result<()> {
        if self.live.is_some() {
            warn!(sample_rate, current = self.sample_rate, "initialize on a live engine rejected");
            return Err(EngineError::AlreadyInitialized(self.sample_rate));
        }
        if sample_rate == 0 {
            return Err(EngineError::InvalidSampleRate(sample_rate));
        }
        self.config.validate()?;

        let max_kernel = self.config.max_kernel_samples(sample_rate);
        let live = Live {
            kernel: alloc_zeroed(max_kernel, "kernel")?,
            ir_len: 0,
            stats: IrStats::default(),
            convolver: Convolver::new(
                self.config.convolution,
                max_kernel,
                self.config.partition_size,
                self.config.direct_max_taps,
            )?,
            wet: alloc_zeroed(WET_CHUNK, "wet scratch")?,
        };

        self.live = Some(live);
        self.sample_rate = sample_rate;
        self.params = self.config.params.sanitized();
        self.ir_type = self.config.ir_type;
        self.kernel_dirty = true;
        info!(
            sample_rate,
            max_kernel_samples = max_kernel,
            mode = ?self.config.convolution,
            "convolution engine initialized"
        );
        Ok(())
    }

    /// Release all buffers. Calling it again is a no-op.
    pub fn cleanup(&mut self) {
        if self.live.take().is_some() {
            info!("convolution engine released");
        }
        self.kernel_dirty = true;
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.live.is_some()
    }

    /// Rate of the last successful `initialize` (48 kHz before the first one).
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn version(&self) -> String {
        crate::VERSION.to_string()
    }

    // --------------------------------- parameters ---------------------------------

    /// Clamp and store `value`. Anything but `Mix` marks the kernel dirty.
    pub fn set_parameter(&mut self, param: Param, value: f32) {
        match self.params.set(param, value) {
            Some(stored) => {
                if param.affects_kernel() {
                    self.kernel_dirty = true;
                }
                debug!(%param, value, stored, "parameter set");
            }
            None => warn!(%param, value, "non-finite parameter value ignored"),
        }
    }

    /// Set by boundary id; unknown ids are ignored.
    pub fn set_parameter_id(&mut self, id: u32, value: f32) {
        match Param::from_id(id) {
            Some(param) => self.set_parameter(param, value),
            None => warn!(id, value, "unknown parameter id ignored"),
        }
    }

    /// Set by camelCase name; unknown names are ignored.
    pub fn set_parameter_by_name(&mut self, name: &str, value: f32) {
        match name.parse::<Param>() {
            Ok(param) => self.set_parameter(param, value),
            Err(e) => warn!(%e, value, "parameter name ignored"),
        }
    }

    /// Select the IR character by name (case-insensitive); unknown names are ignored.
    pub fn set_impulse_response_type(&mut self, name: &str) {
        match name.parse::<IrType>() {
            Ok(t) => self.set_ir_type(t),
            Err(e) => warn!(%e, "impulse response type ignored"),
        }
    }

    pub fn set_ir_type(&mut self, ir_type: IrType) {
        if ir_type != self.ir_type {
            debug!(from = %self.ir_type, to = %ir_type, "impulse response type changed");
            self.ir_type = ir_type;
            self.kernel_dirty = true;
        }
    }

    #[inline]
    pub fn params(&self) -> &ReverbParams {
        &self.params
    }

    #[inline]
    pub fn ir_type(&self) -> IrType {
        self.ir_type
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn is_kernel_dirty(&self) -> bool {
        self.kernel_dirty
    }

    /// The active kernel (empty until the first regeneration).
    pub fn kernel(&self) -> &[f32] {
        match &self.live {
            Some(l) => &l.kernel[..l.ir_len],
            None => &[],
        }
    }

    pub fn ir_len(&self) -> usize {
        self.live.as_ref().map_or(0, |l| l.ir_len)
    }

    pub fn ir_stats(&self) -> Option<IrStats> {
        self.live.as_ref().filter(|l| l.ir_len > 0).map(|l| l.stats)
    }

    pub fn convolution_strategy(&self) -> Option<Strategy> {
        self.live.as_ref().map(|l| l.convolver.strategy())
    }

    /// Write cursor of the time-domain history, when that strategy is allocated.
    pub fn history_write_pos(&self) -> Option<usize> {
        self.live.as_ref().and_then(|l| l.convolver.history_write_pos())
    }

    // --------------------------------- processing ---------------------------------

    /// Regenerate the kernel now if it is dirty, so the next `process` call does
    /// no synthesis work.
    pub fn prepare(&mut self) {
        if self.kernel_dirty && self.live.is_some() {
            self.regenerate();
        }
    }

    fn regenerate(&mut self) {
        let Some(live) = self.live.as_mut() else { return };

        let ir_len = kernel_length(self.params.decay_time, self.sample_rate, live.kernel.len());
        let stats = generate_impulse_response(
            &self.params,
            self.ir_type,
            self.sample_rate,
            ir_len,
            self.config.target_peak,
            &mut self.rng,
            &mut live.kernel,
        );
        live.kernel[ir_len..].fill(0.0);
        live.ir_len = ir_len;
        live.stats = stats;
        live.convolver.load(&live.kernel[..ir_len]);
        self.kernel_dirty = false;

        debug!(
            ir_type = %self.ir_type,
            ir_len,
            peak = stats.peak,
            rms = stats.rms,
            norm_gain = stats.norm_gain,
            strategy = ?live.convolver.strategy(),
            "kernel regenerated"
        );
    }

    /// Convolve `input` into `output[..input.len()]`.
    ///
    /// Uninitialized engines copy `input` through unchanged.
    ///
    /// # Panics
    /// If `output` is shorter than `input`.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        let n = input.len();
        assert!(
            output.len() >= n,
            "output holds {} samples but input has {}",
            output.len(),
            n
        );
        let output = &mut output[..n];

        if self.live.is_none() {
            output.copy_from_slice(input);
            return;
        }
        if self.kernel_dirty {
            self.regenerate();
        }
        let Some(live) = self.live.as_mut() else {
            output.copy_from_slice(input);
            return;
        };

        let (dry, wet_gain) = linear_gains(self.params.mix / 100.0);
        let threshold = self.config.soft_clip_threshold;
        let kernel = &live.kernel[..live.ir_len];

        for (x, y) in input.chunks(WET_CHUNK).zip(output.chunks_mut(WET_CHUNK)) {
            let wet = &mut live.wet[..x.len()];
            live.convolver.process(x, kernel, wet);
            for ((out, &dry_in), &w) in y.iter_mut().zip(x).zip(wet.iter()) {
                *out = soft_knee(dry * dry_in + wet_gain * w, threshold, SOFT_KNEE);
            }
        }
    }

    /// Allocating convenience around [`process`](Self::process).
    pub fn process_to_vec(&mut self, input: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0; input.len()];
        self.process(input, &mut out);
        out
    }
}
