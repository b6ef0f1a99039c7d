//! Streaming convolution of the input against the current kernel.
//!
//! Two strategies share one contract (`load`, `reset`, `process`), and give the
//! same output within f32 rounding:
//!
//! - [`DirectConvolver`]: a circular history of past input,
//!   `wet[n] = Σ_j history[(pos - j) mod cap] · kernel[j]`. O(len) per sample;
//!   only sensible for short kernels.
//! - [`PartitionedConvolver`]: zero-latency uniformly partitioned FFT convolution.
//!   The kernel is cut into `B`-sample partitions, each transformed once at load
//!   time; input arrives in `B`-sample blocks, and partial blocks are handled by
//!   re-transforming the partially filled block on every call.
//!
//! All buffers are sized for the longest kernel at construction, so loading a new
//! kernel never allocates.

use std::sync::Arc;

use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

use crate::config::ConvolutionMode;
use crate::error::{EngineError, Result};

/// Allocate a zero-filled buffer, reporting failure instead of aborting.
pub(crate) fn alloc_zeroed<T: Clone + Default>(len: usize, what: &'static str) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| EngineError::Allocation { what, samples: len })?;
    v.resize(len, T::default());
    Ok(v)
}

// ----------------------------------- Direct ---------------------------------------

/// Time-domain convolution over a circular input history.
#[derive(Clone, Debug)]
pub struct DirectConvolver {
    history: Vec<f32>,
    write_pos: usize,
}

impl DirectConvolver {
    /// History of `capacity` samples (the longest kernel that can be convolved).
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self {
            history: alloc_zeroed(capacity.max(1), "convolution history")?,
            write_pos: 0,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.history.len()
    }

    #[inline]
    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Zero the history and rewind the write cursor.
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.write_pos = 0;
    }

    /// Push one input sample and return the wet sample against `kernel`.
    #[inline]
    pub fn push(&mut self, x: f32, kernel: &[f32]) -> f32 {
        let cap = self.history.len();
        let pos = self.write_pos;
        self.history[pos] = x;

        let taps = kernel.len().min(cap);
        // history[pos], history[pos-1], … pair with kernel[0], kernel[1], …
        let head = taps.min(pos + 1);
        let mut acc = 0.0_f32;
        for (h, k) in self.history[..=pos].iter().rev().zip(&kernel[..head]) {
            acc += h * k;
        }
        // …then wrap around to history[cap-1], history[cap-2], …
        if taps > head {
            let rem = taps - head;
            for (h, k) in self.history[cap - rem..].iter().rev().zip(&kernel[head..taps]) {
                acc += h * k;
            }
        }

        self.write_pos = if pos + 1 == cap { 0 } else { pos + 1 };
        acc
    }

    pub fn process(&mut self, input: &[f32], kernel: &[f32], wet: &mut [f32]) {
        for (w, &x) in wet.iter_mut().zip(input) {
            *w = self.push(x, kernel);
        }
    }
}

// --------------------------------- Partitioned ------------------------------------

/// Uniformly partitioned overlap-add FFT convolution with zero added latency.
pub struct PartitionedConvolver {
    block: usize,
    fft_forward: Arc<dyn RealToComplex<f32>>,
    fft_inverse: Arc<dyn ComplexToReal<f32>>,
    fwd_scratch: Vec<Complex<f32>>,
    inv_scratch: Vec<Complex<f32>>,
    /// Spectra of the kernel partitions (only the first `active` are meaningful).
    ir_segments: Vec<Vec<Complex<f32>>>,
    /// Spectra of recent input blocks, a ring indexed from `current`.
    in_segments: Vec<Vec<Complex<f32>>>,
    active: usize,
    current: usize,
    fft_buffer: Vec<f32>,
    input_buffer: Vec<f32>,
    fill: usize,
    pre_multiplied: Vec<Complex<f32>>,
    conv: Vec<Complex<f32>>,
    overlap: Vec<f32>,
}

impl core::fmt::Debug for PartitionedConvolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PartitionedConvolver")
            .field("block", &self.block)
            .field("partitions", &self.ir_segments.len())
            .field("active", &self.active)
            .finish()
    }
}

impl PartitionedConvolver {
    /// Room for kernels up to `max_kernel` samples, partitioned into blocks of
    /// `block_size` (rounded up to a power of two).
    pub fn with_capacity(max_kernel: usize, block_size: usize) -> Result<Self> {
        let block = block_size.max(1).next_power_of_two();
        let seg_size = 2 * block;
        let bins = seg_size / 2 + 1;
        let seg_count = max_kernel.max(1).div_ceil(block);

        let mut planner = RealFftPlanner::<f32>::new();
        let fft_forward = planner.plan_fft_forward(seg_size);
        let fft_inverse = planner.plan_fft_inverse(seg_size);
        let fwd_scratch = fft_forward.make_scratch_vec();
        let inv_scratch = fft_inverse.make_scratch_vec();

        let mut ir_segments = Vec::new();
        let mut in_segments = Vec::new();
        for (segs, what) in [
            (&mut ir_segments, "kernel partitions"),
            (&mut in_segments, "input partitions"),
        ] {
            segs.try_reserve_exact(seg_count)
                .map_err(|_| EngineError::Allocation { what, samples: seg_count * bins })?;
            for _ in 0..seg_count {
                segs.push(alloc_zeroed(bins, what)?);
            }
        }

        Ok(Self {
            block,
            fft_forward,
            fft_inverse,
            fwd_scratch,
            inv_scratch,
            ir_segments,
            in_segments,
            active: 0,
            current: 0,
            fft_buffer: alloc_zeroed(seg_size, "fft buffer")?,
            input_buffer: alloc_zeroed(block, "input block")?,
            fill: 0,
            pre_multiplied: alloc_zeroed(bins, "fft accumulator")?,
            conv: alloc_zeroed(bins, "fft accumulator")?,
            overlap: alloc_zeroed(block, "overlap")?,
        })
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block
    }

    /// Longest kernel this instance can hold.
    #[inline]
    pub fn max_kernel(&self) -> usize {
        self.ir_segments.len() * self.block
    }

    /// Transform `kernel` into partitions and clear all input state.
    ///
    /// # Panics
    /// If `kernel` is longer than [`max_kernel`](Self::max_kernel).
    pub fn load(&mut self, kernel: &[f32]) {
        assert!(
            kernel.len() <= self.max_kernel(),
            "kernel of {} samples exceeds partitioned capacity {}",
            kernel.len(),
            self.max_kernel()
        );
        self.active = kernel.len().div_ceil(self.block);
        for (i, part) in kernel.chunks(self.block).enumerate() {
            copy_and_pad(&mut self.fft_buffer, part);
            let res = self.fft_forward.process_with_scratch(
                &mut self.fft_buffer,
                &mut self.ir_segments[i],
                &mut self.fwd_scratch,
            );
            debug_assert!(res.is_ok(), "forward fft buffers are sized by the planner");
        }
        self.reset();
    }

    /// Forget all past input; the loaded kernel is kept.
    pub fn reset(&mut self) {
        for seg in &mut self.in_segments {
            seg.fill(Complex::new(0.0, 0.0));
        }
        self.pre_multiplied.fill(Complex::new(0.0, 0.0));
        self.conv.fill(Complex::new(0.0, 0.0));
        self.fft_buffer.fill(0.0);
        self.input_buffer.fill(0.0);
        self.overlap.fill(0.0);
        self.fill = 0;
        self.current = 0;
    }

    /// Convolve `input`, writing the wet signal to `wet[..input.len()]`.
    pub fn process(&mut self, input: &[f32], wet: &mut [f32]) {
        let n = input.len().min(wet.len());
        if self.active == 0 {
            wet[..n].fill(0.0);
            return;
        }

        let block = self.block;
        let scale = 1.0 / (2 * block) as f32;
        let mut done = 0;
        while done < n {
            let was_empty = self.fill == 0;
            let pos = self.fill;
            let take = (n - done).min(block - pos);
            self.input_buffer[pos..pos + take].copy_from_slice(&input[done..done + take]);

            copy_and_pad(&mut self.fft_buffer, &self.input_buffer);
            let res = self.fft_forward.process_with_scratch(
                &mut self.fft_buffer,
                &mut self.in_segments[self.current],
                &mut self.fwd_scratch,
            );
            debug_assert!(res.is_ok(), "forward fft buffers are sized by the planner");

            // Older blocks only change once per block; cache their sum.
            if was_empty {
                self.pre_multiplied.fill(Complex::new(0.0, 0.0));
                for k in 1..self.active {
                    let idx = (self.current + k) % self.active;
                    multiply_accumulate(
                        &mut self.pre_multiplied,
                        &self.ir_segments[k],
                        &self.in_segments[idx],
                    );
                }
            }
            self.conv.copy_from_slice(&self.pre_multiplied);
            multiply_accumulate(
                &mut self.conv,
                &self.ir_segments[0],
                &self.in_segments[self.current],
            );

            // DC and Nyquist bins of a real signal's spectrum are real.
            let last = self.conv.len() - 1;
            self.conv[0].im = 0.0;
            self.conv[last].im = 0.0;
            let res = self.fft_inverse.process_with_scratch(
                &mut self.conv,
                &mut self.fft_buffer,
                &mut self.inv_scratch,
            );
            debug_assert!(res.is_ok(), "inverse fft input must have real DC and Nyquist bins");

            for ((w, &y), &o) in wet[done..done + take]
                .iter_mut()
                .zip(&self.fft_buffer[pos..pos + take])
                .zip(&self.overlap[pos..pos + take])
            {
                *w = y * scale + o;
            }

            self.fill += take;
            if self.fill == block {
                self.input_buffer.fill(0.0);
                self.fill = 0;
                for (o, &y) in self.overlap.iter_mut().zip(&self.fft_buffer[block..]) {
                    *o = y * scale;
                }
                self.current = if self.current > 0 { self.current - 1 } else { self.active - 1 };
            }
            done += take;
        }
    }
}

/// Copy `src` to the front of `dst` and zero the rest.
#[inline]
fn copy_and_pad(dst: &mut [f32], src: &[f32]) {
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src[..n]);
    dst[n..].fill(0.0);
}

#[inline]
fn multiply_accumulate(acc: &mut [Complex<f32>], a: &[Complex<f32>], b: &[Complex<f32>]) {
    for ((r, x), y) in acc.iter_mut().zip(a).zip(b) {
        *r += *x * *y;
    }
}

// ----------------------------------- Facade ---------------------------------------

/// Which strategy is currently running.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    Direct,
    Partitioned,
}

/// Owns the buffers of whichever strategies the mode may need and routes
/// `process` to the one picked for the current kernel.
#[derive(Debug)]
pub struct Convolver {
    mode: ConvolutionMode,
    direct_max_taps: usize,
    direct: Option<DirectConvolver>,
    partitioned: Option<PartitionedConvolver>,
    active: Strategy,
}

impl Convolver {
    pub fn new(
        mode: ConvolutionMode,
        max_kernel: usize,
        partition_size: usize,
        direct_max_taps: usize,
    ) -> Result<Self> {
        let direct = match mode {
            ConvolutionMode::Partitioned => None,
            _ => Some(DirectConvolver::with_capacity(max_kernel)?),
        };
        let partitioned = match mode {
            ConvolutionMode::Direct => None,
            _ => Some(PartitionedConvolver::with_capacity(max_kernel, partition_size)?),
        };
        let active = if direct.is_some() { Strategy::Direct } else { Strategy::Partitioned };
        Ok(Self { mode, direct_max_taps, direct, partitioned, active })
    }

    #[inline]
    pub fn strategy(&self) -> Strategy {
        self.active
    }

    /// Write cursor of the direct history, if that strategy is allocated.
    pub fn history_write_pos(&self) -> Option<usize> {
        self.direct.as_ref().map(DirectConvolver::write_pos)
    }

    /// Pick a strategy for `kernel`, prepare it, and clear all input history.
    pub fn load(&mut self, kernel: &[f32]) {
        self.active = match self.mode {
            ConvolutionMode::Direct => Strategy::Direct,
            ConvolutionMode::Partitioned => Strategy::Partitioned,
            ConvolutionMode::Auto if kernel.len() <= self.direct_max_taps => Strategy::Direct,
            ConvolutionMode::Auto => Strategy::Partitioned,
        };
        if let Some(p) = self.partitioned.as_mut() {
            if self.active == Strategy::Partitioned {
                p.load(kernel);
            } else {
                p.reset();
            }
        }
        if let Some(d) = self.direct.as_mut() {
            d.reset();
        }
    }

    /// Convolve `input` against `kernel` (the same slice passed to `load`).
    pub fn process(&mut self, input: &[f32], kernel: &[f32], wet: &mut [f32]) {
        match (self.active, self.direct.as_mut(), self.partitioned.as_mut()) {
            (Strategy::Direct, Some(d), _) => d.process(input, kernel, wet),
            (Strategy::Partitioned, _, Some(p)) => p.process(input, wet),
            _ => wet.iter_mut().for_each(|w| *w = 0.0),
        }
    }
}
