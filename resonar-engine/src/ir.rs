//! Procedural impulse-response synthesis.
//!
//! A kernel is built in three passes over a zeroed buffer:
//!
//! 1. **Early reflections** — a table of first-order boundary echoes (ms), scaled by
//!    room size and offset by the pre-delay. Each tap is spread over a small
//!    diffusion window. The IR type picks the tap pattern.
//! 2. **Tail** — a stochastic cloud of randomly timed, randomly signed impulses
//!    under an `exp(-ln(1000)/T60 · t)` envelope, colored per IR type. Above 50 %
//!    diffusion every impulse is smeared over a few samples.
//! 3. **Spectral shaping** — one-pole low-pass (high-frequency parameter) then
//!    one-pole high-pass (low-frequency parameter) across the whole kernel.
//!
//! The result is normalized so its peak equals `target_peak` (never above 1).
//! All randomness comes from the caller's RNG, so a seeded RNG gives a
//! reproducible kernel.

use rand::Rng;
use resonar_core::dsp::{clamp, exp, fast_sin};
use resonar_core::filters::{OnePoleHP, OnePoleLP};

use crate::params::{IrType, ReverbParams};

/// ln(1000): amplitude factor for a 60 dB drop.
const LN_1000: f32 = 6.907_755;

/// Early-reflection tap times in milliseconds (first-order boundary echoes).
const TAP_TIMES_MS: [f32; 20] = [
    13.7, 19.3, 23.1, 29.7, 31.1, 37.9, 41.3, 43.7, 47.9, 53.3, 59.1, 61.3, 67.1, 71.3, 73.7,
    79.3, 89.9, 97.3, 103.1, 113.3,
];

/// Distance (ms) over which a tap loses 10 % of its level.
const TAP_DISTANCE_MS: f32 = 80.0;

/// The tail starts this long after the pre-delay.
const TAIL_OFFSET_S: f32 = 0.05;

/// Lower bound on the number of tail reflections, so short decays stay dense.
const MIN_TAIL_REFLECTIONS: usize = 1000;

/// Boundary between "early" and "late" energy in [`IrStats`].
const EARLY_WINDOW_S: f32 = 0.1;

/// Kernel length in samples: `decay_time · sr`, clamped to `[sr/2, max_kernel_samples]`.
pub fn kernel_length(decay_time: f32, sample_rate: u32, max_kernel_samples: usize) -> usize {
    let raw = (decay_time.max(0.0) * sample_rate as f32) as usize;
    let lo = (sample_rate / 2) as usize;
    raw.max(lo).min(max_kernel_samples.max(1))
}

/// Diagnostics gathered after generation.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct IrStats {
    /// Kernel length in samples.
    pub len: usize,
    /// Peak |value| after normalization.
    pub peak: f32,
    /// Index of the peak sample.
    pub peak_index: usize,
    /// RMS before normalization.
    pub raw_rms: f32,
    /// RMS after normalization.
    pub rms: f32,
    /// Gain applied by normalization.
    pub norm_gain: f32,
    /// sqrt of the energy in the first 100 ms.
    pub early_energy: f32,
    /// sqrt of the energy after the first 100 ms.
    pub late_energy: f32,
}

impl IrStats {
    pub fn late_to_early_ratio(&self) -> f32 {
        self.late_energy / (self.early_energy + 1.0e-4)
    }

    fn measure(kernel: &[f32], sample_rate: u32) -> Self {
        let boundary = ((EARLY_WINDOW_S * sample_rate as f32) as usize).min(kernel.len());
        let mut stats = IrStats { len: kernel.len(), ..Default::default() };
        let mut early = 0.0_f64;
        let mut late = 0.0_f64;
        for (i, &v) in kernel.iter().enumerate() {
            let a = v.abs();
            if a > stats.peak {
                stats.peak = a;
                stats.peak_index = i;
            }
            let e = f64::from(v) * f64::from(v);
            if i < boundary { early += e } else { late += e }
        }
        let total = early + late;
        stats.rms = if kernel.is_empty() { 0.0 } else { (total / kernel.len() as f64).sqrt() as f32 };
        stats.early_energy = early.sqrt() as f32;
        stats.late_energy = late.sqrt() as f32;
        stats
    }
}

/// Fill `out[..ir_len]` with a fresh kernel and return its stats.
///
/// `out` must hold at least `ir_len` samples; anything past `ir_len` is left
/// untouched. `target_peak` is clamped into (0, 1].
pub fn generate_impulse_response<R: Rng + ?Sized>(
    params: &ReverbParams,
    ir_type: IrType,
    sample_rate: u32,
    ir_len: usize,
    target_peak: f32,
    rng: &mut R,
    out: &mut [f32],
) -> IrStats {
    let kernel = &mut out[..ir_len];
    kernel.fill(0.0);
    if ir_len == 0 {
        return IrStats::default();
    }

    let sr = sample_rate.max(1) as f32;
    let pre_delay_samples = (params.pre_delay * sr / 1000.0) as usize;

    early_reflections(kernel, params, ir_type, sr, pre_delay_samples, rng);

    let tail_start = pre_delay_samples + (TAIL_OFFSET_S * sr) as usize;
    reverb_tail(kernel, params, ir_type, sr, tail_start, rng);

    spectral_shaping(kernel, params, sr);

    let raw = IrStats::measure(kernel, sample_rate);
    let target = clamp(target_peak, f32::MIN_POSITIVE, 1.0);
    let norm_gain = if raw.peak > 0.0 { target / raw.peak } else { 1.0 };
    if raw.peak > 0.0 {
        // The clamp only catches rounding in the scale; it never cuts real signal.
        for s in kernel.iter_mut() {
            *s = clamp(*s * norm_gain, -target, target);
        }
    }

    let mut stats = IrStats::measure(kernel, sample_rate);
    stats.raw_rms = raw.rms;
    stats.norm_gain = norm_gain;
    stats
}

/// Allocate and generate a kernel of `kernel_length(decay, sr, max)` samples.
pub fn synthesize<R: Rng + ?Sized>(
    params: &ReverbParams,
    ir_type: IrType,
    sample_rate: u32,
    max_kernel_samples: usize,
    target_peak: f32,
    rng: &mut R,
) -> (Vec<f32>, IrStats) {
    let len = kernel_length(params.decay_time, sample_rate, max_kernel_samples);
    let mut kernel = vec![0.0; len];
    let stats =
        generate_impulse_response(params, ir_type, sample_rate, len, target_peak, rng, &mut kernel);
    (kernel, stats)
}

#[inline]
fn random_sign<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    if rng.gen::<f32>() > 0.5 { 1.0 } else { -1.0 }
}

/// Add `amp` at `center ± spread`, falling off as `exp(-0.5·|j|)` and divided by
/// `spread + 1` so the injected energy barely depends on the spread.
fn splat(kernel: &mut [f32], center: isize, spread: isize, amp: f32) {
    let len = kernel.len() as isize;
    let norm = 1.0 / (spread + 1) as f32;
    for j in -spread..=spread {
        let idx = center + j;
        if idx < 0 || idx >= len {
            continue;
        }
        kernel[idx as usize] += amp * exp(-(j.unsigned_abs() as f32) * 0.5) * norm;
    }
}

/// One early-reflection tap: time (ms, before room scaling) and level factor.
#[derive(Copy, Clone, Debug)]
struct Tap {
    ms: f32,
    gain: f32,
}

fn early_reflections<R: Rng + ?Sized>(
    kernel: &mut [f32],
    params: &ReverbParams,
    ir_type: IrType,
    sr: f32,
    pre_delay_samples: usize,
    rng: &mut R,
) {
    let room_scale = (params.room_size / 50.0).max(0.1);
    let er_gain = params.early_reflections / 50.0;
    if er_gain <= 0.0 {
        return;
    }
    let spread = (3.0 * params.diffusion / 100.0) as isize;
    let samples_per_ms = sr / 1000.0;

    let place = |kernel: &mut [f32], tap: Tap, rng: &mut R| {
        if tap.ms < 0.0 {
            return;
        }
        let delay = pre_delay_samples + (tap.ms * samples_per_ms * room_scale) as usize;
        if delay >= kernel.len() {
            return;
        }
        let amp = er_gain * tap.gain * 0.9_f32.powf(tap.ms / TAP_DISTANCE_MS) * random_sign(rng);
        splat(kernel, delay as isize, spread, amp);
    };

    match ir_type {
        IrType::Hall => {
            for &ms in &TAP_TIMES_MS[..16] {
                place(kernel, Tap { ms, gain: 1.0 }, rng);
            }
        }
        IrType::Cathedral => {
            // Sparse and strong: every other tap of the full table, pushed further out.
            for &ms in TAP_TIMES_MS.iter().step_by(2) {
                place(kernel, Tap { ms: ms * 1.4, gain: 1.6 }, rng);
            }
        }
        IrType::Room => {
            // Dense and weak: the short half of the table plus the midpoints, pulled in.
            for pair in TAP_TIMES_MS[..12].windows(2) {
                place(kernel, Tap { ms: pair[0] * 0.5, gain: 0.6 }, rng);
                place(kernel, Tap { ms: (pair[0] + pair[1]) * 0.25, gain: 0.45 }, rng);
            }
            place(kernel, Tap { ms: TAP_TIMES_MS[11] * 0.5, gain: 0.6 }, rng);
        }
        IrType::Plate => {
            // Random micro-jitter of up to ±0.8 ms per tap.
            for &ms in &TAP_TIMES_MS[..16] {
                let jitter = (rng.gen::<f32>() * 2.0 - 1.0) * 0.8;
                place(kernel, Tap { ms: ms + jitter, gain: 0.9 }, rng);
            }
        }
        IrType::Spring => {
            // Sinusoidal jitter gives the chirpy "boing" spacing.
            for (i, &ms) in TAP_TIMES_MS[..16].iter().enumerate() {
                let jitter = 2.0 * fast_sin(i as f32 * 0.9);
                place(kernel, Tap { ms: ms + jitter, gain: 1.0 }, rng);
            }
        }
    }
}

fn reverb_tail<R: Rng + ?Sized>(
    kernel: &mut [f32],
    params: &ReverbParams,
    ir_type: IrType,
    sr: f32,
    start: usize,
    rng: &mut R,
) {
    let len = kernel.len();
    if start >= len {
        return;
    }
    let late_gain = params.late_mix / 50.0;
    if late_gain <= 0.0 {
        return;
    }

    let decay_rate = LN_1000 / params.decay_time.max(0.1);
    let density = 0.5 + (params.room_size / 50.0) * 2.0;
    let count = ((len as f32 * 0.02 * density) as usize).max(MIN_TAIL_REFLECTIONS);

    let hf_damping = params.damping / 100.0;
    let lf_boost = params.low_freq / 50.0;
    let span = (len - start) as f32;

    // diffusion <= 50: single spikes; above: smeared over 2..=7 samples.
    let smear = if params.diffusion > 50.0 {
        2 + ((params.diffusion - 50.0) / 50.0 * 5.0) as usize
    } else {
        1
    };
    let smear_norm = 1.0 / (smear as f32).sqrt();

    for i in 0..count {
        let u: f32 = rng.gen();
        let mut delay = start as isize + (u.sqrt() * span) as isize;
        let t = delay as f32 / sr;

        let mut amp = exp(-decay_rate * t);
        amp *= 1.0 - hf_damping * hf_damping * (1.0 - exp(-t * 3.0));

        match ir_type {
            IrType::Hall => {
                amp *= 1.0 + lf_boost * 0.5 * exp(-t * 0.8);
                amp *= exp(-(100.0 - params.room_size) * 0.02 * t);
            }
            IrType::Cathedral => {
                amp *= 1.0 + lf_boost * 1.5 * exp(-t * 0.3);
                if i % 3 == 0 {
                    amp *= 2.5;
                }
            }
            IrType::Room => {
                amp *= exp(-t * 4.0);
            }
            IrType::Plate => {
                amp *= 1.0 + 0.7 * fast_sin(t * 2000.0 + i as f32 * 0.2);
                delay += (5.0 * fast_sin(i as f32 * 0.1)) as isize;
            }
            IrType::Spring => {
                delay += (30.0 * fast_sin(t * 100.0)) as isize;
                amp *= 1.0 + fast_sin(t * 400.0);
            }
        }
        if delay < 0 || delay as usize >= len {
            continue;
        }

        amp *= late_gain;
        let delay = delay as usize;
        if smear == 1 {
            kernel[delay] += amp * (2.0 * rng.gen::<f32>() - 1.0);
        } else {
            let end = (delay + smear).min(len);
            for slot in &mut kernel[delay..end] {
                *slot += amp * smear_norm * random_sign(rng) * rng.gen::<f32>();
            }
        }
    }
}

fn spectral_shaping(kernel: &mut [f32], params: &ReverbParams, sr: f32) {
    let lp_hz = 800.0 + params.high_freq / 100.0 * 4500.0;
    let hp_hz = 8.0 + (100.0 - params.low_freq) / 100.0 * 390.0;
    OnePoleLP::new(lp_hz, sr).run(kernel);
    OnePoleHP::new(hp_hz, sr).run(kernel);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SR: u32 = 8000;

    fn gen(params: &ReverbParams, ir_type: IrType, seed: u64) -> (Vec<f32>, IrStats) {
        let mut rng = StdRng::seed_from_u64(seed);
        synthesize(params, ir_type, SR, 15 * SR as usize, 0.95, &mut rng)
    }

    #[test]
    fn length_follows_decay_time() {
        assert_eq!(kernel_length(2.5, 48_000, 720_000), 120_000);
        assert_eq!(kernel_length(0.1, 48_000, 720_000), 24_000);
        assert_eq!(kernel_length(10.0, 48_000, 720_000), 480_000);
        assert_eq!(kernel_length(10.0, 96_000, 720_000), 720_000);
    }

    /// Share of nonzero samples that have a nonzero neighbour.
    fn clustered_fraction(kernel: &[f32]) -> f32 {
        let nonzero = |i: usize| kernel.get(i).is_some_and(|v| *v != 0.0);
        let (mut hits, mut total) = (0usize, 0usize);
        for i in (0..kernel.len()).filter(|&i| nonzero(i)) {
            total += 1;
            if (i > 0 && nonzero(i - 1)) || nonzero(i + 1) {
                hits += 1;
            }
        }
        assert!(total > 0, "tail left no reflections");
        hits as f32 / total as f32
    }

    fn sparse_tail(diffusion: f32) -> Vec<f32> {
        // Smallest room spreads about 2000 reflections over 25 s, so single
        // spikes rarely land next to each other.
        let params = ReverbParams { room_size: 0.0, decay_time: 10.0, diffusion, ..Default::default() };
        let mut kernel = vec![0.0; 25 * SR as usize];
        let mut rng = StdRng::seed_from_u64(9);
        reverb_tail(&mut kernel, &params, IrType::Hall, SR as f32, 0, &mut rng);
        kernel
    }

    #[test]
    fn low_diffusion_tail_is_single_spikes() {
        for diffusion in [0.0, 25.0, 50.0] {
            let frac = clustered_fraction(&sparse_tail(diffusion));
            assert!(frac < 0.1, "diffusion {diffusion}: {frac} of spikes touch a neighbour");
        }
    }

    #[test]
    fn any_diffusion_above_half_smears_every_spike() {
        for diffusion in [50.5, 55.0, 58.0, 75.0, 100.0] {
            let frac = clustered_fraction(&sparse_tail(diffusion));
            assert!(frac > 0.99, "diffusion {diffusion}: only {frac} of samples are in runs");
        }
    }

    #[test]
    fn diffusion_just_above_half_changes_the_kernel() {
        let at = |diffusion| gen(&ReverbParams { diffusion, ..Default::default() }, IrType::Hall, 42).0;
        let grainy = at(40.0);
        for diffusion in [51.0, 55.0, 58.0] {
            assert_ne!(at(diffusion), grainy, "diffusion {diffusion}");
        }
        assert_eq!(at(50.0), grainy);
    }

    #[test]
    fn same_seed_same_kernel() {
        let p = ReverbParams::default();
        let (a, _) = gen(&p, IrType::Hall, 3);
        let (b, _) = gen(&p, IrType::Hall, 3);
        assert_eq!(a, b);
        let (c, _) = gen(&p, IrType::Hall, 4);
        assert_ne!(a, c);
    }

    #[test]
    fn every_type_is_normalized_and_nonzero() {
        let p = ReverbParams::default();
        for t in IrType::ALL {
            let (k, stats) = gen(&p, t, 11);
            let peak = k.iter().fold(0.0_f32, |m, v| m.max(v.abs()));
            assert!(peak <= 0.95, "{t}: peak {peak}");
            assert!(peak > 0.9, "{t}: peak {peak}");
            assert_eq!(stats.peak, peak);
            assert!(stats.rms > 0.0);
            assert_eq!(k.len(), (2.5 * SR as f32) as usize);
        }
    }

    #[test]
    fn types_differ_structurally() {
        let p = ReverbParams::default();
        let kernels: Vec<Vec<f32>> = IrType::ALL.iter().map(|&t| gen(&p, t, 5).0).collect();
        for i in 0..kernels.len() {
            for j in (i + 1)..kernels.len() {
                assert_ne!(kernels[i], kernels[j]);
            }
        }
    }

    #[test]
    fn room_decays_faster_than_cathedral() {
        let p = ReverbParams::default();
        let (room, rs) = gen(&p, IrType::Room, 9);
        let (cath, cs) = gen(&p, IrType::Cathedral, 9);
        assert!(rs.late_to_early_ratio() < cs.late_to_early_ratio());
        let tail = |k: &[f32]| k[k.len() / 2..].iter().map(|v| v * v).sum::<f32>();
        assert!(tail(&room) < tail(&cath));
    }

    #[test]
    fn tail_dies_away() {
        let p = ReverbParams::default();
        for t in IrType::ALL {
            let (k, _) = gen(&p, t, 21);
            let n = k.len();
            let energy = |s: &[f32]| s.iter().map(|v| v * v).sum::<f32>() / s.len() as f32;
            let head = energy(&k[..n / 5]);
            let end = energy(&k[n - n / 10..]);
            assert!(end < head * 0.01, "{t}: head {head} end {end}");
        }
    }

    #[test]
    fn pre_delay_leaves_silence_up_front() {
        let p = ReverbParams { pre_delay: 100.0, diffusion: 0.0, ..Default::default() };
        let (k, _) = gen(&p, IrType::Hall, 1);
        // First tap is 13.7 ms after the 100 ms pre-delay.
        let first = (0.1 * SR as f32) as usize;
        assert!(k[..first].iter().all(|&v| v == 0.0));
        assert!(k[first..].iter().any(|&v| v != 0.0));
    }

    #[test]
    fn silent_settings_give_silent_kernel() {
        let p = ReverbParams { early_reflections: 0.0, late_mix: 0.0, ..Default::default() };
        let (k, stats) = gen(&p, IrType::Plate, 2);
        assert!(k.iter().all(|&v| v == 0.0));
        assert_eq!(stats.peak, 0.0);
        assert_eq!(stats.norm_gain, 1.0);
    }

    #[test]
    fn extreme_settings_stay_bounded() {
        let p = ReverbParams {
            room_size: 100.0,
            decay_time: 0.1,
            pre_delay: 100.0,
            damping: 100.0,
            diffusion: 100.0,
            low_freq: 100.0,
            early_reflections: 100.0,
            high_freq: 100.0,
            late_mix: 100.0,
            mix: 100.0,
        };
        for t in IrType::ALL {
            let (k, _) = gen(&p, t, 8);
            assert_eq!(k.len(), SR as usize / 2);
            assert!(k.iter().all(|v| v.is_finite() && v.abs() <= 0.95));
        }
    }

    #[test]
    fn writes_only_the_requested_prefix() {
        let mut buf = vec![7.0_f32; 6000];
        let mut rng = StdRng::seed_from_u64(1);
        generate_impulse_response(
            &ReverbParams::default(),
            IrType::Hall,
            SR,
            4000,
            0.95,
            &mut rng,
            &mut buf,
        );
        assert!(buf[4000..].iter().all(|&v| v == 7.0));
    }
}
