//! Scalar DSP helpers shared by the IR generator and the output stage.
//!
//! Math goes through a small backend (`m_*`) so the crate builds with either
//! `std` or `libm`; `fast-math` swaps the sine and tanh for cheap approximations.

#![allow(clippy::excessive_precision)]

use core::f32::consts::PI;

use cfg_if::cfg_if;

// ----------------------------- Math backend selection -----------------------------

cfg_if! {
    if #[cfg(feature = "no-std")] {
        #[allow(dead_code)] #[inline] fn m_sin(x: f32) -> f32 { libm::sinf(x) }
        #[inline] fn m_exp(x: f32) -> f32 { libm::expf(x) }
        #[inline] fn m_ln(x: f32) -> f32 { libm::logf(x) }
        #[allow(dead_code)] #[inline] fn m_tanh(x: f32) -> f32 { libm::tanhf(x) }
        #[allow(dead_code)] #[inline] fn m_round(x: f32) -> f32 { libm::roundf(x) }
    } else {
        #[allow(dead_code)] #[inline] fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] fn m_exp(x: f32) -> f32 { x.exp() }
        #[inline] fn m_ln(x: f32) -> f32 { x.ln() }
        #[allow(dead_code)] #[inline] fn m_tanh(x: f32) -> f32 { x.tanh() }
        #[allow(dead_code)] #[inline] fn m_round(x: f32) -> f32 { x.round() }
    }
}

// --------------------------------- Constants -------------------------------------

pub const TAU: f32 = 2.0 * PI;

/// A very small epsilon used in denormal handling and safe divisions.
pub const EPS_SMALL: f32 = 1.0e-20;

// --------------------------------- Utilities -------------------------------------

/// Clamp `x` into `[lo, hi]`. NaN passes through unchanged.
#[inline]
pub fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    if x < lo { lo } else if x > hi { hi } else { x }
}

#[inline]
pub fn signum_nonzero(x: f32) -> f32 {
    if x >= 0.0 { 1.0 } else { -1.0 }
}

/// Kill denormal/subnormal values. Returns 0.0 if |x| < EPS_SMALL.
#[inline]
pub fn kill_denormals(x: f32) -> f32 {
    if x.abs() < EPS_SMALL { 0.0 } else { x }
}

// --------------------------------- dB / linear -----------------------------------

/// Convert dB to linear gain: lin = 10^(db/20).
#[inline]
pub fn db_to_lin(db: f32) -> f32 {
    if db <= -120.0 { 0.0 } else { m_exp(0.11512925464970229_f32 * db) } // ln(10)/20
}

/// Convert linear gain to dB: db = 20*log10(lin).
#[inline]
pub fn lin_to_db(lin: f32) -> f32 {
    if lin <= EPS_SMALL { -120.0 } else { 8.685889638065036553_f32 * m_ln(lin) } // 20/ln(10)
}

// --------------------------------- Fast trig -------------------------------------

/// Sine used for the IR generator's modulation terms.
///
/// With `fast-math` this is Bhaskara I's rational approximation after range
/// reduction into [-π, π] (max abs error ~1.6e-3); otherwise the exact sine.
#[inline]
pub fn fast_sin(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            let k = m_round(x / TAU);
            let xr = x - k * TAU;
            let a = xr.abs();
            let num = 16.0 * a * (PI - a);
            let den = 5.0 * PI * PI - 4.0 * a * (PI - a);
            signum_nonzero(xr) * num / den
        } else {
            m_sin(x)
        }
    }
}

// --------------------------------- Nonlinearities --------------------------------

/// Soft clip via tanh. If `fast-math` is enabled, uses a stable rational approximation.
///
/// Approximation used when `fast-math`:
/// `tanh(x) ≈ x * (27 + x^2) / (27 + 9 x^2)`, clamped to ±1 outside |x| > 3.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            if x >= 3.0 { return 1.0; }
            if x <= -3.0 { return -1.0; }
            let x2 = x * x;
            x * (27.0 + x2) / (27.0 + 9.0 * x2)
        } else {
            m_tanh(x)
        }
    }
}

/// Output saturation with a knee.
///
/// Below `threshold` (in absolute value) the sample is returned untouched; above it
/// the excess is squashed with `tanh(excess * knee)` into the remaining headroom,
/// so the result never leaves [-1, 1].
#[inline]
pub fn soft_knee(x: f32, threshold: f32, knee: f32) -> f32 {
    let a = x.abs();
    if a <= threshold {
        return x;
    }
    let headroom = 1.0 - threshold;
    signum_nonzero(x) * (threshold + headroom * soft_clip((a - threshold) * knee))
}

// --------------------------------- Dry/wet ---------------------------------------

/// Linear crossfade: `(dry, wet) = (1 - mix, mix)` for `mix` in [0, 1].
#[inline]
pub fn linear_gains(mix01: f32) -> (f32, f32) {
    let m = clamp(mix01, 0.0, 1.0);
    (1.0 - m, m)
}

// --------------------------------- Exponentials ----------------------------------

/// Plain exponential through the selected math backend.
#[inline]
pub fn exp(x: f32) -> f32 {
    m_exp(x)
}

/// Pole of an RC-style one-pole at `cut_hz`: `exp(-2π fc / sr)`, with `fc`
/// held below Nyquist.
#[inline]
pub fn one_pole_coeff_hz(cut_hz: f32, sr: f32) -> f32 {
    let fc = cut_hz.max(0.0).min(0.499 * sr);
    m_exp(-2.0 * PI * fc / sr)
}

// --------------------------------- Tests (std only) ------------------------------
