//! One-pole filters for shaping a kernel's spectrum.
//!
//! Both run over a whole buffer in one pass and keep a single sample of state,
//! so shaping a freshly generated kernel is `Filter::new(..).run(&mut kernel)`.

use crate::dsp::{kill_denormals, one_pole_coeff_hz};

/// Low-pass `y += a·(x − y)` with `a = 1 − exp(−2π·fc/sr)`.
///
/// Darkens a kernel: the higher the cutoff, the more top end survives.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OnePoleLP {
    a: f32,
    y: f32,
}

impl OnePoleLP {
    #[inline]
    pub fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        let a = 1.0 - one_pole_coeff_hz(cutoff_hz.max(0.0), sample_rate.max(1.0));
        Self { a, y: 0.0 }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.y = 0.0;
    }

    #[inline]
    pub fn tick(&mut self, x: f32) -> f32 {
        self.y = kill_denormals(self.y + self.a * (x - self.y));
        self.y
    }

    pub fn run(&mut self, buf: &mut [f32]) {
        for s in buf {
            *s = self.tick(*s);
        }
    }
}

/// High-pass `y[n] = x[n] − x[n−1] + b·y[n−1]` with `b = exp(−2π·fc/sr)`.
///
/// Thins a kernel's low end and removes any DC offset the tail accumulates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OnePoleHP {
    b: f32,
    x1: f32,
    y1: f32,
}

impl OnePoleHP {
    #[inline]
    pub fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        let b = one_pole_coeff_hz(cutoff_hz.max(0.0), sample_rate.max(1.0));
        Self { b, x1: 0.0, y1: 0.0 }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }

    #[inline]
    pub fn tick(&mut self, x: f32) -> f32 {
        let y = kill_denormals(x - self.x1 + self.b * self.y1);
        self.x1 = x;
        self.y1 = y;
        y
    }

    pub fn run(&mut self, buf: &mut [f32]) {
        for s in buf {
            *s = self.tick(*s);
        }
    }
}
