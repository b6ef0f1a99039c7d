#![cfg_attr(not(feature = "std"), no_std)]
//! Resonar Core — no_std-ready DSP primitives for the convolution reverb engine.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` and use the `libm` math backend
//! - `fast-math`: Bhaskara sine and a rational tanh instead of the exact functions
//!
//! Modules
//! - [`dsp`]     : math backend, clamping, soft clipping, dry/wet gains, dB helpers
//! - [`filters`] : one-pole LP/HP for kernel spectral shaping
//!
//! Everything here is allocation free; the engine crate owns all buffers.

pub mod dsp;
pub mod filters;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{
        clamp, db_to_lin, fast_sin, kill_denormals, lin_to_db, linear_gains, one_pole_coeff_hz,
        soft_clip, soft_knee, TAU,
    };
    pub use crate::filters::{OnePoleHP, OnePoleLP};
}

#[cfg(test)]
mod smoke {

    #[test]
    fn prelude_exists() {
        use crate::prelude::*;
        let _ = db_to_lin(-6.0);
        let (dry, wet) = linear_gains(0.3);
        assert!((dry + wet - 1.0).abs() < 1e-6);
        let mut lp = OnePoleLP::new(1000.0, 48000.0);
        assert!(lp.tick(0.1) > 0.0);
    }
}
