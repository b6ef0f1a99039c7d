//! Perceptual reverb parameters and impulse-response characters.
//!
//! Every parameter has a stable numeric id (the C boundary uses it), a camelCase
//! name (the by-name setter uses it), a documented range and a default. Setting a
//! value clamps it into range; non-finite values are dropped.

use core::fmt;
use core::str::FromStr;

use resonar_core::dsp::clamp;
use serde::{Deserialize, Serialize};

/// A settable reverb parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Param {
    /// Room size, 0..100. Scales early-reflection spacing and tail density.
    RoomSize,
    /// Decay time in seconds, 0.1..10. Also sets the kernel length.
    DecayTime,
    /// Pre-delay in milliseconds, 0..100.
    PreDelay,
    /// High-frequency damping of the tail, 0..100.
    Damping,
    /// Low-frequency weight, 0..100. Drives the tail's LF boost and the high-pass cutoff.
    LowFreq,
    /// Diffusion, 0..100. Spreads early taps; above 50 smears tail reflections.
    Diffusion,
    /// Dry/wet mix in percent, 0..100. Post-convolution only.
    Mix,
    /// Early-reflection level, 0..100.
    EarlyReflections,
    /// High-frequency content, 0..100. Drives the low-pass cutoff of spectral shaping.
    HighFreq,
    /// Tail level relative to the early reflections, 0..100.
    LateMix,
}

impl Param {
    pub const ALL: [Param; 10] = [
        Param::RoomSize,
        Param::DecayTime,
        Param::PreDelay,
        Param::Damping,
        Param::LowFreq,
        Param::Diffusion,
        Param::Mix,
        Param::EarlyReflections,
        Param::HighFreq,
        Param::LateMix,
    ];

    /// Map a boundary id (`0=roomSize … 7=earlyReflections, 8=highFreq, 9=lateMix`).
    pub fn from_id(id: u32) -> Option<Param> {
        Param::ALL.get(id as usize).copied()
    }

    pub fn id(self) -> u32 {
        match self {
            Param::RoomSize => 0,
            Param::DecayTime => 1,
            Param::PreDelay => 2,
            Param::Damping => 3,
            Param::LowFreq => 4,
            Param::Diffusion => 5,
            Param::Mix => 6,
            Param::EarlyReflections => 7,
            Param::HighFreq => 8,
            Param::LateMix => 9,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Param::RoomSize => "roomSize",
            Param::DecayTime => "decayTime",
            Param::PreDelay => "preDelay",
            Param::Damping => "damping",
            Param::LowFreq => "lowFreq",
            Param::Diffusion => "diffusion",
            Param::Mix => "mix",
            Param::EarlyReflections => "earlyReflections",
            Param::HighFreq => "highFreq",
            Param::LateMix => "lateMix",
        }
    }

    /// Inclusive value range.
    pub fn range(self) -> (f32, f32) {
        match self {
            Param::DecayTime => (0.1, 10.0),
            _ => (0.0, 100.0),
        }
    }

    pub fn default_value(self) -> f32 {
        match self {
            Param::RoomSize => 50.0,
            Param::DecayTime => 2.5,
            Param::PreDelay => 20.0,
            Param::Damping => 50.0,
            Param::LowFreq => 50.0,
            Param::Diffusion => 80.0,
            Param::Mix => 30.0,
            Param::EarlyReflections => 50.0,
            Param::HighFreq => 50.0,
            Param::LateMix => 50.0,
        }
    }

    /// Whether a change to this parameter invalidates the kernel.
    pub fn affects_kernel(self) -> bool {
        self != Param::Mix
    }

    /// Clamp `value` into this parameter's range.
    pub fn clamp(self, value: f32) -> f32 {
        let (lo, hi) = self.range();
        clamp(value, lo, hi)
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Param {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = trim_padding(s);
        Param::ALL
            .iter()
            .copied()
            .find(|p| p.name() == key)
            .ok_or_else(|| UnknownName(key.to_string()))
    }
}

/// A parameter or IR type name that did not match any known value.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown name: {0:?}")]
pub struct UnknownName(pub String);

/// Strip surrounding whitespace and NUL padding from fixed-width host strings.
fn trim_padding(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || c == '\0')
}

/// Current values of all parameters, always within range when set through
/// [`set`](Self::set). Deserialized values are stored as written; [`sanitized`](Self::sanitized)
/// brings them back into range.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReverbParams {
    pub room_size: f32,
    pub decay_time: f32,
    pub pre_delay: f32,
    pub damping: f32,
    pub low_freq: f32,
    pub diffusion: f32,
    pub mix: f32,
    pub early_reflections: f32,
    pub high_freq: f32,
    pub late_mix: f32,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            room_size: Param::RoomSize.default_value(),
            decay_time: Param::DecayTime.default_value(),
            pre_delay: Param::PreDelay.default_value(),
            damping: Param::Damping.default_value(),
            low_freq: Param::LowFreq.default_value(),
            diffusion: Param::Diffusion.default_value(),
            mix: Param::Mix.default_value(),
            early_reflections: Param::EarlyReflections.default_value(),
            high_freq: Param::HighFreq.default_value(),
            late_mix: Param::LateMix.default_value(),
        }
    }
}

impl ReverbParams {
    pub fn get(&self, param: Param) -> f32 {
        match param {
            Param::RoomSize => self.room_size,
            Param::DecayTime => self.decay_time,
            Param::PreDelay => self.pre_delay,
            Param::Damping => self.damping,
            Param::LowFreq => self.low_freq,
            Param::Diffusion => self.diffusion,
            Param::Mix => self.mix,
            Param::EarlyReflections => self.early_reflections,
            Param::HighFreq => self.high_freq,
            Param::LateMix => self.late_mix,
        }
    }

    fn slot(&mut self, param: Param) -> &mut f32 {
        match param {
            Param::RoomSize => &mut self.room_size,
            Param::DecayTime => &mut self.decay_time,
            Param::PreDelay => &mut self.pre_delay,
            Param::Damping => &mut self.damping,
            Param::LowFreq => &mut self.low_freq,
            Param::Diffusion => &mut self.diffusion,
            Param::Mix => &mut self.mix,
            Param::EarlyReflections => &mut self.early_reflections,
            Param::HighFreq => &mut self.high_freq,
            Param::LateMix => &mut self.late_mix,
        }
    }

    /// Clamp and store `value`. Returns the stored value, or `None` when the
    /// input was NaN/infinite and nothing changed.
    pub fn set(&mut self, param: Param, value: f32) -> Option<f32> {
        if !value.is_finite() {
            return None;
        }
        let v = param.clamp(value);
        *self.slot(param) = v;
        Some(v)
    }

    /// Re-clamp every field (used after deserializing untrusted values).
    pub fn sanitized(mut self) -> Self {
        for p in Param::ALL {
            let v = self.get(p);
            *self.slot(p) = if v.is_finite() { p.clamp(v) } else { p.default_value() };
        }
        self
    }
}

/// Impulse-response character. Selects the early-reflection pattern and the
/// tail coloration used by the synthesizer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IrType {
    #[default]
    Hall,
    Cathedral,
    Room,
    Plate,
    Spring,
}

impl IrType {
    pub const ALL: [IrType; 5] = [
        IrType::Hall,
        IrType::Cathedral,
        IrType::Room,
        IrType::Plate,
        IrType::Spring,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IrType::Hall => "hall",
            IrType::Cathedral => "cathedral",
            IrType::Room => "room",
            IrType::Plate => "plate",
            IrType::Spring => "spring",
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IrType {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = trim_padding(s);
        IrType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(key))
            .ok_or_else(|| UnknownName(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_from_id() {
        for p in Param::ALL {
            assert_eq!(Param::from_id(p.id()), Some(p));
        }
        assert_eq!(Param::from_id(10), None);
        assert_eq!(Param::from_id(u32::MAX), None);
    }

    #[test]
    fn boundary_ids_match_host_contract() {
        assert_eq!(Param::from_id(0), Some(Param::RoomSize));
        assert_eq!(Param::from_id(1), Some(Param::DecayTime));
        assert_eq!(Param::from_id(4), Some(Param::LowFreq));
        assert_eq!(Param::from_id(6), Some(Param::Mix));
        assert_eq!(Param::from_id(7), Some(Param::EarlyReflections));
    }

    #[test]
    fn names_parse_with_padding() {
        assert_eq!("decayTime".parse::<Param>(), Ok(Param::DecayTime));
        assert_eq!("mix      ".parse::<Param>(), Ok(Param::Mix));
        assert_eq!("earlyReflections\0\0".parse::<Param>(), Ok(Param::EarlyReflections));
        assert!("decay".parse::<Param>().is_err());
    }

    #[test]
    fn unknown_name_is_a_std_error() {
        let err: Box<dyn std::error::Error> = Box::new("decay\0".parse::<Param>().unwrap_err());
        assert_eq!(err.to_string(), "unknown name: \"decay\"");
        assert_eq!("chamber".parse::<IrType>(), Err(UnknownName("chamber".into())));
    }

    #[test]
    fn set_clamps_into_range() {
        let mut p = ReverbParams::default();
        assert_eq!(p.set(Param::DecayTime, 50.0), Some(10.0));
        assert_eq!(p.decay_time, 10.0);
        assert_eq!(p.set(Param::DecayTime, 0.0), Some(0.1));
        assert_eq!(p.set(Param::PreDelay, -5.0), Some(0.0));
        assert_eq!(p.set(Param::RoomSize, 250.0), Some(100.0));
        assert_eq!(p.set(Param::Mix, 101.0), Some(100.0));
    }

    #[test]
    fn non_finite_values_are_ignored() {
        let mut p = ReverbParams::default();
        assert_eq!(p.set(Param::Damping, f32::NAN), None);
        assert_eq!(p.set(Param::Damping, f32::INFINITY), None);
        assert_eq!(p.damping, 50.0);
    }

    #[test]
    fn only_mix_leaves_the_kernel_alone() {
        for p in Param::ALL {
            assert_eq!(p.affects_kernel(), p != Param::Mix, "{p}");
        }
    }

    #[test]
    fn ir_type_names() {
        assert_eq!("hall".parse::<IrType>(), Ok(IrType::Hall));
        assert_eq!("Cathedral".parse::<IrType>(), Ok(IrType::Cathedral));
        assert_eq!("spring              ".parse::<IrType>(), Ok(IrType::Spring));
        assert!("chamber".parse::<IrType>().is_err());
        assert!("".parse::<IrType>().is_err());
        for t in IrType::ALL {
            assert_eq!(t.as_str().parse::<IrType>(), Ok(t));
        }
    }

    #[test]
    fn sanitized_repairs_out_of_range_fields() {
        let p = ReverbParams { decay_time: 99.0, mix: f32::NAN, ..Default::default() }.sanitized();
        assert_eq!(p.decay_time, 10.0);
        assert_eq!(p.mix, 30.0);
    }
}
