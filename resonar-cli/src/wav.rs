//! WAV I/O through `hound`. Everything is mono f32 on the engine side.

use std::path::Path;

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// Decoded mono signal.
pub struct Mono {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Channel count of the source file before mixdown.
    pub channels: u16,
}

/// Read any PCM/float WAV and average its channels down to mono.
pub fn read_mono(path: &Path) -> Result<Mono> {
    let reader = WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        bail!("{}: no channels", path.display());
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .with_context(|| format!("decoding {}", path.display()))?,
        SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .with_context(|| format!("decoding {}", path.display()))?
        }
    };

    let ch = usize::from(spec.channels);
    let samples = if ch == 1 {
        interleaved
    } else {
        let norm = 1.0 / ch as f32;
        interleaved
            .chunks_exact(ch)
            .map(|frame| frame.iter().sum::<f32>() * norm)
            .collect()
    };

    Ok(Mono { samples, sample_rate: spec.sample_rate, channels: spec.channels })
}

/// Write a mono 32-bit float WAV.
pub fn write_mono(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer =
        WavWriter::create(path, spec).with_context(|| format!("creating {}", path.display()))?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize().with_context(|| format!("finalizing {}", path.display()))?;
    Ok(())
}
