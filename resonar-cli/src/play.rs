//! Realtime audition through `cpal`: a looping source runs through the engine
//! and the mono result is copied to every output channel.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use resonar_engine::ConvolutionEngine;
use tracing::{debug, info, warn};

pub fn list_output_devices() -> Result<()> {
    let host = cpal::default_host();
    let default = host.default_output_device().and_then(|d| d.name().ok());
    println!("Output devices ({}):", host.id().name());
    for dev in host.output_devices()? {
        let name = dev.name()?;
        let mark = if default.as_deref() == Some(name.as_str()) { " (default)" } else { "" };
        match dev.default_output_config() {
            Ok(cfg) => println!(
                "- {name}{mark}: {} Hz, {} ch, {:?}",
                cfg.sample_rate().0,
                cfg.channels(),
                cfg.sample_format()
            ),
            Err(_) => println!("- {name}{mark}"),
        }
    }
    Ok(())
}

pub fn pick_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    if let Some(name) = name {
        for d in host.output_devices()? {
            if d.name()? == name {
                return Ok(d);
            }
        }
        bail!("requested device not found: {name}");
    }
    host.default_output_device().ok_or_else(|| anyhow!("no default output device"))
}

/// Closest supported config to `want_sr`, preferring fewer channel changes.
pub fn choose_config(device: &cpal::Device, want_sr: u32) -> Result<cpal::SupportedStreamConfig> {
    let mut best: Option<(u64, cpal::SupportedStreamConfigRange)> = None;
    for range in device.supported_output_configs()? {
        let lo = range.min_sample_rate().0;
        let hi = range.max_sample_rate().0;
        let sr_pen = if (lo..=hi).contains(&want_sr) {
            0
        } else {
            u64::from(lo.abs_diff(want_sr).min(hi.abs_diff(want_sr)))
        };
        // Prefer stereo-or-fewer outputs; extra channels are just copies.
        let ch_pen = u64::from(range.channels().saturating_sub(2));
        let score = sr_pen.saturating_mul(1000) + ch_pen;
        if best.as_ref().map_or(true, |(s, _)| score < *s) {
            best = Some((score, range));
        }
    }

    let (_, range) = best.ok_or_else(|| anyhow!("no supported output configs"))?;
    let sr = want_sr.clamp(range.min_sample_rate().0, range.max_sample_rate().0);
    Ok(range.with_sample_rate(cpal::SampleRate(sr)))
}

fn build_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    mut engine: ConvolutionEngine,
    source: Vec<f32>,
    block: usize,
    gain: f32,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::FromSample<f32> + cpal::SizedSample + Send + 'static,
{
    let channels = usize::from(cfg.channels).max(1);
    let block = block.max(1);
    let mut dry = vec![0.0_f32; block];
    let mut wet = vec![0.0_f32; block];
    let mut cursor = 0usize;

    let meter_interval = cfg.sample_rate.0.max(1) as usize;
    let mut meter_count = 0usize;
    let mut meter_peak = 0.0_f32;

    let err_fn = |e: cpal::StreamError| warn!(%e, "stream error");

    let stream = device.build_output_stream(
        cfg,
        move |output: &mut [T], _| {
            for frames in output.chunks_mut(block * channels) {
                let n = frames.len() / channels;
                for d in &mut dry[..n] {
                    *d = source[cursor];
                    cursor = (cursor + 1) % source.len();
                }
                engine.process(&dry[..n], &mut wet[..n]);

                for (frame, &s) in frames.chunks_mut(channels).zip(&wet[..n]) {
                    let s = s * gain;
                    let v = T::from_sample(s);
                    frame.iter_mut().for_each(|ch| *ch = v);
                    meter_peak = meter_peak.max(s.abs());
                }
                meter_count += n;
                if meter_count >= meter_interval {
                    debug!(peak = meter_peak, "meter");
                    meter_peak = 0.0;
                    meter_count = 0;
                }
            }
        },
        err_fn,
        None,
    )?;
    Ok(stream)
}

pub struct PlayOptions<'a> {
    pub device: Option<&'a str>,
    pub duration: Option<u64>,
    pub block: usize,
    pub gain: f32,
}

/// Loop `source` through `engine` until `duration` elapses (forever if `None`).
/// The engine must already be initialized at `source_rate`.
pub fn play(
    mut engine: ConvolutionEngine,
    source: Vec<f32>,
    source_rate: u32,
    opts: PlayOptions<'_>,
) -> Result<()> {
    if source.is_empty() {
        bail!("nothing to play: source is empty");
    }

    let device = pick_device(opts.device)?;
    let supported = choose_config(&device, source_rate)?;
    let sample_format = supported.sample_format();
    let cfg = supported.config();
    if cfg.sample_rate.0 != source_rate {
        warn!(
            device_rate = cfg.sample_rate.0,
            source_rate, "device does not support the source rate; playback pitch will shift"
        );
    }

    // Build the kernel here rather than in the first callback.
    engine.prepare();
    info!(device = %device.name()?, ?cfg, ?sample_format, "starting playback");

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &cfg, engine, source, opts.block, opts.gain)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &cfg, engine, source, opts.block, opts.gain)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &cfg, engine, source, opts.block, opts.gain)?,
        other => bail!("unsupported device sample format: {other:?}"),
    };
    stream.play()?;

    match opts.duration {
        Some(d) => {
            std::thread::sleep(Duration::from_secs(d));
            Ok(())
        }
        None => {
            println!("Press Ctrl+C to stop…");
            loop {
                std::thread::sleep(Duration::from_millis(500));
            }
        }
    }
}
