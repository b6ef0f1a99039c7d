//! Resonar CLI — render, inspect and audition procedural convolution reverbs.

mod play;
mod wav;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use resonar_core::dsp::{db_to_lin, lin_to_db};
use resonar_engine::{ConvolutionEngine, EngineConfig, IrType, Param};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "resonar", version, about = "Procedural convolution reverb")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a WAV file through the reverb and write the result
    Render {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        reverb: ReverbArgs,
    },
    /// Write the generated impulse response to a WAV file
    Ir {
        output: PathBuf,
        /// Sample rate of the generated kernel
        #[arg(long, default_value_t = 48_000)]
        sample_rate: u32,
        #[command(flatten)]
        reverb: ReverbArgs,
    },
    /// Loop a WAV file through the reverb on an output device
    Play {
        input: PathBuf,
        /// Output device name (see `list-devices`)
        #[arg(long)]
        device: Option<String>,
        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<u64>,
        /// Output gain in dB
        #[arg(long, default_value_t = -2.0, allow_hyphen_values = true)]
        gain_db: f32,
        #[command(flatten)]
        reverb: ReverbArgs,
    },
    /// List audio output devices
    ListDevices,
}

/// Reverb settings shared by every processing subcommand. Unset flags keep
/// the starting values from `--config` (engine defaults without one).
#[derive(Args, Debug)]
struct ReverbArgs {
    /// hall, cathedral, room, plate or spring
    #[arg(long = "type")]
    ir_type: Option<IrType>,
    /// 0..100
    #[arg(long)]
    room_size: Option<f32>,
    /// Seconds, 0.1..10
    #[arg(long)]
    decay: Option<f32>,
    /// Milliseconds, 0..100
    #[arg(long)]
    pre_delay: Option<f32>,
    #[arg(long)]
    damping: Option<f32>,
    #[arg(long)]
    diffusion: Option<f32>,
    #[arg(long)]
    low_freq: Option<f32>,
    #[arg(long)]
    high_freq: Option<f32>,
    /// Early-reflection level
    #[arg(long)]
    early: Option<f32>,
    /// Tail level
    #[arg(long)]
    late: Option<f32>,
    /// Wet percentage, 0..100
    #[arg(long)]
    mix: Option<f32>,
    /// Seed for a reproducible impulse response
    #[arg(long)]
    seed: Option<u64>,
    /// Samples per processing block
    #[arg(long, default_value_t = 512)]
    block_size: usize,
    /// Engine configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl ReverbArgs {
    fn engine_config(&self) -> Result<EngineConfig> {
        let mut cfg = match &self.config {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if let Some(seed) = self.seed {
            cfg.seed = Some(seed);
        }
        Ok(cfg)
    }

    fn settings(&self) -> [(Param, Option<f32>); 10] {
        [
            (Param::RoomSize, self.room_size),
            (Param::DecayTime, self.decay),
            (Param::PreDelay, self.pre_delay),
            (Param::Damping, self.damping),
            (Param::LowFreq, self.low_freq),
            (Param::Diffusion, self.diffusion),
            (Param::Mix, self.mix),
            (Param::EarlyReflections, self.early),
            (Param::HighFreq, self.high_freq),
            (Param::LateMix, self.late),
        ]
    }

    /// Initialized engine at `sample_rate` with these settings applied.
    fn build(&self, sample_rate: u32) -> Result<ConvolutionEngine> {
        let mut engine = ConvolutionEngine::new(self.engine_config()?);
        engine.initialize(sample_rate)?;
        if let Some(t) = self.ir_type {
            engine.set_ir_type(t);
        }
        for (param, value) in self.settings() {
            if let Some(v) = value {
                engine.set_parameter(param, v);
            }
        }
        Ok(engine)
    }
}

fn render(input: &Path, output: &Path, reverb: &ReverbArgs) -> Result<()> {
    let src = wav::read_mono(input)?;
    let mut engine = reverb.build(src.sample_rate)?;
    info!(
        input = %input.display(),
        frames = src.samples.len(),
        channels = src.channels,
        sample_rate = src.sample_rate,
        "rendering"
    );

    // Let the tail ring out after the source ends.
    let tail = (engine.params().decay_time * src.sample_rate as f32) as usize;
    let total = src.samples.len() + tail;
    let mut padded = src.samples;
    padded.resize(total, 0.0);

    let block = reverb.block_size.max(1);
    let mut out = vec![0.0_f32; total];
    for (x, y) in padded.chunks(block).zip(out.chunks_mut(block)) {
        engine.process(x, y);
    }

    wav::write_mono(output, &out, src.sample_rate)?;
    let peak = out.iter().fold(0.0_f32, |m, v| m.max(v.abs()));
    println!(
        "{} -> {}: {} samples ({:.2} s incl. {:.2} s tail), peak {:.1} dBFS",
        input.display(),
        output.display(),
        total,
        total as f32 / src.sample_rate as f32,
        tail as f32 / src.sample_rate as f32,
        lin_to_db(peak)
    );
    Ok(())
}

fn dump_ir(output: &Path, sample_rate: u32, reverb: &ReverbArgs) -> Result<()> {
    let mut engine = reverb.build(sample_rate)?;
    engine.prepare();
    let stats = engine
        .ir_stats()
        .context("engine produced no impulse response")?;
    wav::write_mono(output, engine.kernel(), sample_rate)?;

    println!("{} impulse response -> {}", engine.ir_type(), output.display());
    println!("  length        {} samples ({:.2} s)", stats.len, stats.len as f32 / sample_rate as f32);
    println!("  peak          {:.4} at {:.1} ms", stats.peak, stats.peak_index as f32 * 1000.0 / sample_rate as f32);
    println!("  rms           {:.5} (raw {:.5})", stats.rms, stats.raw_rms);
    println!("  norm gain     {:.4}", stats.norm_gain);
    println!("  late/early    {:.3}", stats.late_to_early_ratio());
    println!("  convolution   {:?}", engine.convolution_strategy());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resonar=info,resonar_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render { input, output, reverb } => render(&input, &output, &reverb)?,
        Commands::Ir { output, sample_rate, reverb } => dump_ir(&output, sample_rate, &reverb)?,
        Commands::Play { input, device, duration, gain_db, reverb } => {
            let src = wav::read_mono(&input)?;
            let engine = reverb.build(src.sample_rate)?;
            play::play(
                engine,
                src.samples,
                src.sample_rate,
                play::PlayOptions {
                    device: device.as_deref(),
                    duration,
                    block: reverb.block_size,
                    gain: db_to_lin(gain_db),
                },
            )?;
        }
        Commands::ListDevices => play::list_output_devices()?,
    }

    Ok(())
}
