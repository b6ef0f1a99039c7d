use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use resonar_engine::{ConvolutionEngine, ConvolutionMode, EngineConfig, EngineError, IrType, Param, Strategy};

const SR: u32 = 8_000;

fn config(mode: ConvolutionMode, seed: u64) -> EngineConfig {
    EngineConfig::default().with_mode(mode).with_seed(seed)
}

fn live(mode: ConvolutionMode, seed: u64) -> ConvolutionEngine {
    let mut e = ConvolutionEngine::new(config(mode, seed));
    e.initialize(SR).unwrap();
    e
}

fn noise(n: usize, amp: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(-amp..amp)).collect()
}

fn impulse(n: usize, amp: f32) -> Vec<f32> {
    let mut x = vec![0.0; n];
    x[0] = amp;
    x
}

#[test]
fn passthrough_before_initialize() {
    let mut e = ConvolutionEngine::new(EngineConfig::default());
    let x = noise(300, 2.0, 1);
    assert_eq!(e.process_to_vec(&x), x);
}

#[test]
fn kernel_length_follows_decay() {
    let mut e = live(ConvolutionMode::Auto, 1);
    for (decay, want) in [(1.0, 8_000), (0.1, 4_000), (0.3, 4_000), (3.25, 26_000), (50.0, 80_000)] {
        e.set_parameter(Param::DecayTime, decay);
        e.prepare();
        assert_eq!(e.ir_len(), want, "decay {decay}");
        assert_eq!(e.kernel().len(), want);
    }
    assert_eq!(e.params().decay_time, 10.0);
}

#[test]
fn kernel_never_exceeds_capacity() {
    let cfg = EngineConfig { max_kernel_seconds: 1.0, ..config(ConvolutionMode::Auto, 2) };
    let mut e = ConvolutionEngine::new(cfg);
    e.initialize(SR).unwrap();
    e.set_parameter(Param::DecayTime, 10.0);
    e.prepare();
    assert_eq!(e.ir_len(), SR as usize);
}

#[test]
fn every_type_is_normalized() {
    let mut e = live(ConvolutionMode::Auto, 3);
    e.set_parameter(Param::DecayTime, 1.0);
    for t in IrType::ALL {
        e.set_ir_type(t);
        e.prepare();
        let peak = e.kernel().iter().fold(0.0_f32, |m, v| m.max(v.abs()));
        assert!(peak <= 0.95 + 1e-6, "{t}: peak {peak}");
        assert!(peak > 0.9, "{t}: peak {peak}");
        let stats = e.ir_stats().unwrap();
        assert_eq!(stats.peak, peak);
        assert!(stats.norm_gain > 0.0);
    }
}

#[test]
fn seeded_engines_build_identical_kernels() {
    let mut a = live(ConvolutionMode::Auto, 99);
    let mut b = live(ConvolutionMode::Auto, 99);
    a.set_parameter(Param::DecayTime, 0.8);
    b.set_parameter(Param::DecayTime, 0.8);
    a.prepare();
    b.prepare();
    assert_eq!(a.kernel(), b.kernel());
}

#[test]
fn repeated_mix_changes_are_bit_identical() {
    let first = noise(700, 0.3, 4);
    let second = noise(900, 0.3, 5);

    let mut a = live(ConvolutionMode::Direct, 6);
    a.set_parameter(Param::DecayTime, 0.5);
    a.process_to_vec(&first);
    a.set_parameter(Param::Mix, 70.0);
    a.set_parameter(Param::Mix, 70.0);
    let out_a = a.process_to_vec(&second);

    let mut b = live(ConvolutionMode::Direct, 6);
    b.set_parameter(Param::DecayTime, 0.5);
    b.process_to_vec(&first);
    b.set_parameter(Param::Mix, 70.0);
    let out_b = b.process_to_vec(&second);

    assert_eq!(out_a, out_b);
    assert!(!a.is_kernel_dirty());
}

#[test]
fn mix_change_keeps_history() {
    let mut e = live(ConvolutionMode::Direct, 7);
    e.set_parameter(Param::DecayTime, 0.5);
    e.process_to_vec(&noise(100, 0.3, 8));
    e.set_parameter(Param::Mix, 90.0);
    e.process_to_vec(&noise(50, 0.3, 9));
    assert_eq!(e.history_write_pos(), Some(150));
}

#[test]
fn mix_zero_is_fully_dry() {
    let mut e = live(ConvolutionMode::Auto, 10);
    e.set_parameter(Param::Mix, 0.0);
    let x = noise(2_000, 0.5, 11);
    assert_eq!(e.process_to_vec(&x), x);
}

#[test]
fn mix_full_drops_the_dry_term() {
    let mut e = live(ConvolutionMode::Direct, 12);
    e.set_parameter(Param::DecayTime, 0.5);
    e.set_parameter(Param::Mix, 100.0);
    let out = e.process_to_vec(&impulse(1_000, 0.5));
    let kernel = e.kernel();
    for (i, (y, k)) in out.iter().zip(kernel).enumerate() {
        assert!((y - 0.5 * k).abs() < 1e-6, "sample {i}: {y} vs {}", 0.5 * k);
    }
}

#[test]
fn regeneration_clears_history() {
    let mut e = live(ConvolutionMode::Direct, 13);
    e.set_parameter(Param::DecayTime, 0.5);
    e.set_parameter(Param::Mix, 100.0);
    e.process_to_vec(&noise(256, 0.2, 14));
    assert_eq!(e.history_write_pos(), Some(256));

    e.set_parameter(Param::RoomSize, 70.0);
    assert!(e.is_kernel_dirty());
    let out = e.process_to_vec(&impulse(512, 0.5));

    // Only the new impulse may ring; nothing from the first block survives.
    let kernel = e.kernel();
    for (i, (y, k)) in out.iter().zip(kernel).enumerate() {
        assert!((y - 0.5 * k).abs() < 1e-6, "sample {i}: {y} vs {}", 0.5 * k);
    }
    assert_eq!(e.history_write_pos(), Some(512));
}

#[test]
fn output_is_soft_limited() {
    let mut e = live(ConvolutionMode::Auto, 15);
    e.set_parameter(Param::Mix, 0.0);
    let out = e.process_to_vec(&[3.0, -3.0, 0.96, 0.5]);
    assert!(out[0] > 0.95 && out[0] <= 1.0);
    assert_eq!(out[1], -out[0]);
    assert!(out[2] > 0.95 && out[2] < 0.96);
    assert_eq!(out[3], 0.5);
}

#[test]
fn direct_and_partitioned_agree() {
    let mut direct = live(ConvolutionMode::Direct, 16);
    let mut fft = live(ConvolutionMode::Partitioned, 16);
    for e in [&mut direct, &mut fft] {
        e.set_parameter(Param::DecayTime, 0.6);
        e.set_parameter(Param::Mix, 60.0);
        e.set_ir_type(IrType::Plate);
    }

    let x = noise(6_000, 0.25, 17);
    let mut start = 0;
    for block in [64, 1, 333, 1024, 2048, 17].iter().cycle() {
        if start >= x.len() {
            break;
        }
        let end = (start + block).min(x.len());
        let a = direct.process_to_vec(&x[start..end]);
        let b = fft.process_to_vec(&x[start..end]);
        for (i, (p, q)) in a.iter().zip(&b).enumerate() {
            assert!((p - q).abs() < 1e-4, "sample {}: {p} vs {q}", start + i);
        }
        start = end;
    }
    assert_eq!(direct.convolution_strategy(), Some(Strategy::Direct));
    assert_eq!(fft.convolution_strategy(), Some(Strategy::Partitioned));
}

#[test]
fn lifecycle_guards() {
    let mut e = live(ConvolutionMode::Auto, 18);
    let err = e.initialize(SR).unwrap_err();
    assert!(matches!(err, EngineError::AlreadyInitialized(_)));
    assert_eq!(err.code(), -2);
    assert!(e.is_initialized());

    e.set_parameter(Param::RoomSize, 20.0);
    e.set_impulse_response_type("not-a-room");
    assert_eq!(e.ir_type(), IrType::Hall);

    e.cleanup();
    e.cleanup();
    assert!(!e.is_initialized());

    e.initialize(SR).unwrap();
    // Re-initialization restores defaults.
    assert_eq!(e.params().room_size, 50.0);
}

#[test]
fn hall_impulse_end_to_end_at_48k() {
    let mut e = ConvolutionEngine::new(EngineConfig::default().with_seed(2024));
    e.initialize(48_000).unwrap();
    e.set_impulse_response_type("hall");
    e.set_parameter_id(0, 50.0);
    e.set_parameter_id(1, 2.5);
    assert_eq!(e.params().room_size, 50.0);
    assert_eq!(e.params().decay_time, 2.5);

    let out = e.process_to_vec(&impulse(4_096, 1.0));
    assert!(out[1..].iter().any(|v| v.abs() > 1e-6), "no wet tail");
    assert!(out.iter().all(|v| v.is_finite() && v.abs() <= 1.0));

    let kernel = e.kernel();
    assert_eq!(kernel.len(), 120_000);
    let tenth = kernel.len() / 10;
    let energy = |s: &[f32]| s.iter().map(|v| v * v).sum::<f32>();
    assert!(energy(&kernel[kernel.len() - tenth..]) < energy(&kernel[..tenth]));
}
