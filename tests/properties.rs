//! Property-based tests for the rider's detectors and gain computer.
//!
//! Covers coefficient ranges, detector convergence, hold gating, target gain
//! limits, reset idempotence, dB conversions and silence behaviour using
//! proptest for randomized input generation.

use proptest::prelude::*;
use vocal_rider::dsp::utils::{db_to_gain, gain_to_db, time_constant_coeff, MIN_DB};
use vocal_rider::dsp::{
    calculate_target_gain, GainSmoother, HoldGate, HoldState, PeakDetector, RmsDetector,
};
use vocal_rider::{RiderSettings, VocalRider};

const SAMPLE_RATES: [f32; 3] = [44100.0, 48000.0, 96000.0];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// One-pole coefficients stay in [0, 1) for 0.1 ms to 10 s.
    #[test]
    fn coefficient_in_unit_interval(
        tau_ms in 0.1f32..=10_000.0f32,
        sr_index in 0usize..3,
    ) {
        let alpha = time_constant_coeff(tau_ms, SAMPLE_RATES[sr_index]);
        prop_assert!(alpha >= 0.0, "alpha {} below zero", alpha);
        prop_assert!(alpha < 1.0, "alpha {} not below one (tau {} ms)", alpha, tau_ms);
    }

    /// A constant |x| = a reads back as a once the window is full.
    #[test]
    fn rms_of_constant_converges(
        a in 0.01f32..=1.0f32,
        negative in any::<bool>(),
        window_ms in 10.0f32..=100.0f32,
        sr_index in 0usize..3,
    ) {
        let x = if negative { -a } else { a };
        let mut det = RmsDetector::new(SAMPLE_RATES[sr_index], window_ms);
        let n = det.window_len_samples();
        let mut db = MIN_DB;
        for _ in 0..n {
            db = det.next_level_db(x);
        }
        let level = db_to_gain(db);
        prop_assert!(
            (level - a).abs() < 1e-5,
            "window {} ms ({} samples): expected {}, got {}",
            window_ms, n, a, level
        );
    }

    /// The peak envelope rises monotonically toward |a| on a DC input.
    #[test]
    fn peak_converges_monotonically(
        a in -1.0f32..=1.0f32,
        attack_ms in 0.1f32..=10.0f32,
    ) {
        let mut det = PeakDetector::new(48000.0);
        det.set_attack_ms(attack_ms);
        let mut prev = det.envelope();
        for _ in 0..48000 {
            det.next_level_db(a);
            let env = det.envelope();
            prop_assert!(env >= prev - 1e-6, "envelope fell from {} to {}", prev, env);
            prev = env;
        }
        prop_assert!((prev - a.abs()).abs() < 1e-4, "settled at {} for |a| = {}", prev, a.abs());
    }

    /// With zero-length ballistics the smoother is transparent.
    #[test]
    fn zero_coefficients_follow_instantly(
        targets in prop::collection::vec(-24.0f32..=24.0f32, 1..64),
    ) {
        let mut sm = GainSmoother::new(48000.0);
        // 1 ms at 1 Hz: exp(-1000) == 0 in f32
        sm.prepare(1.0);
        sm.set_attack_ms(1.0);
        sm.set_release_ms(1.0);
        prop_assert_eq!(sm.shared().attack_coeff(), 0.0);
        prop_assert_eq!(sm.shared().release_coeff(), 0.0);

        for &t in &targets {
            prop_assert_eq!(sm.process_sample(t), t);
        }
    }

    /// A lower target is held back for exactly `hold` calls.
    #[test]
    fn hold_substitutes_last_target(
        last in -12.0f32..=12.0f32,
        drops in prop::collection::vec(1.0f32..=12.0f32, 1..200),
        hold in 1u32..200,
    ) {
        let mut gate = HoldGate::new();
        // Hold disabled for the first call so `last` is adopted directly
        gate.process(last, 0);
        prop_assert_eq!(gate.last_target_db(), last);

        let mut calls = 0u32;
        for &d in &drops {
            let out = gate.process(last - d, hold);
            if calls < hold {
                prop_assert_eq!(out, last);
                prop_assert_eq!(gate.state(), HoldState::Hold);
            } else {
                prop_assert_eq!(out, last - d);
                break;
            }
            calls += 1;
        }
    }

    /// Target gain is zero in silence and within +/- range otherwise.
    #[test]
    fn target_gain_bounded(
        level in -120.0f32..=6.0f32,
        target in -60.0f32..=0.0f32,
        range in 0.0f32..=24.0f32,
    ) {
        let g = calculate_target_gain(level, target, range);
        if level < -60.0 {
            prop_assert_eq!(g, 0.0);
        } else {
            prop_assert!(g >= -range && g <= range, "{} outside +/-{}", g, range);
        }
    }

    /// Resetting twice leaves every stage exactly as resetting once.
    #[test]
    fn reset_is_idempotent(
        input in prop::array::uniform32(-1.0f32..=1.0f32),
        probe in -1.0f32..=1.0f32,
    ) {
        let run = |resets: usize| {
            let mut rms = RmsDetector::new(48000.0, 10.0);
            let mut peak = PeakDetector::new(48000.0);
            let mut sm = GainSmoother::new(48000.0);
            for &x in &input {
                rms.process_sample(x);
                peak.process_sample(x);
                sm.process_sample(x * 12.0);
            }
            for _ in 0..resets {
                rms.reset();
                peak.reset();
                sm.reset();
            }
            (
                rms.current_level_db(),
                peak.current_level_db(),
                sm.current_gain_db(),
                rms.process_sample(probe),
                peak.process_sample(probe),
                sm.process_sample(probe * 12.0),
            )
        };
        prop_assert_eq!(run(1), run(2));
    }

    /// dB <-> linear conversions round-trip.
    #[test]
    fn db_round_trip(db in -60.0f32..=24.0f32) {
        let lin = db_to_gain(db);
        let back = gain_to_db(lin, MIN_DB);
        prop_assert!((back - db).abs() < 1e-5, "{} dB -> {} -> {} dB", db, lin, back);
        prop_assert!((db_to_gain(back) - lin).abs() <= lin * 1e-5);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// After silence the rider returns to unity gain and the RMS floor.
    #[test]
    fn silence_returns_to_unity(
        loud in prop::array::uniform32(-1.0f32..=1.0f32),
        release_ms in 1.0f32..=200.0f32,
        hold_ms in 0.0f32..=100.0f32,
        window_ms in 10.0f32..=100.0f32,
    ) {
        let settings = RiderSettings {
            release_ms,
            hold_ms,
            rms_window_ms: window_ms,
            ..RiderSettings::default()
        };
        let (mut rider, _feed) = VocalRider::new(&settings);
        rider.prepare(48000.0, 512);

        let mut block = [0.0f32; 512];
        for _ in 0..20 {
            for (i, s) in block.iter_mut().enumerate() {
                *s = loud[i % loud.len()];
            }
            rider.process_in_place(&mut [&mut block[..]]);
        }

        // 5 s of silence
        for _ in 0..470 {
            block.fill(0.0);
            rider.process_in_place(&mut [&mut block[..]]);
        }

        let meters = rider.meters();
        prop_assert_eq!(meters.gain_db(), 0.0);
        prop_assert!(meters.input_rms_db() <= -99.0);
    }

    /// Output stays finite and the gain stays inside the configured ranges.
    #[test]
    fn gain_stays_in_range(
        input in prop::collection::vec(prop_oneof![
            8 => -1.0f32..=1.0f32,
            1 => Just(f32::NAN),
            1 => Just(f32::INFINITY),
        ], 256..2048),
        boost in 0.0f32..=24.0f32,
        cut in 0.0f32..=24.0f32,
        target in -60.0f32..=0.0f32,
    ) {
        let settings = RiderSettings {
            target_level_db: target,
            boost_range_db: boost,
            cut_range_db: cut,
            attack_ms: 1.0,
            release_ms: 1.0,
            ..RiderSettings::default()
        };
        let (mut rider, _feed) = VocalRider::new(&settings);
        rider.prepare(48000.0, 4096);

        let mut buffer = input.clone();
        for chunk in buffer.chunks_mut(64) {
            rider.process_in_place(&mut [chunk]);
            let g = rider.current_gain_db();
            prop_assert!(g <= boost + 1e-4 && g >= -cut - 1e-4, "gain {} outside [-{}, {}]", g, cut, boost);
        }
        prop_assert!(buffer.iter().all(|y| y.is_finite()));
    }
}
