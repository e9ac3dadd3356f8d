//! End-to-end measurement scenarios over the full analysis pipeline
//!
//! These tests drive the complete chain (signal -> time-domain analysis ->
//! frequency-domain analysis -> derived metrics) with synthetic captures of
//! known spectral content, including:
//! - Clean 997 Hz reference tone characterization
//! - Two-tone harmonic classification
//! - Leakage behavior versus capture length
//! - Jitter integration against its closed form

use toneprobe::analysis::{
    jitter, FrequencyDomainAnalyzer, PhaseNoisePoint, TimeDomainAnalyzer, TimeDomainOptions,
};
use toneprobe::calibration::CalibrationModel;
use toneprobe::config::AnalysisConfig;
use toneprobe::error::AnalysisError;
use toneprobe::signal::generator::SineStimulus;
use toneprobe::signal::Signal;

/// Reference calibration of the specification scenarios
fn reference_calibration() -> CalibrationModel {
    CalibrationModel::new(1.0, 0.7071, 1.0, 600.0, 30.0, 30.0, "dBFS")
}

fn analyze(
    signal: &Signal,
    cal: &CalibrationModel,
) -> toneprobe::analysis::FrequencyDomainResult {
    let tda = TimeDomainAnalyzer::default()
        .analyze(signal, Some(cal))
        .expect("time-domain analysis");
    FrequencyDomainAnalyzer::analyze(&tda, cal, None, &AnalysisConfig::default())
        .expect("frequency-domain analysis")
}

/// Clean full-scale 997 Hz tone, 48 kHz, 5 s: the reference characterization
/// scenario. The fundamental must land on 997 Hz, distortion metrics must be
/// bounded only by FFT arithmetic noise, and SNR must be far above 100 dB.
#[test]
fn test_clean_997hz_reference_scenario() {
    let cal = reference_calibration();
    let signal = SineStimulus::new(vec![997.0], vec![1.0], 48000, 5.0)
        .unwrap()
        .synthesize();

    let tda = TimeDomainAnalyzer::default()
        .analyze(&signal, Some(&cal))
        .unwrap();

    // Time-domain side: unit sine against nrms 0.7071 is ~1 Vrms, and the
    // period detector agrees with the spectral fundamental
    assert!((tda.rms() - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    assert!((tda.vrms().unwrap() - 1.0).abs() < 1e-3);
    let inferred = tda.fundamental_frequency(1).unwrap();
    assert!((inferred - 997.0).abs() < 1.0, "inferred {}", inferred);

    let result =
        FrequencyDomainAnalyzer::analyze(&tda, &cal, None, &AnalysisConfig::default()).unwrap();

    // 5 s capture: 0.2 Hz per bin; the fundamental must be within one bin
    assert_eq!(result.resolution_hz, 0.2);
    assert!(
        (result.fundamental_hz - 997.0).abs() <= result.resolution_hz,
        "fundamental {}",
        result.fundamental_hz
    );
    assert!((result.carrier_hz - 997.0).abs() <= result.resolution_hz);

    assert!(
        result.thd_percent < 0.01,
        "THD {}% should be arithmetic noise only",
        result.thd_percent
    );
    assert!(
        result.thdn_percent < 0.01,
        "THD+N {}% should be arithmetic noise only",
        result.thdn_percent
    );
    assert!(result.snr_db > 100.0, "SNR {} dB", result.snr_db);
    assert!(result.sfdr_db > 100.0, "SFDR {} dB", result.sfdr_db);

    // Strongest peak is the carrier
    assert_eq!(result.peaks[0].bin, 4985);
    assert!(!result.peaks[0].is_harmonic);
}

/// Two-tone signal: 997 Hz plus its third harmonic at matched amplitude.
/// The peak at the third-harmonic frequency must be classified as an odd
/// harmonic. (The harmonic sits a hair below the fundamental so the bin
/// ordering stays deterministic.)
#[test]
fn test_two_tone_third_harmonic_classification() {
    let cal = reference_calibration();
    let signal = SineStimulus::new(vec![997.0, 2991.0], vec![0.5, 0.4999], 48000, 5.0)
        .unwrap()
        .synthesize();

    let result = analyze(&signal, &cal);

    assert!((result.fundamental_hz - 997.0).abs() <= result.resolution_hz);

    let third = result
        .peaks
        .iter()
        .find(|p| (p.freq - 2991.0).abs() <= result.resolution_hz)
        .expect("third harmonic peak");
    assert!(third.is_harmonic, "third harmonic not flagged");
    assert!(!third.is_harmonic_even, "third harmonic flagged even");

    // The equal-energy harmonic dominates distortion: THD ~ 100%
    assert!(
        result.thd_percent > 90.0 && result.thd_percent < 110.0,
        "THD {}%",
        result.thd_percent
    );
}

/// THD over a tone's own exact harmonic bins converges toward zero as the
/// capture length grows and bin leakage decreases.
#[test]
fn test_thd_decreases_with_capture_length() {
    let cal = reference_calibration();

    // A non-integer cycle count forces leakage
    let short = SineStimulus::new(vec![997.3], vec![1.0], 48000, 1.0)
        .unwrap()
        .synthesize();
    let long = SineStimulus::new(vec![997.3], vec![1.0], 48000, 10.0)
        .unwrap()
        .synthesize();

    let thd_short = analyze(&short, &cal).thd_percent;
    let thd_long = analyze(&long, &cal).thd_percent;

    assert!(
        thd_long < thd_short,
        "THD did not converge: {}% (1 s) vs {}% (10 s)",
        thd_short,
        thd_long
    );
}

/// A jitter table reporting the same dBc/Hz at every offset has per-segment
/// slope a = 0, collapsing the integral to the closed-form single-segment
/// result 10^(L/10) * (f_last - f_first).
#[test]
fn test_flat_phase_noise_jitter_matches_closed_form() {
    let level = -130.0;
    let pn = vec![
        PhaseNoisePoint {
            offset_hz: 2.0,
            dbc_hz: level,
        },
        PhaseNoisePoint {
            offset_hz: 10.0,
            dbc_hz: level,
        },
        PhaseNoisePoint {
            offset_hz: 100.0,
            dbc_hz: level,
        },
        PhaseNoisePoint {
            offset_hz: 1000.0,
            dbc_hz: level,
        },
    ];
    let fc = 997.0;

    let expected = (2.0 * 10f64.powf(level / 10.0) * (1000.0 - 2.0)).sqrt()
        / (2.0 * std::f64::consts::PI * fc);
    let measured = jitter(&pn, fc);

    assert!(
        ((measured - expected) / expected).abs() < 1e-9,
        "jitter {} vs closed form {}",
        measured,
        expected
    );
}

/// The measurement pipeline reports the phase-noise table and derived jitter
/// for a real capture, and both stay physically plausible for a clean tone.
#[test]
fn test_phase_noise_and_jitter_for_clean_capture() {
    let cal = reference_calibration();
    let signal = SineStimulus::new(vec![997.0], vec![1.0], 48000, 5.0)
        .unwrap()
        .synthesize();

    let result = analyze(&signal, &cal);

    assert_eq!(result.phase_noise.len(), 4);
    // 0.2 Hz resolution: first offset is ceil(0.4) = 1 Hz, then the decades
    let offsets: Vec<f64> = result.phase_noise.iter().map(|p| p.offset_hz).collect();
    assert_eq!(offsets, vec![1.0, 10.0, 100.0, 1000.0]);

    for point in &result.phase_noise {
        assert!(
            point.dbc_hz < -100.0,
            "phase noise {} dBc/Hz at {} Hz",
            point.dbc_hz,
            point.offset_hz
        );
    }

    assert!(result.jitter_secs >= 0.0);
    assert!(result.jitter_secs < 1e-6, "jitter {} s", result.jitter_secs);
    assert!(result.snr_jitter_db > 100.0);
}

/// A capture with a known additive noise floor lands in the expected SNR,
/// THD+N and ENOB bands.
#[test]
fn test_noisy_capture_metrics_match_noise_level() {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    let cal = reference_calibration();
    let mut rng = StdRng::seed_from_u64(0x5EED);

    // Uniform noise at +/-1e-4 full scale: noise RMS 1e-4/sqrt(3), so the
    // expected SNR is 20*log10((0.9/sqrt(2)) / (1e-4/sqrt(3))) ~ 80.8 dB
    let samples: Vec<f64> = (0..240000)
        .map(|i| {
            0.9 * (2.0 * std::f64::consts::PI * 997.0 * i as f64 / 48000.0).sin()
                + rng.gen_range(-1e-4..1e-4)
        })
        .collect();
    let signal = Signal::new(samples, 48000);

    let result = analyze(&signal, &cal);

    assert!(
        result.snr_db > 70.0 && result.snr_db < 90.0,
        "SNR {} dB",
        result.snr_db
    );
    assert!(
        result.thdn_percent > 0.001 && result.thdn_percent < 0.1,
        "THD+N {}%",
        result.thdn_percent
    );
    assert!(
        result.enob_bits > 11.0 && result.enob_bits < 16.0,
        "ENOB {} bits",
        result.enob_bits
    );
    // The noise is uncorrelated with the stimulus, so harmonic distortion
    // stays far below THD+N
    assert!(result.thd_percent < result.thdn_percent);
}

/// Unnormalized input fails the whole pipeline up front.
#[test]
fn test_unnormalized_capture_fails_fast() {
    let cal = reference_calibration();
    let samples: Vec<f64> = (0..48000)
        .map(|i| 1.5 * (2.0 * std::f64::consts::PI * 997.0 * i as f64 / 48000.0).sin())
        .collect();
    let signal = Signal::new(samples, 48000);

    let result = TimeDomainAnalyzer::default().analyze(&signal, Some(&cal));
    assert!(matches!(
        result,
        Err(AnalysisError::SignalNotNormalized { .. })
    ));
}

/// A capture without a single complete cycle reports periods as unavailable
/// while the spectral path keeps working.
#[test]
fn test_subcycle_capture_has_no_periods_but_full_spectrum() {
    let cal = reference_calibration();
    // A fifth of one 10 Hz cycle
    let samples: Vec<f64> = (0..960)
        .map(|i| (2.0 * std::f64::consts::PI * 10.0 * i as f64 / 48000.0).sin())
        .collect();
    let signal = Signal::new(samples, 48000);

    let tda = TimeDomainAnalyzer::default()
        .analyze(&signal, Some(&cal))
        .unwrap();

    assert!(matches!(
        tda.periods(),
        Err(AnalysisError::PeriodsUnavailable)
    ));
    assert!(matches!(
        tda.fundamental_frequency(1),
        Err(AnalysisError::PeriodsUnavailable)
    ));

    // Frequency-domain analysis does not depend on detected periods
    let result =
        FrequencyDomainAnalyzer::analyze(&tda, &cal, None, &AnalysisConfig::default()).unwrap();
    assert!(result.fundamental_hz > 0.0);
}

/// Re-analysis with the same calibration model is deterministic: two
/// invocations over the same capture yield identical metrics.
#[test]
fn test_reanalysis_is_deterministic() {
    let cal = reference_calibration();
    let signal = SineStimulus::new(vec![997.0], vec![0.9], 48000, 1.0)
        .unwrap()
        .synthesize();

    let first = analyze(&signal, &cal);
    let second = analyze(&signal, &cal);

    assert_eq!(first.fundamental_hz, second.fundamental_hz);
    assert_eq!(first.thd_percent, second.thd_percent);
    assert_eq!(first.thdn_percent, second.thdn_percent);
    assert_eq!(first.snr_db, second.snr_db);
    assert_eq!(first.sfdr_db, second.sfdr_db);
    assert_eq!(first.jitter_secs, second.jitter_secs);
}

/// Zero-padding a capture refines the bin spacing without changing the
/// reported spectral resolution, which is tied to the unpadded length.
#[test]
fn test_padding_preserves_reported_resolution() {
    let cal = reference_calibration();
    let signal = SineStimulus::new(vec![997.0], vec![1.0], 48000, 1.0)
        .unwrap()
        .synthesize();

    let analyzer = TimeDomainAnalyzer::new(TimeDomainOptions {
        detect_periods: true,
        pad_to_secs: Some(2.0),
    });
    let tda = analyzer.analyze(&signal, Some(&cal)).unwrap();
    assert_eq!(tda.duration_secs(), 2.0);
    assert_eq!(tda.duration_unpadded_secs(), 1.0);

    let result =
        FrequencyDomainAnalyzer::analyze(&tda, &cal, None, &AnalysisConfig::default()).unwrap();

    // Resolution reflects the real capture, bins reflect the padded FFT
    assert_eq!(result.resolution_hz, 1.0);
    assert_eq!(result.spectrum.len(), 48000);
    assert!((result.fundamental_hz - 997.0).abs() <= 0.5);
}
