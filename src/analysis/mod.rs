// Analysis module - the signal-measurement pipeline
//
// Data flows one way: normalized samples -> time-domain features ->
// frequency-domain features -> derived metrics. Each stage is a pure
// function of its inputs plus the read-only calibration model, returning
// an immutable result; re-analysis of a new capture is another invocation,
// never an update of shared state.
//
// Module organization:
// - time_domain: RMS/period extraction (TimeDomainAnalyzer)
// - spectrum: FFT and calibrated normalization (Spectrum)
// - harmonics: aliasing-aware harmonic generation
// - peaks: peak extraction with phase-noise-skirt suppression
// - frequency_domain: metric calculators (FrequencyDomainAnalyzer)

pub mod frequency_domain;
pub mod harmonics;
pub mod peaks;
pub mod spectrum;
pub mod time_domain;

pub use frequency_domain::{
    jitter, snr_jitter, FrequencyDomainAnalyzer, FrequencyDomainResult, PhaseNoisePoint,
};
pub use harmonics::harmonic_frequencies;
pub use peaks::{extract_peaks, Peak, PeakParams};
pub use spectrum::{MagnitudeKind, Spectrum};
pub use time_domain::{
    detect_periods, Period, PeriodStats, TimeDomainAnalyzer, TimeDomainOptions, TimeDomainResult,
    WaveformSegment,
};
