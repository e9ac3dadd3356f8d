// Toneprobe - audio signal path measurement
// Sine-stimulus analysis: calibrated THD, THD+N, SNR, SFDR, ENOB,
// phase noise and jitter measurements over captured waveforms.

// Module declarations
pub mod analysis;
pub mod calibration;
pub mod config;
pub mod error;
pub mod signal;

// Re-exports for convenience
pub use analysis::{
    FrequencyDomainAnalyzer, FrequencyDomainResult, TimeDomainAnalyzer, TimeDomainOptions,
    TimeDomainResult,
};
pub use calibration::CalibrationModel;
pub use config::AppConfig;
pub use signal::Signal;
