//! Configuration management for analyzer parameter tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling measurement parameters to be adjusted without recompilation.
//! Key knobs for harmonic accounting, peak extraction and the stimulus
//! generator can be tweaked via the config file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub stimulus: StimulusConfig,
}

/// Analysis pipeline parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Number of harmonics accounted in distortion/noise masking
    pub harmonics: usize,
    /// Number of peaks requested for peak-list reports
    pub peak_count: usize,
    /// Length of the suppressed-magnitude history used by the
    /// phase-noise-skirt filter
    pub peak_track_window: usize,
    /// Requested accuracy of the refined carrier estimate, in Hz
    pub carrier_accuracy_hz: f64,
    /// Decimal places the inferred fundamental frequency is rounded to
    pub ffreq_round_decimals: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            // First 10 harmonics: the first 5 even and 5 odd harmonics are
            // always included, weighting second-order-dominant and
            // third-order-dominant signal chains similarly.
            harmonics: 10,
            peak_count: 10,
            peak_track_window: 64,
            carrier_accuracy_hz: 1.0,
            ffreq_round_decimals: 1,
        }
    }
}

/// Stimulus generator defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StimulusConfig {
    /// Sampling rate in Hz
    pub sample_rate: u32,
    /// Tone frequencies in Hz
    pub frequencies_hz: Vec<f64>,
    /// Linear amplitude per tone
    pub amplitudes: Vec<f64>,
    /// Signal length in seconds
    pub length_secs: f64,
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            // 997 Hz: the standard audio-band test frequency, chosen to be
            // co-prime with common sampling rates
            frequencies_hz: vec![997.0],
            amplitudes: vec![1.0],
            length_secs: 2.0,
        }
    }
}

impl Default for AppConfig {
    /// Default configuration values (fallback if config file not found)
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            stimulus: StimulusConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    ///
    /// Falls back to defaults (with a warning) if the file is missing or
    /// malformed, so a broken config never aborts a measurement run.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}
