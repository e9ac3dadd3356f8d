// Multi-tone sine stimulus synthesis
//
// Generates the known single-tone (or multi-tone) stimulus that the
// measured signal chain is driven with. Each tone contributes
// a·sin(2π·f·t) over a linearly spaced time axis; the caller is
// responsible for keeping the summed amplitude within [-1, 1] if the
// result is to be analyzed directly.

use std::path::Path;

use log::info;

use crate::error::SignalError;
use crate::signal::{wav, Signal};

/// Description of a sine stimulus: tone list, rate, and length
#[derive(Debug, Clone)]
pub struct SineStimulus {
    frequencies: Vec<f64>,
    amplitudes: Vec<f64>,
    sample_rate: u32,
    length_secs: f64,
}

impl SineStimulus {
    /// Create a stimulus description
    ///
    /// # Arguments
    /// * `frequencies` - tone frequencies in Hz (at least one)
    /// * `amplitudes` - linear amplitude per tone, same length as `frequencies`
    /// * `sample_rate` - sampling rate in Hz
    /// * `length_secs` - signal length in seconds
    pub fn new(
        frequencies: Vec<f64>,
        amplitudes: Vec<f64>,
        sample_rate: u32,
        length_secs: f64,
    ) -> Result<Self, SignalError> {
        if frequencies.is_empty() {
            return Err(SignalError::InvalidStimulus {
                reason: "at least one frequency is required".to_string(),
            });
        }
        if amplitudes.len() != frequencies.len() {
            return Err(SignalError::InvalidStimulus {
                reason: format!(
                    "got {} amplitudes for {} frequencies",
                    amplitudes.len(),
                    frequencies.len()
                ),
            });
        }
        if sample_rate == 0 {
            return Err(SignalError::InvalidStimulus {
                reason: "sampling rate must be positive".to_string(),
            });
        }
        if length_secs <= 0.0 {
            return Err(SignalError::InvalidStimulus {
                reason: format!("invalid length: {}", length_secs),
            });
        }

        Ok(Self {
            frequencies,
            amplitudes,
            sample_rate,
            length_secs,
        })
    }

    /// Synthesize the stimulus into a normalized-rate Signal
    pub fn synthesize(&self) -> Signal {
        let count = (self.sample_rate as f64 * self.length_secs) as usize;
        let fs = self.sample_rate as f64;

        let samples: Vec<f64> = (0..count)
            .map(|i| {
                let t = i as f64 / fs;
                self.frequencies
                    .iter()
                    .zip(self.amplitudes.iter())
                    .map(|(&f, &a)| (2.0 * std::f64::consts::PI * f * t).sin() * a)
                    .sum()
            })
            .collect();

        Signal::new(samples, self.sample_rate)
    }

    /// Synthesize and write the stimulus to a 32-bit float WAV file
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), SignalError> {
        let signal = self.synthesize();
        wav::store_wav(&path, &signal.samples, self.sample_rate)?;

        info!(
            "[Stimulus] Wrote {} tone(s), {} s at {} Hz to {:?}",
            self.frequencies.len(),
            self.length_secs,
            self.sample_rate,
            path.as_ref()
        );

        Ok(())
    }
}
