// Time-domain analyzer - RMS/peak extraction and period segmentation
//
// Computes amplitude statistics of a normalized signal, converts them to
// calibrated voltages, and segments the signal into consecutive single-cycle
// periods using rising-zero-crossing detection. The period boundaries drive
// the inferred fundamental frequency and the overlaid waveform views.

use log::debug;

use crate::calibration::CalibrationModel;
use crate::error::AnalysisError;
use crate::signal::Signal;

/// One full signal cycle as a closed index range into the sample sequence
///
/// `start` is the sample nearest a rising (negative-to-positive) zero
/// crossing; `end` is the last sample before the next rising crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: usize,
    pub end: usize,
}

#[allow(clippy::len_without_is_empty)]
impl Period {
    /// Period length in samples (the range is closed on both sides)
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Count, minimum, mean and maximum period length in samples
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PeriodStats {
    pub count: usize,
    pub min: usize,
    pub mean: f64,
    pub max: usize,
}

/// One extracted waveform segment with its aligned time axis
#[derive(Debug, Clone)]
pub struct WaveformSegment {
    pub samples: Vec<f64>,
    /// Seconds; offset so successive segments overlay against the
    /// reference frequency
    pub time: Vec<f64>,
}

/// Options for a time-domain analysis pass
#[derive(Debug, Clone)]
pub struct TimeDomainOptions {
    /// Run period detection as part of the analysis
    pub detect_periods: bool,
    /// Zero-pad the signal to this many seconds before analysis
    pub pad_to_secs: Option<f64>,
}

impl Default for TimeDomainOptions {
    fn default() -> Self {
        Self {
            detect_periods: true,
            pad_to_secs: None,
        }
    }
}

/// Detect consecutive single-cycle periods by zero-crossing analysis
///
/// Any sample whose magnitude is below half the minimum representable step
/// for the signal's bit depth is treated as exactly zero: floating-point
/// round-off near true zero crossings would otherwise allocate spurious
/// periods. Only the sign is tested beyond that clamp, which keeps the
/// detector tolerant of DC offset and amplitude noise.
///
/// The final incomplete cycle, if any, is discarded.
pub fn detect_periods(samples: &[f64], bit_depth: Option<u16>) -> Vec<Period> {
    let len = samples.len();
    let mut periods = Vec::new();

    if len < 2 {
        return periods;
    }

    let bits = match bit_depth {
        Some(b) if b > 0 => b,
        _ => 32,
    };
    let half_min_step = (1.0 / 2f64.powi(bits as i32)) / 2.0;
    let clamp = |x: f64| if x.abs() < half_min_step { 0.0 } else { x };

    let mut s: usize = 1;

    loop {
        // Find a zero crossing from an ascending amplitude
        while s < len - 1 {
            let prev = clamp(samples[s - 1]);
            let cur = clamp(samples[s]);
            if prev <= 0.0 && cur > 0.0 {
                break;
            }
            s += 1;
        }

        // The start index points at the zero sample itself when the
        // previous sample clamps to exactly zero
        let start = if clamp(samples[s - 1]) == 0.0 { s - 1 } else { s };

        // Walk one falling-then-rising sequence to close the cycle
        let mut zero_crossed = false;
        s += 1;
        while s < len {
            let cur = clamp(samples[s]);
            if !zero_crossed {
                if cur <= 0.0 {
                    zero_crossed = true;
                }
            } else if cur >= 0.0 {
                break;
            }
            s += 1;
        }

        // Validate that the cycle completed inside the signal; a trailing
        // partial cycle is rejected
        if s >= len {
            break;
        }
        if !zero_crossed || clamp(samples[s]) < 0.0 {
            break;
        }

        periods.push(Period { start, end: s - 1 });
    }

    periods
}

fn period_stats(periods: &[Period]) -> Option<PeriodStats> {
    if periods.is_empty() {
        return None;
    }

    let mut min = usize::MAX;
    let mut max = 0usize;
    let mut sum = 0usize;
    for p in periods {
        let len = p.len();
        min = min.min(len);
        max = max.max(len);
        sum += len;
    }

    Some(PeriodStats {
        count: periods.len(),
        min,
        mean: sum as f64 / periods.len() as f64,
        max,
    })
}

/// Immutable result of a time-domain analysis pass
#[derive(Debug, Clone)]
pub struct TimeDomainResult {
    samples: Vec<f64>,
    sample_rate: u32,
    bit_depth: Option<u16>,
    duration: f64,
    duration_unpadded: f64,
    rms: f64,
    peak: f64,
    vrms: Option<f64>,
    vpeak: Option<f64>,
    periods: Option<Vec<Period>>,
    period_stats: Option<PeriodStats>,
}

impl TimeDomainResult {
    /// The analyzed (possibly zero-padded) normalized samples
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bit_depth(&self) -> Option<u16> {
        self.bit_depth
    }

    /// Analyzed length in seconds, including any zero padding
    pub fn duration_secs(&self) -> f64 {
        self.duration
    }

    /// Original length in seconds, before zero padding
    pub fn duration_unpadded_secs(&self) -> f64 {
        self.duration_unpadded
    }

    /// RMS amplitude of the normalized signal
    pub fn rms(&self) -> f64 {
        self.rms
    }

    /// Peak amplitude of the normalized signal
    pub fn peak(&self) -> f64 {
        self.peak
    }

    /// RMS voltage relative to the calibrated 1 Vrms reference
    pub fn vrms(&self) -> Result<f64, AnalysisError> {
        self.vrms.ok_or(AnalysisError::MissingCalibration)
    }

    /// Peak voltage relative to the calibrated 1 Vrms reference
    pub fn vpeak(&self) -> Result<f64, AnalysisError> {
        self.vpeak.ok_or(AnalysisError::MissingCalibration)
    }

    /// Detected period boundaries, oldest first
    pub fn periods(&self) -> Result<&[Period], AnalysisError> {
        match &self.periods {
            Some(p) => Ok(p),
            None => Err(AnalysisError::PeriodsUnavailable),
        }
    }

    /// Period length statistics
    pub fn period_stats(&self) -> Result<PeriodStats, AnalysisError> {
        self.period_stats.ok_or(AnalysisError::PeriodsUnavailable)
    }

    /// Average number of samples per period
    pub fn mean_period_samples(&self) -> Result<f64, AnalysisError> {
        Ok(self.period_stats()?.mean)
    }

    /// Infer the fundamental frequency from the mean period length
    ///
    /// The period is defined here as the number of samples per cycle, not
    /// in seconds.
    pub fn fundamental_frequency(&self, round_decimals: u32) -> Result<f64, AnalysisError> {
        let mean = self.mean_period_samples()?;
        let raw = self.sample_rate as f64 / mean;
        let scale = 10f64.powi(round_decimals as i32);
        Ok((raw * scale).round() / scale)
    }

    /// (Re)run period detection on this result
    ///
    /// Intended for results produced with `detect_periods: false`, or for
    /// re-checking after the fact. Fails if no complete period exists.
    pub fn compute_periods(&mut self) -> Result<(), AnalysisError> {
        let periods = detect_periods(&self.samples, self.bit_depth);
        let stats = period_stats(&periods);
        match stats {
            Some(stats) => {
                self.periods = Some(periods);
                self.period_stats = Some(stats);
                Ok(())
            }
            None => Err(AnalysisError::PeriodsUnavailable),
        }
    }

    /// Extract consecutive waveform segments of `cycles_per_segment` full
    /// cycles each, with time axes aligned to `ref_freq` (defaults to the
    /// inferred fundamental) so successive segments overlay consistently.
    pub fn waveforms(
        &self,
        cycles_per_segment: usize,
        ref_freq: Option<f64>,
    ) -> Result<Vec<WaveformSegment>, AnalysisError> {
        let periods = self.periods()?;
        let ffreq = match ref_freq {
            Some(f) => f,
            None => self.fundamental_frequency(1)?,
        };

        let fs = self.sample_rate as f64;
        let samples_per_cycle = fs / ffreq;
        let dt = 1.0 / fs;
        let first_start = periods[0].start;
        // Time offset of the sample where the first valid period begins,
        // folded onto the reference cycle
        let base_shift = (first_start as f64 % samples_per_cycle) * dt;

        let mut segments = Vec::new();
        let mut count = 1usize;
        let mut start_idx = first_start;

        for p in periods {
            if count < cycles_per_segment {
                count += 1;
                continue;
            }

            let window = &self.samples[start_idx..=p.end];
            let shift = (start_idx as f64 % samples_per_cycle) * dt - base_shift;
            let time = (0..window.len()).map(|i| i as f64 * dt + shift).collect();

            segments.push(WaveformSegment {
                samples: window.to_vec(),
                time,
            });

            count = 1;
            start_idx = p.end + 1;
        }

        Ok(segments)
    }
}

/// Time-domain analysis pass over a normalized signal
#[derive(Debug, Default)]
pub struct TimeDomainAnalyzer {
    options: TimeDomainOptions,
}

impl TimeDomainAnalyzer {
    pub fn new(options: TimeDomainOptions) -> Self {
        Self { options }
    }

    /// Analyze a signal, optionally against a calibration model
    ///
    /// Fails if the signal is not normalized to [-1, 1]. Voltage-referred
    /// metrics (vrms/vpeak) are only available when `calibration` is given;
    /// accessing them without one fails at the accessor.
    pub fn analyze(
        &self,
        signal: &Signal,
        calibration: Option<&CalibrationModel>,
    ) -> Result<TimeDomainResult, AnalysisError> {
        if signal.is_empty() {
            return Err(AnalysisError::SpectrumTooShort { bins: 0 });
        }

        let min = signal.samples.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = signal
            .samples
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        if min < -1.0 || max > 1.0 {
            return Err(AnalysisError::SignalNotNormalized { min, max });
        }

        let fs = signal.sample_rate;
        let duration_unpadded = signal.len() as f64 / fs as f64;

        let mut samples = signal.samples.clone();
        if let Some(pad_secs) = self.options.pad_to_secs {
            let target = (fs as f64 * pad_secs) as usize;
            if samples.len() < target {
                samples.resize(target, 0.0);
            }
        }
        let duration = samples.len() as f64 / fs as f64;

        let rms = (samples.iter().map(|&x| x * x).sum::<f64>() / samples.len() as f64).sqrt();
        let peak = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let (vrms, vpeak) = match calibration {
            Some(cal) => (Some(rms / cal.nrms), Some(peak / cal.nrms)),
            None => (None, None),
        };

        let (periods, stats) = if self.options.detect_periods {
            let detected = detect_periods(&samples, signal.bit_depth);
            let stats = period_stats(&detected);
            debug!(
                "[TimeDomain] {} periods detected over {} samples",
                detected.len(),
                samples.len()
            );
            match stats {
                Some(stats) => (Some(detected), Some(stats)),
                None => (None, None),
            }
        } else {
            (None, None)
        };

        Ok(TimeDomainResult {
            samples,
            sample_rate: fs,
            bit_depth: signal.bit_depth,
            duration,
            duration_unpadded,
            rms,
            peak,
            vrms,
            vpeak,
            periods,
            period_stats: stats,
        })
    }
}
