// Frequency-domain analyzer - calibrated spectral metrics
//
// Consumes a time-domain result and a calibration model, computes the
// calibrated spectrum, and derives the standard audio-test metrics: THD,
// THD+N, SNR, SFDR, ENOB, noise floor, phase noise and jitter.
//
// The stages run in a fixed order (transform, normalize, locate fundamental,
// harmonics, peaks, metrics); `analyze` drives them in sequence and returns
// an immutable result, so re-analysis of a new capture is just another
// invocation with the same calibration model.
//
// Formula references:
// - Analog Devices MT-001/MT-003/MT-008/MT-053/MT-229
// - MAXIM AN3359/AN4466

use once_cell::sync::Lazy;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::analysis::harmonics::harmonic_frequencies;
use crate::analysis::peaks::{extract_peaks, Peak, PeakParams};
use crate::analysis::spectrum::{argmax, MagnitudeKind, Spectrum};
use crate::analysis::time_domain::TimeDomainResult;
use crate::calibration::CalibrationModel;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;

/// 10*log10(3/2), the quantization-noise term of the ENOB formula
/// (Analog Devices MT-229, Equation 11)
static N1D76: Lazy<f64> = Lazy::new(|| 10.0 * (3.0f64 / 2.0).log10());

/// 20*log10(2), dB per bit (Analog Devices MT-229, Equation 11)
static N6D02: Lazy<f64> = Lazy::new(|| 20.0 * 2.0f64.log10());

/// Harmonic locations are generated once per analysis with this bound so
/// metric calculators can take any first-n prefix out of it.
const HARMONIC_POOL: usize = 20;

/// One measured point of the phase-noise curve
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PhaseNoisePoint {
    /// Offset from the carrier, Hz
    pub offset_hz: f64,
    /// Phase noise at the offset, dBc/Hz (negative below the carrier)
    pub dbc_hz: f64,
}

/// Immutable result of a full frequency-domain analysis
#[derive(Debug, Clone)]
pub struct FrequencyDomainResult {
    pub spectrum: Spectrum,
    pub fundamental_hz: f64,
    pub carrier_hz: f64,
    pub resolution_hz: f64,
    pub dc_level_db: f64,
    pub harmonics_hz: Vec<f64>,
    pub peaks: Vec<Peak>,
    pub thd_percent: f64,
    pub thd_db: f64,
    pub thdn_percent: f64,
    pub thdn_db: f64,
    pub snr_db: f64,
    pub snr_jitter_db: f64,
    pub enob_bits: f64,
    pub sfdr_db: f64,
    pub noise_floor_db: f64,
    pub process_gain_db: f64,
    pub worst_other: Option<Peak>,
    pub phase_noise: Vec<PhaseNoisePoint>,
    pub jitter_secs: f64,
}

/// Frequency-domain analysis over a time-domain result
pub struct FrequencyDomainAnalyzer<'a> {
    tda: &'a TimeDomainResult,
    calibration: &'a CalibrationModel,
    config: AnalysisConfig,
    spectrum: Spectrum,
    freq_start: f64,
    freq_stop: f64,
    harmonic_pool: Vec<f64>,
    harmonic_pool_bins: Vec<usize>,
}

impl<'a> FrequencyDomainAnalyzer<'a> {
    /// Build the analyzer: transform, normalize, locate the fundamental and
    /// generate the harmonic set
    ///
    /// `range` restricts every range-aware metric to [start, stop] Hz and
    /// defaults to DC..Nyquist. A stop below start is a parameter violation.
    pub fn new(
        tda: &'a TimeDomainResult,
        calibration: &'a CalibrationModel,
        range: Option<(f64, f64)>,
        config: &AnalysisConfig,
    ) -> Result<Self, AnalysisError> {
        let spectrum = Spectrum::compute(tda, calibration)?;

        let (freq_start, freq_stop) = match range {
            Some((start, stop)) => {
                if stop < start {
                    return Err(AnalysisError::InvalidFrequencyRange { start, stop });
                }
                (start, stop)
            }
            None => (0.0, spectrum.nyquist()),
        };

        let fundamental = spectrum.fundamental_freq();
        let harmonic_pool =
            harmonic_frequencies(fundamental, tda.sample_rate(), HARMONIC_POOL);
        let harmonic_pool_bins: Vec<usize> = harmonic_pool
            .iter()
            .map(|&h| spectrum.freq_to_index(h))
            .collect();

        Ok(Self {
            tda,
            calibration,
            config: config.clone(),
            spectrum,
            freq_start,
            freq_stop,
            harmonic_pool,
            harmonic_pool_bins,
        })
    }

    /// Run the full pipeline and return the immutable result
    pub fn analyze(
        tda: &'a TimeDomainResult,
        calibration: &'a CalibrationModel,
        range: Option<(f64, f64)>,
        config: &AnalysisConfig,
    ) -> Result<FrequencyDomainResult, AnalysisError> {
        Self::new(tda, calibration, range, config)?.into_result()
    }

    pub fn spectrum(&self) -> &Spectrum {
        &self.spectrum
    }

    /// Coarse fundamental estimate: the strongest non-DC bin
    pub fn fundamental(&self) -> f64 {
        self.spectrum.fundamental_freq()
    }

    /// First n generated harmonic frequencies
    pub fn harmonics(&self, n: usize) -> &[f64] {
        &self.harmonic_pool[..n.min(self.harmonic_pool.len())]
    }

    fn resolve_range(&self, range: Option<(f64, f64)>) -> Result<(f64, f64), AnalysisError> {
        match range {
            Some((start, stop)) => {
                if stop < start {
                    return Err(AnalysisError::InvalidFrequencyRange { start, stop });
                }
                Ok((start, stop))
            }
            None => Ok((self.freq_start, self.freq_stop)),
        }
    }

    /// Refined carrier estimate with sub-bin accuracy
    ///
    /// When the spectral resolution already meets `accuracy_hz` the coarse
    /// estimate suffices. Otherwise the time-domain signal is zero-padded
    /// until the FFT resolution grants the requested accuracy and the peak
    /// bin is re-located.
    pub fn carrier(&self, accuracy_hz: f64) -> f64 {
        if self.spectrum.resolution() <= accuracy_hz {
            return self.spectrum.fundamental_freq();
        }

        let fs = self.tda.sample_rate() as f64;
        let samples = self.tda.samples();
        let target = ((fs * (1.0 / accuracy_hz).ceil()) as usize).max(samples.len());

        let mut buffer: Vec<Complex<f64>> =
            samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
        buffer.resize(target, Complex::new(0.0, 0.0));

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(target);
        fft.process(&mut buffer);

        let half = target / 2;
        let magn: Vec<f64> = buffer[1..half].iter().map(|c| c.norm()).collect();
        let idx = argmax(&magn) + 1;

        idx as f64 / (target as f64 / fs)
    }

    /// (S)ignal: strongest non-DC magnitude, the reference of every ratio
    /// metric (Analog Devices MT-053, Figure 1)
    pub fn signal_level(&self, in_db: bool) -> f64 {
        let values = if in_db {
            self.spectrum.magnitudes_db()
        } else {
            self.spectrum.magnitudes_rms()
        };
        values[1..].iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }

    fn distortion_sq(&self, range: Option<(f64, f64)>) -> Result<f64, AnalysisError> {
        let (start, stop) = self.resolve_range(range)?;

        let bins: Vec<usize> = self
            .harmonic_pool_bins
            .iter()
            .take(self.config.harmonics)
            .copied()
            .filter(|&b| {
                let f = self.spectrum.index_to_freq(b);
                f >= start && f <= stop
            })
            .collect();

        // If no harmonics fall in the supplied range, distortion is 0
        if bins.is_empty() {
            return Ok(0.0);
        }

        let magn_rms = self.spectrum.magnitudes_rms();
        Ok(bins.iter().map(|&b| magn_rms[b] * magn_rms[b]).sum())
    }

    /// (D)istortion: RSS of the RMS magnitudes at the first n harmonics
    /// within range (Analog Devices MT-053, Figure 1)
    pub fn distortion(&self, range: Option<(f64, f64)>) -> Result<f64, AnalysisError> {
        Ok(self.distortion_sq(range)?.sqrt())
    }

    fn noise_sq(&self, range: Option<(f64, f64)>) -> Result<f64, AnalysisError> {
        let (start, stop) = self.resolve_range(range)?;

        // Masking, not range filtering: DC, the carrier bin and the
        // harmonic bins are excluded wherever they fall
        let fundamental_bin = self.spectrum.fundamental_bin();
        let masked: Vec<usize> = self
            .harmonic_pool_bins
            .iter()
            .take(self.config.harmonics)
            .copied()
            .collect();

        let magn_rms = self.spectrum.magnitudes_rms();
        let i0 = self.spectrum.freq_to_index(start);
        let i1 = self.spectrum.freq_to_index(stop).min(magn_rms.len());

        let mut sum = 0.0;
        for (idx, &m) in magn_rms.iter().enumerate().take(i1).skip(i0) {
            if idx == 0 || idx == fundamental_bin || masked.contains(&idx) {
                continue;
            }
            sum += m * m;
        }

        Ok(sum)
    }

    /// (N)oise: RSS of the RMS magnitudes of every in-range bin except DC,
    /// the carrier and the harmonics (Analog Devices MT-053, Figure 1)
    pub fn noise(&self, range: Option<(f64, f64)>) -> Result<f64, AnalysisError> {
        Ok(self.noise_sq(range)?.sqrt())
    }

    /// Total harmonic distortion, as a linear percentage or in dB
    /// (Analog Devices MT-003, Equation 4)
    pub fn thd(&self, in_db: bool, range: Option<(f64, f64)>) -> Result<f64, AnalysisError> {
        let s = self.signal_level(false);
        let d = self.distortion(range)?;

        if in_db {
            Ok(20.0 * (s / d).log10())
        } else {
            Ok(100.0 * (d / s))
        }
    }

    /// THD plus non-harmonic noise energy
    /// (Analog Devices MT-003, Equation 5)
    pub fn thdn(&self, in_db: bool, range: Option<(f64, f64)>) -> Result<f64, AnalysisError> {
        let s = self.signal_level(false);
        let nd = (self.noise_sq(range)? + self.distortion_sq(range)?).sqrt();

        if in_db {
            Ok(20.0 * (s / nd).log10())
        } else {
            Ok(100.0 * (nd / s))
        }
    }

    /// Signal-to-noise ratio in dB (Analog Devices MT-003, Equation 13)
    pub fn snr(&self, range: Option<(f64, f64)>) -> Result<f64, AnalysisError> {
        let s = self.signal_level(false);
        let n = self.noise(range)?;
        Ok(20.0 * (s / n).log10())
    }

    /// Effective number of bits (Analog Devices MT-003, Equation 2)
    pub fn enob(&self, range: Option<(f64, f64)>) -> Result<f64, AnalysisError> {
        let thdn_db = self.thdn(true, range)?;
        let fullscale_term =
            20.0 * (self.calibration.nfullscale / self.tda.rms()).log10();
        Ok(((thdn_db - *N1D76) + fullscale_term) / *N6D02)
    }

    /// Extract spectral peaks, ordered by descending magnitude
    pub fn peaks(
        &self,
        count: usize,
        pn_filter: bool,
        range: Option<(f64, f64)>,
    ) -> Result<Vec<Peak>, AnalysisError> {
        let (start, stop) = self.resolve_range(range)?;
        let carrier = self.carrier(self.config.carrier_accuracy_hz);

        // Peak classification generates its own harmonic set bounded by the
        // requested peak count
        let harmonic_bins: Vec<usize> =
            harmonic_frequencies(self.fundamental(), self.tda.sample_rate(), count)
                .into_iter()
                .map(|h| self.spectrum.freq_to_index(h))
                .collect();

        Ok(extract_peaks(
            &self.spectrum,
            carrier,
            &harmonic_bins,
            &PeakParams {
                count,
                pn_filter,
                track_window: self.config.peak_track_window,
                freq_start: start,
                freq_stop: stop,
            },
        ))
    }

    /// Spurious-free dynamic range: gap in dB between the two largest
    /// filtered peaks (Analog Devices MT-003, Figure 4)
    pub fn sfdr(&self, range: Option<(f64, f64)>) -> Result<f64, AnalysisError> {
        let peaks = self.peaks(2, true, range)?;
        if peaks.len() < 2 {
            return Err(AnalysisError::NotEnoughPeaks {
                requested: 2,
                found: peaks.len(),
            });
        }
        Ok(peaks[0].magnitude_db - peaks[1].magnitude_db)
    }

    /// The loudest filtered peak that is neither the carrier nor a harmonic
    ///
    /// Pass `peaks` to reuse an existing extraction; otherwise a filtered
    /// pass over the configured peak count is run.
    pub fn worst_other(
        &self,
        peaks: Option<&[Peak]>,
        range: Option<(f64, f64)>,
    ) -> Result<Option<Peak>, AnalysisError> {
        let owned;
        let list = match peaks {
            Some(p) => p,
            None => {
                owned = self.peaks(self.config.peak_count, true, range)?;
                &owned
            }
        };

        let fundamental_bin = self.spectrum.fundamental_bin();
        let mut worst: Option<&Peak> = None;
        for p in list {
            if p.is_harmonic || p.bin == fundamental_bin {
                continue;
            }
            if worst.map_or(true, |w| p.magnitude_db > w.magnitude_db) {
                worst = Some(p);
            }
        }

        Ok(worst.cloned())
    }

    /// Phase noise at `offset` Hz from the carrier, in dBc/Hz
    /// (Analog Devices MT-008, Figure 1)
    ///
    /// The RSS is taken over a window of nominally 1 Hz centered at
    /// carrier+offset; when the spectral resolution forces a wider window
    /// the summed power is rescaled to exactly 1 Hz.
    pub fn phase_noise(&self, offset: f64, carrier: Option<f64>) -> f64 {
        let carrier = carrier.unwrap_or_else(|| self.fundamental());
        let resolution = self.spectrum.resolution();

        let half_window = (0.5 / resolution).ceil() as usize;
        let center = self.spectrum.freq_to_index(carrier + offset);
        let start = center.saturating_sub(half_window);
        let stop = center + half_window;

        // The effective window; always covers at least 1 Hz
        let hz_range = (stop - start) as f64 * resolution;
        debug_assert!(hz_range >= 1.0);

        let magn_rms = self.spectrum.magnitudes_rms();
        let stop = stop.min(magn_rms.len());
        let sum_sq: f64 = magn_rms[start.min(stop)..stop].iter().map(|&m| m * m).sum();
        let offset_magn = (sum_sq / hz_range).sqrt();

        let carrier_magn = self.spectrum.magnitude_at(carrier, MagnitudeKind::Rms);
        let dbc = 20.0 * carrier_magn.log10() - 20.0 * offset_magn.log10();

        -dbc
    }

    /// Phase noise at four offsets with growing spacing
    ///
    /// The first offset accounts for the spectral resolution so the carrier
    /// magnitude cannot bleed into the measurement window; the following
    /// offsets escalate at the 10/100/1000 Hz decades, doubling instead
    /// whenever the previous offset already overshoots the decade.
    pub fn phase_noise_profile(&self) -> Vec<PhaseNoisePoint> {
        let resolution = self.spectrum.resolution();

        let mut offsets = [0i64; 4];
        offsets[0] = (resolution * 2.0).ceil() as i64;
        offsets[1] = if offsets[0] >= 10 { offsets[0] * 2 } else { 10 };
        offsets[2] = if offsets[1] >= 110 { offsets[1] * 2 } else { 100 };
        offsets[3] = if offsets[2] >= 1100 { offsets[2] * 2 } else { 1000 };

        offsets
            .iter()
            .map(|&o| PhaseNoisePoint {
                offset_hz: o as f64,
                dbc_hz: self.phase_noise(o as f64, None),
            })
            .collect()
    }

    /// FFT process gain in dB (Analog Devices MT-003, Figure 2)
    pub fn process_gain(&self) -> f64 {
        let n = self.tda.sample_rate() as f64 * self.tda.duration_secs();
        10.0 * (n / 2.0).log10()
    }

    /// Measurement noise floor in dB:
    /// -(SNR measured) - (FFT process gain) + (carrier magnitude in dB)
    /// (Analog Devices MT-001 Figure 6, MT-003 Figure 2)
    pub fn noise_floor(&self, range: Option<(f64, f64)>) -> Result<f64, AnalysisError> {
        Ok(-self.snr(range)? - self.process_gain() + self.signal_level(true))
    }

    /// Calibrated dB level of the DC bin
    pub fn dc_level(&self) -> f64 {
        self.spectrum.dc_level()
    }

    /// Compute every metric and consume the analyzer into the result
    pub fn into_result(self) -> Result<FrequencyDomainResult, AnalysisError> {
        let fundamental_hz = self.fundamental();
        let carrier_hz = self.carrier(self.config.carrier_accuracy_hz);
        let peaks = self.peaks(self.config.peak_count, true, None)?;
        let worst_other = self.worst_other(Some(&peaks), None)?;

        let phase_noise = self.phase_noise_profile();
        let jitter_secs = jitter(&phase_noise, fundamental_hz);
        let snr_jitter_db = snr_jitter(&phase_noise, fundamental_hz);

        Ok(FrequencyDomainResult {
            fundamental_hz,
            carrier_hz,
            resolution_hz: self.spectrum.resolution(),
            dc_level_db: self.dc_level(),
            harmonics_hz: self.harmonics(self.config.harmonics).to_vec(),
            thd_percent: self.thd(false, None)?,
            thd_db: self.thd(true, None)?,
            thdn_percent: self.thdn(false, None)?,
            thdn_db: self.thdn(true, None)?,
            snr_db: self.snr(None)?,
            snr_jitter_db,
            enob_bits: self.enob(None)?,
            sfdr_db: self.sfdr(None)?,
            noise_floor_db: self.noise_floor(None)?,
            process_gain_db: self.process_gain(),
            worst_other,
            phase_noise,
            jitter_secs,
            peaks,
            spectrum: self.spectrum,
        })
    }
}

/// Time-domain jitter from a measured phase-noise curve
///
/// Numerically integrates the piecewise log-log linear interpolation of the
/// curve and converts the integrated phase power to seconds
/// (MAXIM AN3359 Equations 16/17, Analog Devices MT-008).
pub fn jitter(pn: &[PhaseNoisePoint], carrier_hz: f64) -> f64 {
    let f = |i: usize| pn[i].offset_hz;
    let lf = |i: usize| pn[i].dbc_hz;
    // Per-segment slope over the log-frequency axis
    let a = |i: usize| (lf(i + 1) - lf(i)) / (f(i + 1).log10() - f(i).log10());
    let b = |i: usize| lf(i);

    let mut rsum = 0.0;
    for i in 0..pn.len().saturating_sub(1) {
        let ai = a(i);
        rsum += 10f64.powf(b(i) / 10.0)
            * f(i).powf(-ai / 10.0)
            * (ai / 10.0 + 1.0).recip()
            * (f(i + 1).powf(ai / 10.0 + 1.0) - f(i).powf(ai / 10.0 + 1.0));
    }

    (2.0 * rsum).sqrt() / (2.0 * std::f64::consts::PI * carrier_hz)
}

/// SNR limit imposed by the measured jitter
/// (MAXIM AN4466 Page 3, Texas Instruments TIPL 4704)
pub fn snr_jitter(pn: &[PhaseNoisePoint], carrier_hz: f64) -> f64 {
    -20.0 * (2.0 * std::f64::consts::PI * carrier_hz * jitter(pn, carrier_hz)).log10()
}
