// Spectrum - FFT computation and calibrated normalization
//
// Transforms the analyzed time-domain signal into the folded (DC..Nyquist)
// complex spectrum and derives the parallel magnitude views used by every
// downstream metric:
//
// - linear magnitude          |X[k]|
// - normalized magnitude      |X[k]| / bin_count
// - RMS-referred magnitude    (rms / peak) * normalized
// - calibrated dB magnitude   10*log10((rms_magn/nrms)^2 / impedance) + offset
// - phase, normalized to units of pi
//
// Bin index and frequency are related through the analyzed (padded) signal
// duration: freq = index / duration.

use rustfft::{num_complex::Complex, FftPlanner};

use crate::analysis::time_domain::TimeDomainResult;
use crate::calibration::CalibrationModel;
use crate::error::AnalysisError;

/// Which magnitude view of the spectrum to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagnitudeKind {
    /// Normalized magnitude in [0, 1]
    Normalized,
    /// RMS-referred magnitude
    Rms,
    /// Calibrated dB magnitude
    Decibel,
}

/// Folded spectrum with calibrated magnitude views
#[derive(Debug, Clone)]
pub struct Spectrum {
    freq: Vec<f64>,
    magn: Vec<f64>,
    magn_n: Vec<f64>,
    magn_rms: Vec<f64>,
    magn_db: Vec<f64>,
    phase: Vec<f64>,
    phase_n: Vec<f64>,
    duration: f64,
    duration_unpadded: f64,
    sample_rate: u32,
    fundamental_bin: usize,
}

impl Spectrum {
    /// Compute the spectrum of an analyzed signal
    ///
    /// The signal is transformed as-is (no windowing): the measurement
    /// stimulus is a steady tone, and leakage is controlled by capture
    /// length instead of a window function.
    pub fn compute(
        tda: &TimeDomainResult,
        calibration: &CalibrationModel,
    ) -> Result<Self, AnalysisError> {
        let samples = tda.samples();
        let n = samples.len();
        let half = n / 2;

        if half < 2 {
            return Err(AnalysisError::SpectrumTooShort { bins: half });
        }

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(n);
        let mut buffer: Vec<Complex<f64>> =
            samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
        fft.process(&mut buffer);

        let duration = tda.duration_secs();
        let freq: Vec<f64> = (0..half).map(|i| i as f64 / duration).collect();

        let magn: Vec<f64> = buffer[..half].iter().map(|c| c.norm()).collect();
        let phase: Vec<f64> = buffer[..half].iter().map(|c| c.arg()).collect();

        // Normalize magnitudes to [0, 1]
        let magn_n: Vec<f64> = magn.iter().map(|&m| m / half as f64).collect();

        // Scale to RMS-referred magnitudes
        let rms_scale = tda.rms() / tda.peak();
        let magn_rms: Vec<f64> = magn_n.iter().map(|&m| m * rms_scale).collect();

        // Convert to calibrated dB. The magnitude is squared because it
        // represents power, hence the 10x multiplier.
        let nrms = calibration.nrms;
        let impedance = calibration.impedance;
        let log_offset = calibration.log_offset();
        let magn_db: Vec<f64> = magn_rms
            .iter()
            .map(|&m| 10.0 * ((m / nrms).powi(2) / impedance).log10() + log_offset)
            .collect();

        // Normalize phase angles to [-1, 1], representing multiples of pi
        let phase_n: Vec<f64> = phase.iter().map(|&p| p / std::f64::consts::PI).collect();

        // The fundamental is the strongest bin, DC excluded
        let fundamental_bin = argmax(&magn_n[1..]) + 1;

        Ok(Self {
            freq,
            magn,
            magn_n,
            magn_rms,
            magn_db,
            phase,
            phase_n,
            duration,
            duration_unpadded: tda.duration_unpadded_secs(),
            sample_rate: tda.sample_rate(),
            fundamental_bin,
        })
    }

    /// Number of folded bins (DC through just below Nyquist)
    pub fn len(&self) -> usize {
        self.freq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freq.is_empty()
    }

    /// Frequency labels in Hz, one per bin
    pub fn frequencies(&self) -> &[f64] {
        &self.freq
    }

    /// Linear FFT magnitudes
    pub fn magnitudes(&self) -> &[f64] {
        &self.magn
    }

    /// Normalized magnitudes in [0, 1]
    pub fn magnitudes_normalized(&self) -> &[f64] {
        &self.magn_n
    }

    /// RMS-referred magnitudes
    pub fn magnitudes_rms(&self) -> &[f64] {
        &self.magn_rms
    }

    /// Calibrated dB magnitudes
    pub fn magnitudes_db(&self) -> &[f64] {
        &self.magn_db
    }

    /// Phase angles in radians
    pub fn phases(&self) -> &[f64] {
        &self.phase
    }

    /// Phase angles normalized to units of pi, in [-1, 1]
    pub fn phases_normalized(&self) -> &[f64] {
        &self.phase_n
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Nyquist frequency in Hz
    pub fn nyquist(&self) -> f64 {
        self.sample_rate as f64 / 2.0
    }

    /// Spectral resolution in Hz, defined by the unpadded capture length
    pub fn resolution(&self) -> f64 {
        1.0 / self.duration_unpadded
    }

    /// Bin index of the fundamental (strongest non-DC bin)
    pub fn fundamental_bin(&self) -> usize {
        self.fundamental_bin
    }

    /// Coarse fundamental frequency estimate (bin center)
    pub fn fundamental_freq(&self) -> f64 {
        self.freq[self.fundamental_bin]
    }

    /// Calibrated dB level of the DC bin
    pub fn dc_level(&self) -> f64 {
        self.magn_db[0]
    }

    /// Frequency of a bin index
    pub fn index_to_freq(&self, idx: usize) -> f64 {
        idx as f64 / self.duration
    }

    /// Bin index of a frequency, truncating to the bin at or below it
    ///
    /// A frequency derived from a bin index can land a hair under the bin
    /// boundary through floating-point residue; such values are snapped to
    /// the boundary before truncating so the conversion round-trips.
    pub fn freq_to_index(&self, freq: f64) -> usize {
        let pos = freq * self.duration;
        let nearest = pos.round();
        if (pos - nearest).abs() <= nearest.abs().max(1.0) * 1e-12 {
            nearest as usize
        } else {
            pos as usize
        }
    }

    /// Magnitude of the bin containing `freq`, in the requested view
    pub fn magnitude_at(&self, freq: f64, kind: MagnitudeKind) -> f64 {
        let idx = self.freq_to_index(freq);
        match kind {
            MagnitudeKind::Normalized => self.magn_n[idx],
            MagnitudeKind::Rms => self.magn_rms[idx],
            MagnitudeKind::Decibel => self.magn_db[idx],
        }
    }

    /// Normalized phase of the bin containing `freq`
    pub fn phase_at(&self, freq: f64) -> f64 {
        self.phase_n[self.freq_to_index(freq)]
    }
}

/// Index of the largest element (first on ties)
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0usize;
    let mut best_value = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::time_domain::TimeDomainAnalyzer;
    use crate::signal::Signal;

    fn sine(freq: f64, fs: u32, secs: f64, amplitude: f64) -> Vec<f64> {
        let count = (fs as f64 * secs) as usize;
        (0..count)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / fs as f64).sin() * amplitude)
            .collect()
    }

    fn spectrum_of(samples: Vec<f64>, fs: u32) -> Spectrum {
        let cal = CalibrationModel::template();
        let tda = TimeDomainAnalyzer::default()
            .analyze(&Signal::new(samples, fs), Some(&cal))
            .unwrap();
        Spectrum::compute(&tda, &cal).unwrap()
    }

    #[test]
    fn test_fundamental_lands_on_expected_bin() {
        // 1 s capture: 1 Hz per bin
        let spectrum = spectrum_of(sine(997.0, 48000, 1.0, 1.0), 48000);
        assert_eq!(spectrum.fundamental_bin(), 997);
        assert_eq!(spectrum.fundamental_freq(), 997.0);
    }

    #[test]
    fn test_bin_count_is_half_the_signal() {
        let spectrum = spectrum_of(sine(997.0, 48000, 0.5, 1.0), 48000);
        assert_eq!(spectrum.len(), 12000);
        assert_eq!(spectrum.frequencies().len(), spectrum.magnitudes_db().len());
    }

    #[test]
    fn test_freq_index_roundtrip_over_all_bins() {
        let spectrum = spectrum_of(sine(997.0, 48000, 5.0, 1.0), 48000);
        for idx in 0..spectrum.len() {
            let freq = spectrum.index_to_freq(idx);
            assert_eq!(
                spectrum.freq_to_index(freq),
                idx,
                "round trip failed at bin {} ({} Hz)",
                idx,
                freq
            );
        }
    }

    #[test]
    fn test_frequency_labels_match_conversion() {
        let spectrum = spectrum_of(sine(440.0, 44100, 2.0, 0.9), 44100);
        for idx in (0..spectrum.len()).step_by(997) {
            assert_eq!(spectrum.frequencies()[idx], spectrum.index_to_freq(idx));
        }
    }

    #[test]
    fn test_normalized_magnitude_of_pure_sine() {
        // With an integer number of cycles all signal energy sits in one
        // bin: |X[k]| = N/2 for a unit sine, and dividing by the folded
        // bin count N/2 normalizes it to exactly 1
        let spectrum = spectrum_of(sine(1000.0, 48000, 1.0, 1.0), 48000);
        let peak = spectrum.magnitudes_normalized()[1000];
        assert!((peak - 1.0).abs() < 1e-9, "peak magnitude {}", peak);

        // The RMS-referred view scales that to the signal RMS
        let rms_peak = spectrum.magnitudes_rms()[1000];
        assert!(
            (rms_peak - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6,
            "rms-referred magnitude {}",
            rms_peak
        );
    }

    #[test]
    fn test_db_conversion_applies_calibration() {
        let cal = CalibrationModel::template();
        let spectrum = spectrum_of(sine(1000.0, 48000, 1.0, 1.0), 48000);

        let rms = spectrum.magnitude_at(1000.0, MagnitudeKind::Rms);
        let expected = 10.0 * ((rms / cal.nrms).powi(2) / cal.impedance).log10() + cal.log_offset();
        let db = spectrum.magnitude_at(1000.0, MagnitudeKind::Decibel);

        assert!((db - expected).abs() < 1e-12, "db {} vs {}", db, expected);
    }

    #[test]
    fn test_phase_is_normalized_to_unit_pi() {
        let spectrum = spectrum_of(sine(997.0, 48000, 1.0, 1.0), 48000);
        for &p in spectrum.phases_normalized() {
            assert!((-1.0..=1.0).contains(&p), "normalized phase {}", p);
        }
        // A pure sine has its carrier at -pi/2
        let carrier_phase = spectrum.phase_at(997.0);
        assert!(
            (carrier_phase + 0.5).abs() < 1e-6,
            "carrier phase {}",
            carrier_phase
        );
    }

    #[test]
    fn test_resolution_tracks_unpadded_length() {
        let spectrum = spectrum_of(sine(997.0, 48000, 0.5, 1.0), 48000);
        assert_eq!(spectrum.resolution(), 2.0);
    }

    #[test]
    fn test_too_short_signal_is_rejected() {
        let cal = CalibrationModel::template();
        let tda = TimeDomainAnalyzer::default()
            .analyze(&Signal::new(vec![0.1, -0.1, 0.1], 48000), Some(&cal))
            .unwrap();
        assert!(matches!(
            Spectrum::compute(&tda, &cal),
            Err(AnalysisError::SpectrumTooShort { .. })
        ));
    }
}
