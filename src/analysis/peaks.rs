// Spectral peak extraction with phase-noise-skirt suppression
//
// Greedily selects the loudest remaining bin, then optionally walks outward
// from it suppressing the phase-noise skirt: adjacent bins whose magnitude
// keeps decaying, or stays under the loudest of the recently suppressed
// bins, belong to the peak and must not be counted as separate peaks.
//
// All marking happens on a private working copy of the dB spectrum; the
// canonical spectrum result is never mutated.

use std::collections::VecDeque;

use crate::analysis::spectrum::{argmax, Spectrum};

/// One spectral peak surviving skirt suppression
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Peak {
    /// Bin center frequency in Hz
    pub freq: f64,
    /// Calibrated dB magnitude
    pub magnitude_db: f64,
    /// Bin index into the folded spectrum
    pub bin: usize,
    /// Whether the peak sits on a (possibly aliased) harmonic of the carrier
    pub is_harmonic: bool,
    /// Whether the harmonic order relative to the carrier is even
    pub is_harmonic_even: bool,
}

/// Parameters for one peak-extraction pass
#[derive(Debug, Clone, Copy)]
pub struct PeakParams {
    /// Number of peaks to collect
    pub count: usize,
    /// Suppress the phase-noise skirt around each selected peak
    pub pn_filter: bool,
    /// Length of the suppressed-magnitude history consulted by the filter
    pub track_window: usize,
    /// Lowest frequency considered, Hz
    pub freq_start: f64,
    /// Highest frequency considered, Hz
    pub freq_stop: f64,
}

/// Extract up to `params.count` peaks, ordered by descending magnitude
///
/// `carrier` is the refined carrier estimate used for even/odd harmonic
/// classification; `harmonic_bins` holds the bin indexes of the generated
/// harmonic set. Returns fewer peaks than requested only when the working
/// spectrum is exhausted.
pub fn extract_peaks(
    spectrum: &Spectrum,
    carrier: f64,
    harmonic_bins: &[usize],
    params: &PeakParams,
) -> Vec<Peak> {
    let mut sdb = spectrum.magnitudes_db().to_vec();
    let mut peaks = Vec::with_capacity(params.count);

    while peaks.len() < params.count {
        let idx = argmax(&sdb);

        // Every remaining bin is already suppressed
        if sdb[idx] == f64::NEG_INFINITY {
            break;
        }

        // Exclude DC
        if idx == 0 {
            sdb[idx] = f64::NEG_INFINITY;
            continue;
        }

        // Only include the requested frequency range
        let freq = spectrum.frequencies()[idx];
        if freq < params.freq_start || freq > params.freq_stop {
            sdb[idx] = f64::NEG_INFINITY;
            continue;
        }

        let ratio = freq / carrier;
        peaks.push(Peak {
            freq,
            magnitude_db: sdb[idx],
            bin: idx,
            is_harmonic: harmonic_bins.contains(&idx),
            is_harmonic_even: ratio % 2.0 == 0.0,
        });

        sdb[idx] = f64::NEG_INFINITY;

        if !params.pn_filter {
            continue;
        }

        // Ignore phase noise on both sides of the selected bin
        suppress_skirt(&mut sdb, idx, 1, params.track_window);
        suppress_skirt(&mut sdb, idx, -1, params.track_window);
    }

    peaks
}

/// Walk outward from `idx` in direction `dir`, suppressing the skirt
///
/// A bin is part of the skirt while the magnitude ahead of it keeps
/// non-increasing, or stays at or below the loudest of the last
/// `track_window` suppressed bins. The walk stops at the first bin that
/// breaks both conditions, or at the array bounds.
fn suppress_skirt(sdb: &mut [f64], idx: usize, dir: isize, track_window: usize) {
    let len = sdb.len() as isize;
    let idx = idx as isize;

    // The selected bin is already -inf, so the history starts saturated low
    let mut recent: VecDeque<f64> = VecDeque::from(vec![sdb[idx as usize]; track_window]);
    let mut offset = dir;

    loop {
        let i = idx + offset;
        if i <= 0 || i >= len - 1 {
            break;
        }

        let ahead = (i + dir) as usize;
        let i = i as usize;
        let recent_max = recent.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        if !(sdb[i] >= sdb[ahead] || sdb[ahead] <= recent_max) {
            break;
        }

        recent.pop_back();
        recent.push_front(sdb[i]);
        sdb[i] = f64::NEG_INFINITY;

        offset += dir;
    }
}
