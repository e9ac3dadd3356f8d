// Aliasing-aware harmonic frequency generation
//
// In a sampled spectrum the harmonics of the fundamental fold back across
// Nyquist: every |K*fs - N*f0| for small integers K, N is a candidate
// location for harmonic energy. K is bounded just high enough that the
// requested number of harmonics is produced even when heavy aliasing folds
// most products back into the first Nyquist zone.

/// Generate harmonic frequencies of `fundamental`, aliasing included
///
/// Excludes zero, anything at or above Nyquist, duplicates, and the
/// fundamental itself. Generation order is preserved: callers that want
/// "the first n harmonics" take a prefix of the returned list.
pub fn harmonic_frequencies(fundamental: f64, sample_rate: u32, n: usize) -> Vec<f64> {
    let fs = sample_rate as f64;
    let nyquist = fs / 2.0;

    let nn = n + 1;
    let kn = (nn as f64 / (fs / fundamental)).ceil() as usize;

    let mut harmonics: Vec<f64> = Vec::new();

    for k in 0..=kn {
        for nh in 0..=nn {
            let h = (k as f64 * fs - nh as f64 * fundamental).abs();

            if h == 0.0 || h >= nyquist || h == fundamental || harmonics.contains(&h) {
                continue;
            }

            harmonics.push(h);
        }
    }

    harmonics
}
