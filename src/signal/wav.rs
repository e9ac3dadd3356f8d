// WAV loading and storing via hound
//
// Integer PCM is normalized to [-1, 1] by dividing by full scale for the
// header bit depth. Float WAVs are expected to already be normalized; if any
// sample falls outside [-1, 1] the whole signal is rescaled by its absolute
// peak. Multi-channel files are reduced to one channel, either by taking the
// first channel or by averaging all of them.

use std::path::Path;

use log::{debug, warn};

use crate::error::SignalError;
use crate::signal::Signal;

/// Load a WAV file into a normalized single-channel Signal
///
/// # Arguments
/// * `path` - WAV file path
/// * `average_channels` - reduce multi-channel audio by averaging instead of
///   taking the first channel
pub fn load_wav<P: AsRef<Path>>(path: P, average_channels: bool) -> Result<Signal, SignalError> {
    let mut reader = hound::WavReader::open(&path)?;
    let spec = reader.spec();

    debug!(
        "[Wav] {:?}: {} Hz, {} ch, {} bit {:?}",
        path.as_ref(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        spec.sample_format
    );

    let interleaved: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Float => {
            let raw: Result<Vec<f32>, _> = reader.samples::<f32>().collect();
            let mut samples: Vec<f64> = raw?.into_iter().map(f64::from).collect();

            let peak = samples.iter().fold(0.0f64, |acc, &s| acc.max(s.abs()));
            if peak > 1.0 {
                warn!("[Wav] Float samples exceed full scale (peak {}), rescaling", peak);
                for s in &mut samples {
                    *s /= peak;
                }
            }

            samples
        }
        hound::SampleFormat::Int => {
            let fullscale = (1i64 << (spec.bits_per_sample - 1)) as f64;
            let raw: Result<Vec<i32>, _> = reader.samples::<i32>().collect();
            raw?.into_iter().map(|s| s as f64 / fullscale).collect()
        }
    };

    let channels = spec.channels as usize;
    let samples = if channels <= 1 {
        interleaved
    } else if average_channels {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f64>() / channels as f64)
            .collect()
    } else {
        interleaved.iter().step_by(channels).copied().collect()
    };

    if samples.is_empty() {
        return Err(SignalError::Empty);
    }

    Ok(Signal {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bit_depth: Some(spec.bits_per_sample),
    })
}

/// Store a normalized sample sequence as a 32-bit float mono WAV
pub fn store_wav<P: AsRef<Path>>(
    path: P,
    samples: &[f64],
    sample_rate: u32,
) -> Result<(), SignalError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(&path, spec)?;
    for &s in samples {
        writer.write_sample(s as f32)?;
    }
    writer.finalize()?;

    debug!(
        "[Wav] Wrote {} samples at {} Hz to {:?}",
        samples.len(),
        sample_rate,
        path.as_ref()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("toneprobe_wav_{}", name))
    }

    #[test]
    fn test_float_roundtrip() {
        let path = temp_path("float_roundtrip.wav");
        let samples: Vec<f64> = (0..480)
            .map(|i| (2.0 * std::f64::consts::PI * 997.0 * i as f64 / 48000.0).sin())
            .collect();

        store_wav(&path, &samples, 48000).unwrap();
        let signal = load_wav(&path, false).unwrap();

        assert_eq!(signal.sample_rate, 48000);
        assert_eq!(signal.channels, 1);
        assert_eq!(signal.bit_depth, Some(32));
        assert_eq!(signal.len(), samples.len());
        for (a, b) in signal.samples.iter().zip(samples.iter()) {
            // f32 storage costs precision but must stay normalized
            assert!((a - b).abs() < 1e-6, "sample {} vs {}", a, b);
        }
        signal.validate_normalized().unwrap();

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_int16_normalization() {
        let path = temp_path("int16.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for s in [-32768i16, -16384, 0, 16384, 32767] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let signal = load_wav(&path, false).unwrap();
        assert_eq!(signal.bit_depth, Some(16));
        assert_eq!(signal.samples[0], -1.0);
        assert_eq!(signal.samples[2], 0.0);
        assert!((signal.samples[4] - 32767.0 / 32768.0).abs() < 1e-12);
        signal.validate_normalized().unwrap();

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_stereo_average_and_first_channel() {
        let path = temp_path("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        // left 0.5, right -0.5 in every frame
        for _ in 0..100 {
            writer.write_sample(0.5f32).unwrap();
            writer.write_sample(-0.5f32).unwrap();
        }
        writer.finalize().unwrap();

        let first = load_wav(&path, false).unwrap();
        assert_eq!(first.len(), 100);
        assert!(first.samples.iter().all(|&s| (s - 0.5).abs() < 1e-7));

        let averaged = load_wav(&path, true).unwrap();
        assert_eq!(averaged.len(), 100);
        assert!(averaged.samples.iter().all(|&s| s.abs() < 1e-7));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_wav("/nonexistent/toneprobe.wav", false);
        assert!(matches!(result, Err(SignalError::Io { .. })));
    }
}
