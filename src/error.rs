// Error types for the toneprobe signal analyzer
//
// This module defines custom error types for signal handling, calibration
// and analysis operations, providing structured error handling with error
// codes suitable for tooling and report generation.

use std::fmt;

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the CLI boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Signal loading and synthesis errors
///
/// These errors cover WAV decoding, sample normalization and stimulus
/// generation.
///
/// Error code ranges: 1001-1005
#[derive(Debug, Clone, PartialEq)]
pub enum SignalError {
    /// Sample amplitudes fall outside the closed interval [-1, 1]
    NotNormalized { min: f64, max: f64 },

    /// Signal contains no samples
    Empty,

    /// Audio container could not be decoded
    UnsupportedFormat { details: String },

    /// Stimulus description is inconsistent
    InvalidStimulus { reason: String },

    /// Underlying I/O failure
    Io { details: String },
}

impl ErrorCode for SignalError {
    fn code(&self) -> i32 {
        match self {
            SignalError::NotNormalized { .. } => 1001,
            SignalError::Empty => 1002,
            SignalError::UnsupportedFormat { .. } => 1003,
            SignalError::InvalidStimulus { .. } => 1004,
            SignalError::Io { .. } => 1005,
        }
    }

    fn message(&self) -> String {
        match self {
            SignalError::NotNormalized { min, max } => {
                format!(
                    "Signal is not normalized to [-1, 1] (range [{}, {}])",
                    min, max
                )
            }
            SignalError::Empty => "Signal contains no samples".to_string(),
            SignalError::UnsupportedFormat { details } => {
                format!("Unsupported audio format: {}", details)
            }
            SignalError::InvalidStimulus { reason } => {
                format!("Invalid stimulus description: {}", reason)
            }
            SignalError::Io { details } => format!("I/O error: {}", details),
        }
    }
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SignalError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SignalError {}

impl From<std::io::Error> for SignalError {
    fn from(err: std::io::Error) -> Self {
        SignalError::Io {
            details: err.to_string(),
        }
    }
}

impl From<hound::Error> for SignalError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(io) => SignalError::Io {
                details: io.to_string(),
            },
            other => SignalError::UnsupportedFormat {
                details: other.to_string(),
            },
        }
    }
}

/// Calibration persistence errors
///
/// These errors cover reading and writing the calibration JSON file.
///
/// Error code ranges: 2001-2002
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Calibration file could not be read or written
    Io { details: String },

    /// Calibration data could not be decoded (missing or malformed keys)
    Parse { details: String },
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::Io { .. } => 2001,
            CalibrationError::Parse { .. } => 2002,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::Io { details } => {
                format!("Calibration file I/O error: {}", details)
            }
            CalibrationError::Parse { details } => {
                format!("Unable to decode calibration data: {}", details)
            }
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}

impl From<std::io::Error> for CalibrationError {
    fn from(err: std::io::Error) -> Self {
        CalibrationError::Io {
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CalibrationError {
    fn from(err: serde_json::Error) -> Self {
        CalibrationError::Parse {
            details: err.to_string(),
        }
    }
}

/// Analysis pipeline errors
///
/// These errors cover precondition and parameter violations inside the
/// time-domain and frequency-domain analyzers. The pipeline never retries:
/// every failure is surfaced immediately to the caller.
///
/// Error code ranges: 3001-3006
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Input signal violates the [-1, 1] normalization precondition
    SignalNotNormalized { min: f64, max: f64 },

    /// A voltage-referred metric was requested without a calibration model
    MissingCalibration,

    /// Period boundaries were requested but none were detected
    PeriodsUnavailable,

    /// Frequency range has stop below start
    InvalidFrequencyRange { start: f64, stop: f64 },

    /// Fewer spectral peaks were found than the computation requires
    NotEnoughPeaks { requested: usize, found: usize },

    /// Signal is too short to produce a usable spectrum
    SpectrumTooShort { bins: usize },
}

impl ErrorCode for AnalysisError {
    fn code(&self) -> i32 {
        match self {
            AnalysisError::SignalNotNormalized { .. } => 3001,
            AnalysisError::MissingCalibration => 3002,
            AnalysisError::PeriodsUnavailable => 3003,
            AnalysisError::InvalidFrequencyRange { .. } => 3004,
            AnalysisError::NotEnoughPeaks { .. } => 3005,
            AnalysisError::SpectrumTooShort { .. } => 3006,
        }
    }

    fn message(&self) -> String {
        match self {
            AnalysisError::SignalNotNormalized { min, max } => {
                format!(
                    "Source signal is not normalized between [-1, 1] (range [{}, {}])",
                    min, max
                )
            }
            AnalysisError::MissingCalibration => {
                "A calibration model is required for voltage-referred metrics".to_string()
            }
            AnalysisError::PeriodsUnavailable => {
                "No complete signal period was detected; period metrics are unavailable"
                    .to_string()
            }
            AnalysisError::InvalidFrequencyRange { start, stop } => {
                format!(
                    "Invalid frequency range: stop {} Hz is below start {} Hz",
                    stop, start
                )
            }
            AnalysisError::NotEnoughPeaks { requested, found } => {
                format!(
                    "Not enough spectral peaks: need {}, found {}",
                    requested, found
                )
            }
            AnalysisError::SpectrumTooShort { bins } => {
                format!("Spectrum of {} bins is too short for analysis", bins)
            }
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AnalysisError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AnalysisError {}
