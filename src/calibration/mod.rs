// Calibration module - device calibration model and JSON persistence
//
// The calibration model maps normalized sample amplitudes to a physical or
// relative voltage/power scale. It is constructed once per measurement
// session (from a calibration file or a template) and read-only thereafter:
// both analyzers consume it, neither mutates it.
//
// The on-disk JSON schema is fixed for compatibility with existing
// calibration files:
//   npeak, nrms, nfullscale, impedance, log_0dB_adjust, log_unit_adjust,
//   log_unit, plus the derived log_offset.

use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;

/// Device calibration model
///
/// * `npeak` - normalized peak value of the 1 Vrms reference
/// * `nrms` - normalized amplitude representing 1 Vrms
/// * `nfullscale` - normalized amplitude representing 0 dBFS full scale
/// * `impedance` - line impedance in ohms (for dBu / dBm / dBFS calculation)
/// * `log_unit` - log scale unit label ("dBu", "dBm", "dBFS", ...)
/// * `log_unit_adjust` - log unit magnitude adjustment (30 dB for dBu/dBm,
///   as 1000 mW == 1 W)
/// * `log_0db_adjust` - maximum dBu or dBm of the system when a fullscale
///   reference such as dBFS is used
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationModel {
    pub npeak: f64,
    pub nrms: f64,
    pub nfullscale: f64,
    pub impedance: f64,
    #[serde(rename = "log_0dB_adjust")]
    pub log_0db_adjust: f64,
    pub log_unit_adjust: f64,
    pub log_unit: String,
    // Derived on construction and on load, never trusted from the file.
    #[serde(default)]
    log_offset: f64,
}

impl CalibrationModel {
    /// Create a calibration model, deriving the log offset
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        npeak: f64,
        nrms: f64,
        nfullscale: f64,
        impedance: f64,
        log_0db_adjust: f64,
        log_unit_adjust: f64,
        log_unit: impl Into<String>,
    ) -> Self {
        Self {
            npeak,
            nrms,
            nfullscale,
            impedance,
            log_0db_adjust,
            log_unit_adjust,
            log_unit: log_unit.into(),
            log_offset: log_unit_adjust - log_0db_adjust,
        }
    }

    /// Log scale offset used in dB magnitude calculations
    /// (for conversion between dBu -> dBFS, or dBm -> dBFS)
    pub fn log_offset(&self) -> f64 {
        self.log_offset
    }

    /// Load a calibration model from a JSON file
    ///
    /// All schema keys except `log_offset` are required; `log_offset` is
    /// recomputed from `log_unit_adjust - log_0dB_adjust` regardless of
    /// what the file contains.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CalibrationError> {
        let contents = fs::read_to_string(&path)?;
        let mut model: CalibrationModel = serde_json::from_str(&contents)?;
        model.log_offset = model.log_unit_adjust - model.log_0db_adjust;

        info!(
            "[Calibration] Loaded model from {:?} (unit {}, offset {} dB)",
            path.as_ref(),
            model.log_unit,
            model.log_offset
        );

        Ok(model)
    }

    /// Write the calibration model to a JSON file, preserving the schema
    pub fn store<P: AsRef<Path>>(&self, path: P) -> Result<(), CalibrationError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&path, contents)?;

        info!("[Calibration] Stored model to {:?}", path.as_ref());

        Ok(())
    }

    /// Template model for an idealized dBFS-referenced device
    ///
    /// Intended as a starting point for manual editing, not as a substitute
    /// for a real calibration run.
    pub fn template() -> Self {
        Self::new(1.0, 0.7071, 1.0, 600.0, 30.0, 30.0, "dBFS")
    }
}
