//! Per-reconstruction parameter record.
//!
//! Every pipeline carries the full set of scalar inputs it was run with,
//! verbatim, on its output object. External collaborators log this record
//! for provenance and can reproduce a reconstruction exactly from a
//! logged entry.

use crate::config::{AcquireMode, InterpMethod};
use serde::{Deserialize, Serialize};

/// Scalar inputs of a reconstruction run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionParams {
    /// Center wavelength of the retained band, nm.
    pub wavelength_center: f64,

    /// Full width of the retained band, nm.
    pub wavelength_width: f64,

    /// Retained frequency samples.
    pub n_omega: usize,

    /// Working FFT size (`>= n_omega`, even difference).
    pub n_fft: usize,

    /// Minimum peak intensity for a fiber trace to count as signal.
    pub gate_noise_intensity: f64,

    /// Optional floor on the FTSI delay search, fs.
    pub delay_min: Option<f64>,

    /// Interpolation kind for resampling and phase transfer.
    pub method: InterpMethod,

    /// Phase-retrieval iteration count (self-referenced pipeline).
    pub n_iteration: usize,

    /// Which channels were acquired.
    pub mode_acquire: AcquireMode,

    /// Fiber-array id this run was configured with.
    pub fiber_array_id: String,

    /// Fiber-array offsets, mm.
    pub dx: f64,
    pub dy: f64,

    /// Whether this instance fit its own reference geometry.
    pub as_calibration: bool,
}

impl Default for ReconstructionParams {
    fn default() -> Self {
        Self {
            wavelength_center: 793.0,
            wavelength_width: 100.0,
            n_omega: 2048,
            n_fft: 4096,
            gate_noise_intensity: 0.05,
            delay_min: None,
            method: InterpMethod::Linear,
            n_iteration: 10,
            mode_acquire: AcquireMode::Single,
            fiber_array_id: "default_14x14".to_string(),
            dx: 0.0,
            dy: 0.0,
            as_calibration: false,
        }
    }
}
