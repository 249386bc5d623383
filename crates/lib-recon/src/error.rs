//! Error types for the reconstruction pipelines.

use lib_dsp::DspError;
use lib_types::AxisError;
use thiserror::Error;

/// Errors that can occur while running a reconstruction.
#[derive(Debug, Error)]
pub enum ReconError {
    #[error(transparent)]
    Dsp(#[from] DspError),

    #[error(transparent)]
    Axis(#[from] AxisError),

    /// No fiber cell passed the noise gate.
    #[error("no fiber cell passed the noise gate")]
    EmptyFiberMap,

    /// Input arrays do not agree on shape.
    #[error("array shape mismatch: {context}")]
    ShapeMismatch { context: String },

    /// Merging requires at least two scans.
    #[error("need at least two scans to merge, got {0}")]
    MergeNeedsTwo(usize),

    /// Scans passed to the merger disagree on the spectral grid.
    #[error("scans disagree on the spectral grid: {0}")]
    GridMismatch(String),

    /// A calibration index addressed a cell outside the scan grid.
    #[error("calibration index ({row}, {col}) outside the scan grid")]
    CalibrationOutsideGrid { row: usize, col: usize },
}

/// Result type for reconstruction operations.
pub type ReconResult<T> = Result<T, ReconError>;
