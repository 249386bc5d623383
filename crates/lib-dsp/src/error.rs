//! Error types for DSP operations.

use thiserror::Error;

/// Errors that can occur during DSP operations.
#[derive(Debug, Error)]
pub enum DspError {
    /// Super-Gaussian filter order must be even.
    #[error("filter order must be even, got {0}")]
    OddFilterOrder(u32),

    /// Pad/crop sizes do not describe a centered transform.
    #[error(
        "invalid transform sizes: n_omega={n_omega}, n_fft={n_fft} \
         (need 2 <= n_omega <= n_fft with an even difference)"
    )]
    PadMismatch { n_omega: usize, n_fft: usize },

    /// Input length mismatch.
    #[error("input length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Insufficient data for operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Normal equations could not be solved.
    #[error("singular system in least-squares solve: {0}")]
    SingularSystem(String),

    /// Least-squares fit did not converge.
    #[error("fit did not converge within {iterations} iterations")]
    FitDiverged { iterations: usize },

    /// A spatial query was made against an empty point set.
    #[error("empty point set")]
    EmptyPointSet,
}

/// Result type for DSP operations.
pub type DspResult<T> = Result<T, DspError>;
