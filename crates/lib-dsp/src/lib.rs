//! # lib-dsp
//!
//! Numerical primitives for the ST-Kernel pulse reconstruction workspace:
//!
//! - **Transforms**: centered FFT pairs with pad/crop between the retained
//!   band and the working grid, plus 2-D spatial transforms
//! - **Interpolation**: the 1-D kinds used for spectral resampling
//! - **Peaks**: detection and rescaling for delay search and fiber location
//! - **Filters**: super-Gaussian bandpass windows for time-domain gating
//! - **Unwrapping**: 1-D and masked per-slice 2-D phase unwrap
//! - **Fitting**: Levenberg–Marquardt least squares for the reference sphere
//! - **KD-tree**: 2-D nearest-neighbor queries for merge phase calibration

pub mod error;
pub mod fft;
pub mod filter;
pub mod fit;
pub mod interpolate;
pub mod kdtree;
pub mod peaks;
pub mod unwrap;

pub use error::{DspError, DspResult};
pub use fft::TransformKernel;
pub use kdtree::KdTree2;
