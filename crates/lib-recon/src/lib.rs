//! # lib-recon
//!
//! Reconstruction pipelines for spatiotemporal pulse characterization:
//!
//! - **Grid**: the shared spectral grid and detector-spectrum resampling
//! - **Positions**: mapping detector pixel rows onto fiber-array cells
//! - **FTSI**: Fourier-transform spectral interferometry delay/phase
//!   extraction
//! - **SRSI**: single-point self-referenced phase retrieval
//! - **SIFAST**: the full fiber-array spatial reconstruction
//! - **Merge**: combining spatially offset scans into a composite field
//!
//! The library emits `tracing` events on pipeline completion and failure
//! but installs no subscriber; that is the embedding application's job.

pub mod error;
pub mod ftsi;
pub mod grid;
pub mod merge;
pub mod positions;
pub mod sifast;
pub mod srsi;

pub use error::{ReconError, ReconResult};
pub use ftsi::FtsiOutput;
pub use grid::SpectralGrid;
pub use merge::{CalibrationPoint, MergedField, ScanMerger};
pub use positions::FiberPositionMap;
pub use sifast::Sifast;
pub use srsi::Srsi;
