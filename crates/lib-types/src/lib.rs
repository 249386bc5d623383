//! # lib-types
//!
//! Core type definitions for the ST-Kernel pulse reconstruction workspace.
//!
//! This crate provides foundational types used throughout the workspace:
//! - Physical units and optical constants
//! - Spectral axes (time / angular frequency / wavelength) with explicit
//!   initialization state
//! - Fiber-array geometry and the configuration registry
//! - Reference-sphere wavefront geometry
//! - Acquisition-mode and interpolation-method enumerations
//! - The per-reconstruction parameter record used for provenance

pub mod axes;
pub mod config;
pub mod fiber;
pub mod geometry;
pub mod params;
pub mod units;

pub use axes::*;
pub use config::*;
pub use fiber::*;
pub use geometry::*;
pub use params::*;
pub use units::*;

/// Re-export num_complex for convenience
pub use num_complex::Complex64;
