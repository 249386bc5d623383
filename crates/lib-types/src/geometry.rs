//! Reference-sphere wavefront geometry.
//!
//! The reference arm reaches the fiber array as a spherical wave from a
//! virtual source at `(x0, y0)` a distance `L` behind the array plane.
//! Fitting this model to a measured delay map removes the systematic
//! geometric delay so only the unknown pulse front remains.

use crate::units::SPEED_OF_LIGHT_MM_FS;
use serde::{Deserialize, Serialize};

/// Spherical-wavefront timing model `(x0, y0, L, tau0)`.
///
/// All four parameters are required; there is no partially-fit state.
/// Coordinates and `length` are in mm, `tau0` in fs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceGeometry {
    /// Source x position, mm.
    pub x0: f64,

    /// Source y position, mm.
    pub y0: f64,

    /// Source distance from the array plane, mm.
    pub length: f64,

    /// Delay offset at the sphere apex, fs.
    pub tau0: f64,
}

impl ReferenceGeometry {
    /// Source-to-cell distance in mm.
    #[inline]
    pub fn distance_at(&self, x: f64, y: f64) -> f64 {
        ((x - self.x0).powi(2) + (y - self.y0).powi(2) + self.length.powi(2)).sqrt()
    }

    /// Reference arrival time at a cell, in fs:
    /// `(distance − L)/c + tau0`.
    #[inline]
    pub fn delay_at(&self, x: f64, y: f64) -> f64 {
        (self.distance_at(x, y) - self.length) / SPEED_OF_LIGHT_MM_FS + self.tau0
    }
}
