//! Fiber-array geometry and the configuration registry.
//!
//! The fiber bundle samples the beam on a rectangular grid. Each cell is
//! addressed by `(row, col)` and carries a row-major fiber number that
//! matches the physical routing of fibers onto the spectrometer slit.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Geometric description of a rectangular fiber bundle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FiberArrayConfig {
    /// Number of fibers along x.
    pub nx: usize,

    /// Number of fibers along y.
    pub ny: usize,

    /// Fiber pitch along x, in mm.
    pub spacing_x: f64,

    /// Fiber pitch along y, in mm.
    pub spacing_y: f64,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

impl FiberArrayConfig {
    /// Square bundle with a single pitch.
    pub fn square(n: usize, spacing: f64, description: &str) -> Self {
        Self {
            nx: n,
            ny: n,
            spacing_x: spacing,
            spacing_y: spacing,
            description: description.to_string(),
        }
    }
}

impl Default for FiberArrayConfig {
    fn default() -> Self {
        Self::square(14, 1.1, "Default 14x14 rectangular array")
    }
}

/// Realized fiber-array grid. Immutable after construction.
#[derive(Clone, Debug)]
pub struct FiberArray {
    /// x coordinates of the columns, in mm.
    pub x_axis: Array1<f64>,

    /// y coordinates of the rows, in mm.
    pub y_axis: Array1<f64>,

    /// x coordinate of every cell, shape `(ny, nx)`.
    pub x_grid: Array2<f64>,

    /// y coordinate of every cell, shape `(ny, nx)`.
    pub y_grid: Array2<f64>,

    /// Row-major fiber number of every cell, shape `(ny, nx)`.
    pub fiber_number: Array2<usize>,

    pub number_x: usize,
    pub number_y: usize,
}

impl FiberArray {
    /// Build the grid for a configuration, shifted by `(dx, dy)` mm.
    ///
    /// Axes are centered on the bundle: `(i − (n−1)/2)·spacing + offset`.
    pub fn new(config: &FiberArrayConfig, dx: f64, dy: f64) -> Self {
        let axis = |n: usize, spacing: f64, offset: f64| {
            Array1::from_iter(
                (0..n).map(|i| (i as f64 - (n as f64 - 1.0) / 2.0) * spacing + offset),
            )
        };
        let x_axis = axis(config.nx, config.spacing_x, dx);
        let y_axis = axis(config.ny, config.spacing_y, dy);

        let x_grid = Array2::from_shape_fn((config.ny, config.nx), |(_, c)| x_axis[c]);
        let y_grid = Array2::from_shape_fn((config.ny, config.nx), |(r, _)| y_axis[r]);
        let fiber_number =
            Array2::from_shape_fn((config.ny, config.nx), |(r, c)| r * config.nx + c);

        Self {
            x_axis,
            y_axis,
            x_grid,
            y_grid,
            fiber_number,
            number_x: config.nx,
            number_y: config.ny,
        }
    }

    /// Total number of fiber cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.number_x * self.number_y
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grid shape `(ny, nx)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.number_y, self.number_x)
    }

    /// `(row, col)` of a row-major fiber number.
    #[inline]
    pub fn cell_of(&self, fiber: usize) -> (usize, usize) {
        (fiber / self.number_x, fiber % self.number_x)
    }
}

/// Explicit registry of named fiber-array configurations.
///
/// Owned by whoever assembles a reconstruction; pipelines receive a
/// resolved [`FiberArray`] value, never a name to look up, so a
/// reconstruction is reproducible from its inputs alone.
#[derive(Clone, Debug)]
pub struct FiberArrayRegistry {
    arrays: BTreeMap<String, FiberArrayConfig>,
}

impl FiberArrayRegistry {
    /// Registry seeded with the default 14x14 bundle.
    pub fn new() -> Self {
        let mut arrays = BTreeMap::new();
        arrays.insert("default_14x14".to_string(), FiberArrayConfig::default());
        Self { arrays }
    }

    pub fn register(&mut self, id: &str, config: FiberArrayConfig) {
        self.arrays.insert(id.to_string(), config);
    }

    pub fn config(&self, id: &str) -> Option<&FiberArrayConfig> {
        self.arrays.get(id)
    }

    /// Realize a named array with offsets applied.
    pub fn resolve(&self, id: &str, dx: f64, dy: f64) -> Option<FiberArray> {
        self.arrays.get(id).map(|c| FiberArray::new(c, dx, dy))
    }

    /// Registered ids with their descriptions.
    pub fn list(&self) -> Vec<(&str, &str)> {
        self.arrays
            .iter()
            .map(|(id, c)| (id.as_str(), c.description.as_str()))
            .collect()
    }
}

impl Default for FiberArrayRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_14x14_geometry() {
        let array = FiberArray::new(&FiberArrayConfig::default(), 0.0, 0.0);

        assert_eq!(array.shape(), (14, 14));
        // First column sits 13/2 pitches left of center
        assert!((array.x_axis[0] - (-7.15)).abs() < 1e-12);
        assert!((array.x_axis[13] - 7.15).abs() < 1e-12);
        assert_eq!(array.fiber_number[[0, 0]], 0);
        assert_eq!(array.fiber_number[[13, 13]], 195);
        assert_eq!(array.cell_of(195), (13, 13));
    }

    #[test]
    fn test_offsets_shift_axes() {
        let array = FiberArray::new(&FiberArrayConfig::default(), 2.0, -1.0);
        assert!((array.x_axis[0] - (-5.15)).abs() < 1e-12);
        assert!((array.y_axis[0] - (-8.15)).abs() < 1e-12);
        assert!((array.x_grid[[3, 0]] - array.x_axis[0]).abs() < 1e-12);
        assert!((array.y_grid[[3, 0]] - array.y_axis[3]).abs() < 1e-12);
    }

    #[test]
    fn test_registry_resolve() {
        let mut registry = FiberArrayRegistry::new();
        assert!(registry.config("default_14x14").is_some());
        assert!(registry.resolve("missing", 0.0, 0.0).is_none());

        registry.register("dense_8x8", FiberArrayConfig::square(8, 0.5, "test bundle"));
        let array = registry.resolve("dense_8x8", 0.0, 0.0).unwrap();
        assert_eq!(array.len(), 64);
        assert_eq!(registry.list().len(), 2);
    }
}
