//! Mapping detector pixel rows onto fiber-array cells.
//!
//! The bundle routes fibers onto the spectrometer slit in fiber-number
//! order, so each fiber shows up as a bright band of pixel rows. A cell
//! is active only when its band's peak intensity clears the noise gate.

use crate::error::{ReconError, ReconResult};
use lib_types::{FiberArray, FiberPositionSource};
use ndarray::Array2;

/// Active fiber cells and the detector pixel row carrying each one.
///
/// Entries are parallel: `(row[i], col[i])` is the grid cell fed by
/// detector pixel row `pixel[i]`, ordered by fiber number.
#[derive(Clone, Debug, Default)]
pub struct FiberPositionMap {
    pub row: Vec<usize>,
    pub col: Vec<usize>,
    pub pixel: Vec<usize>,
}

impl FiberPositionMap {
    pub fn len(&self) -> usize {
        self.row.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row.is_empty()
    }

    /// Iterate `(row, col, pixel)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        self.row
            .iter()
            .zip(self.col.iter())
            .zip(self.pixel.iter())
            .map(|((&r, &c), &p)| (r, c, p))
    }
}

/// Detect the active fiber cells in a detection frame.
///
/// The frame's per-row maximum intensity is the detection trace; the
/// strategy decides how trace positions map to fiber numbers.
pub fn detect_positions(
    frame: &Array2<f64>,
    fiber: &FiberArray,
    source: &FiberPositionSource,
    gate_noise_intensity: f64,
) -> ReconResult<FiberPositionMap> {
    let max_intensity: Vec<f64> = frame
        .rows()
        .into_iter()
        .map(|row| row.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        .collect();

    let map = match source {
        FiberPositionSource::Calibration { pixels } => {
            from_calibration(&max_intensity, fiber, pixels, gate_noise_intensity)?
        }
        FiberPositionSource::Calculation {
            first_pixel,
            spacing,
        } => from_calculation(&max_intensity, fiber, *first_pixel, *spacing, gate_noise_intensity),
    };

    if map.is_empty() {
        return Err(ReconError::EmptyFiberMap);
    }
    Ok(map)
}

/// Calibration strategy: one externally measured pixel row per fiber
/// cell, row-major. A cell is active when its pixel clears the gate.
fn from_calibration(
    max_intensity: &[f64],
    fiber: &FiberArray,
    pixels: &[usize],
    gate: f64,
) -> ReconResult<FiberPositionMap> {
    if pixels.len() != fiber.len() {
        return Err(ReconError::ShapeMismatch {
            context: format!(
                "calibration has {} pixels for a {}-cell array",
                pixels.len(),
                fiber.len()
            ),
        });
    }

    let mut map = FiberPositionMap::default();
    for (fiber_number, &pixel) in pixels.iter().enumerate() {
        if pixel >= max_intensity.len() {
            return Err(ReconError::ShapeMismatch {
                context: format!(
                    "calibrated pixel {pixel} outside the {}-row frame",
                    max_intensity.len()
                ),
            });
        }
        if max_intensity[pixel] > gate {
            let (r, c) = fiber.cell_of(fiber_number);
            map.row.push(r);
            map.col.push(c);
            map.pixel.push(pixel);
        }
    }
    Ok(map)
}

/// Calculation strategy: peak-detect the trace, then assign each peak to
/// the nearest integer fiber number from the expected spacing, dropping
/// assignments outside the array.
fn from_calculation(
    max_intensity: &[f64],
    fiber: &FiberArray,
    first_pixel: f64,
    spacing: f64,
    gate: f64,
) -> FiberPositionMap {
    let min_distance = (spacing / 2.0).ceil() as usize;
    let peaks = lib_dsp::peaks::find_peaks(max_intensity, Some(gate), Some(min_distance));

    let max_fiber = fiber.len().saturating_sub(1);
    let mut assigned: Vec<(usize, usize)> = Vec::with_capacity(peaks.len());
    for peak in peaks {
        let number = ((peak.index as f64 - first_pixel) / spacing).round();
        if number >= 0.0 && number <= max_fiber as f64 {
            assigned.push((number as usize, peak.index));
        }
    }
    assigned.sort_by_key(|&(number, _)| number);

    let mut map = FiberPositionMap::default();
    for (number, pixel) in assigned {
        let (r, c) = fiber.cell_of(number);
        map.row.push(r);
        map.col.push(c);
        map.pixel.push(pixel);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::FiberArrayConfig;
    use ndarray::Array2;

    fn frame_with_bands(n_pixels: usize, bands: &[(usize, f64)]) -> Array2<f64> {
        let mut frame = Array2::zeros((n_pixels, 16));
        for &(pixel, intensity) in bands {
            for ch in 0..16 {
                frame[[pixel, ch]] = intensity;
            }
        }
        frame
    }

    #[test]
    fn test_calibration_gates_quiet_fibers() {
        let fiber = FiberArray::new(&FiberArrayConfig::square(2, 1.1, "test"), 0.0, 0.0);
        let frame = frame_with_bands(40, &[(5, 1.0), (15, 0.02), (25, 0.8), (35, 0.9)]);
        let source = FiberPositionSource::Calibration {
            pixels: vec![5, 15, 25, 35],
        };

        let map = detect_positions(&frame, &fiber, &source, 0.05).unwrap();
        assert_eq!(map.len(), 3);
        // Fiber 1 (cell (0, 1)) is below the gate and absent
        assert_eq!(map.row, vec![0, 1, 1]);
        assert_eq!(map.col, vec![0, 0, 1]);
        assert_eq!(map.pixel, vec![5, 25, 35]);
    }

    #[test]
    fn test_calibration_length_must_match_array() {
        let fiber = FiberArray::new(&FiberArrayConfig::square(2, 1.1, "test"), 0.0, 0.0);
        let frame = frame_with_bands(40, &[(5, 1.0)]);
        let source = FiberPositionSource::Calibration {
            pixels: vec![5, 15, 25],
        };
        assert!(matches!(
            detect_positions(&frame, &fiber, &source, 0.05),
            Err(ReconError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_calculation_assigns_by_rounding() {
        let fiber = FiberArray::new(&FiberArrayConfig::square(2, 1.1, "test"), 0.0, 0.0);
        // Expected spacing 10 starting at pixel 4; peaks slightly off-grid
        let frame = frame_with_bands(60, &[(4, 1.0), (15, 0.7), (24, 0.9), (33, 0.8)]);
        let source = FiberPositionSource::Calculation {
            first_pixel: 4.0,
            spacing: 10.0,
        };

        let map = detect_positions(&frame, &fiber, &source, 0.05).unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(map.pixel, vec![4, 15, 24, 33]);
        // Rounded assignments land on fibers 0..=3 in order
        assert_eq!(map.row, vec![0, 0, 1, 1]);
        assert_eq!(map.col, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_calculation_discards_out_of_range() {
        let fiber = FiberArray::new(&FiberArrayConfig::square(2, 1.1, "test"), 0.0, 0.0);
        // A stray peak well past the last fiber rounds to number 5, dropped
        let frame = frame_with_bands(80, &[(4, 1.0), (14, 0.7), (54, 0.9)]);
        let source = FiberPositionSource::Calculation {
            first_pixel: 4.0,
            spacing: 10.0,
        };

        let map = detect_positions(&frame, &fiber, &source, 0.05).unwrap();
        assert_eq!(map.pixel, vec![4, 14]);
    }

    #[test]
    fn test_all_quiet_is_an_error() {
        let fiber = FiberArray::new(&FiberArrayConfig::square(2, 1.1, "test"), 0.0, 0.0);
        let frame = frame_with_bands(40, &[]);
        let source = FiberPositionSource::Calibration {
            pixels: vec![5, 15, 25, 35],
        };
        assert!(matches!(
            detect_positions(&frame, &fiber, &source, 0.05),
            Err(ReconError::EmptyFiberMap)
        ));
    }
}
