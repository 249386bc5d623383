//! Merging spatially offset scans into one composite field.
//!
//! Shifting the fiber bundle between acquisitions multiplies the spatial
//! sampling density. The composite grid is the sorted union of all scan
//! coordinates; per-cell channels scatter verbatim, while phase needs a
//! per-scan scalar offset because each acquisition carries its own
//! arbitrary carrier-phase origin. The offset is estimated at a single
//! calibration point from the nearest already-merged cells, so phase
//! continuity holds at that point and only there.

use crate::error::{ReconError, ReconResult};
use crate::grid::SpectralGrid;
use crate::sifast::Sifast;
use lib_dsp::fft::TransformKernel;
use lib_dsp::unwrap::unwrap_inplace;
use lib_dsp::KdTree2;
use lib_types::{Complex64, ReconstructionParams, ReferenceGeometry};
use ndarray::{s, Array1, Array2, Array3};

/// Coordinates within this distance are one composite grid line.
const COORD_TOLERANCE: f64 = 1e-9;

/// Distance floor for the inverse-distance neighbor weights.
const WEIGHT_EPSILON: f64 = 1e-10;

/// Where each scan's phase offset is anchored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CalibrationPoint {
    /// A `(row, col)` cell of the scan being merged.
    Index { row: usize, col: usize },

    /// A spatial position, snapped to the scan's own grid lines.
    Coordinate { x: f64, y: f64 },

    /// The center of the scan's own axes.
    Center,
}

/// Merges spatially offset scans; see [`ScanMerger::merge`].
#[derive(Clone, Copy, Debug)]
pub struct ScanMerger {
    /// Neighbors used for the phase-offset estimate.
    pub n_neighbors: usize,

    /// Unwrap each scan's phase per frequency slice before merging.
    pub unwrap_before_merge: bool,
}

impl Default for ScanMerger {
    fn default() -> Self {
        Self {
            n_neighbors: 3,
            unwrap_before_merge: false,
        }
    }
}

/// The composite field assembled from several scans.
///
/// Shares the first scan's spectral grid, geometry, and parameter
/// record; raw interference channels are no longer meaningful after
/// merging and are not carried.
#[derive(Clone, Debug)]
pub struct MergedField {
    pub grid: SpectralGrid,

    pub x_axis: Array1<f64>,
    pub y_axis: Array1<f64>,
    pub x_grid: Array2<f64>,
    pub y_grid: Array2<f64>,

    /// Cells holding a valid measurement, parallel vectors.
    pub row: Vec<usize>,
    pub col: Vec<usize>,

    pub sw_unknown: Array3<f64>,
    pub time_interval: Array2<f64>,
    pub pulse_front: Array2<f64>,
    pub phase: Array3<f64>,

    pub geometry: ReferenceGeometry,
    pub params: ReconstructionParams,
}

impl MergedField {
    /// Composite time-domain field; cells without data contribute zero.
    pub fn et(&self) -> ReconResult<Array3<Complex64>> {
        let (ny, nx, n_omega) = self.sw_unknown.dim();
        let mut ew = Array3::default((ny, nx, n_omega));
        for r in 0..ny {
            for c in 0..nx {
                for k in 0..n_omega {
                    let su = self.sw_unknown[[r, c, k]];
                    let p = self.phase[[r, c, k]];
                    ew[[r, c, k]] = if su.is_finite() && p.is_finite() {
                        Complex64::from_polar(su.max(0.0).sqrt(), -p)
                    } else {
                        Complex64::default()
                    };
                }
            }
        }
        let mut kernel = TransformKernel::new();
        Ok(kernel.ift(&ew, self.grid.n_omega, self.grid.n_fft)?)
    }
}

impl ScanMerger {
    /// Merge two or more scans onto their composite grid.
    ///
    /// Scans are folded in order: the first scan's phase anchors the
    /// composite, and each later scan is offset to agree with the
    /// running composite at its calibration point. Later scans overwrite
    /// earlier ones where cells coincide.
    pub fn merge(
        &self,
        pulses: &[&Sifast],
        calibration: CalibrationPoint,
    ) -> ReconResult<MergedField> {
        if pulses.len() < 2 {
            return Err(ReconError::MergeNeedsTwo(pulses.len()));
        }
        let first = pulses[0];
        for pulse in &pulses[1..] {
            if pulse.grid.n_omega != first.grid.n_omega || pulse.grid.n_fft != first.grid.n_fft {
                return Err(ReconError::GridMismatch(format!(
                    "(n_omega, n_fft) = ({}, {}) vs ({}, {})",
                    pulse.grid.n_omega, pulse.grid.n_fft, first.grid.n_omega, first.grid.n_fft
                )));
            }
        }

        let x_axis = union_axis(pulses.iter().map(|p| &p.fiber.x_axis));
        let y_axis = union_axis(pulses.iter().map(|p| &p.fiber.y_axis));
        let (ny, nx) = (y_axis.len(), x_axis.len());
        let n_omega = first.grid.n_omega;

        let mut sw_unknown = Array3::from_elem((ny, nx, n_omega), f64::NAN);
        let mut time_interval = Array2::from_elem((ny, nx), f64::NAN);
        let mut pulse_front = Array2::from_elem((ny, nx), f64::NAN);

        for pulse in pulses {
            for r in 0..pulse.fiber.number_y {
                for c in 0..pulse.fiber.number_x {
                    let yi = axis_index(&y_axis, pulse.fiber.y_axis[r]);
                    let xi = axis_index(&x_axis, pulse.fiber.x_axis[c]);
                    sw_unknown
                        .slice_mut(s![yi, xi, ..])
                        .assign(&pulse.sw_unknown.slice(s![r, c, ..]));
                    time_interval[[yi, xi]] = pulse.time_interval[[r, c]];
                    pulse_front[[yi, xi]] = pulse.pulse_front[[r, c]];
                }
            }
        }

        let mut row = Vec::new();
        let mut col = Vec::new();
        for r in 0..ny {
            for c in 0..nx {
                if time_interval[[r, c]].is_finite() {
                    row.push(r);
                    col.push(c);
                }
            }
        }

        let phase = self.merge_phase(pulses, &x_axis, &y_axis, calibration)?;

        let x_grid = Array2::from_shape_fn((ny, nx), |(_, c)| x_axis[c]);
        let y_grid = Array2::from_shape_fn((ny, nx), |(r, _)| y_axis[r]);

        tracing::info!(
            scans = pulses.len(),
            valid_cells = row.len(),
            grid = ?(ny, nx),
            "spatial scans merged"
        );

        Ok(MergedField {
            grid: first.grid.clone(),
            x_axis,
            y_axis,
            x_grid,
            y_grid,
            row,
            col,
            sw_unknown,
            time_interval,
            pulse_front,
            phase,
            geometry: first.geometry,
            params: first.params.clone(),
        })
    }

    fn merge_phase(
        &self,
        pulses: &[&Sifast],
        x_axis: &Array1<f64>,
        y_axis: &Array1<f64>,
        calibration: CalibrationPoint,
    ) -> ReconResult<Array3<f64>> {
        let first = pulses[0];
        let (ny, nx) = (y_axis.len(), x_axis.len());
        let n_omega = first.grid.n_omega;
        let center = n_omega / 2;

        let mut merged = Array3::from_elem((ny, nx, n_omega), f64::NAN);

        let phase_ref = self.prepare_phase(&first.phase, &first.sw_unknown);
        scatter_phase(&mut merged, first, &phase_ref, x_axis, y_axis, 0.0);

        for pulse in &pulses[1..] {
            let phase_prep = self.prepare_phase(&pulse.phase, &pulse.sw_unknown);
            let (calib_x, calib_y) = calibration_position(pulse, calibration)?;

            // The scan's own phase at the cell nearest the anchor
            let (r0, c0) = nearest_cell(pulse, calib_x, calib_y);
            let phase_at_calib = phase_prep[[r0, c0, center]];

            let offset = match self.composite_estimate(
                &merged, x_axis, y_axis, calib_x, calib_y, center,
            )? {
                Some(estimate) => estimate - phase_at_calib,
                None => self
                    .reference_estimate(first, &phase_ref, calib_x, calib_y, center)?
                    .map(|estimate| estimate - phase_at_calib)
                    .unwrap_or(0.0),
            };

            scatter_phase(&mut merged, pulse, &phase_prep, x_axis, y_axis, offset);
        }
        Ok(merged)
    }

    /// Optional per-slice unwrap over the cells carrying signal,
    /// traversed row-major.
    fn prepare_phase(&self, phase: &Array3<f64>, intensity: &Array3<f64>) -> Array3<f64> {
        let mut out = phase.clone();
        if !self.unwrap_before_merge {
            return out;
        }

        let (ny, nx, n) = out.dim();
        for k in 0..n {
            let mut cells = Vec::new();
            let mut values = Vec::new();
            for r in 0..ny {
                for c in 0..nx {
                    let i = intensity[[r, c, k]];
                    if i.is_finite() && i > 0.0 {
                        cells.push((r, c));
                        values.push(out[[r, c, k]]);
                    }
                }
            }
            unwrap_inplace(&mut values);
            for (&(r, c), v) in cells.iter().zip(values) {
                out[[r, c, k]] = v;
            }
        }
        out
    }

    /// Inverse-distance-weighted phase estimate from the composite's
    /// valid cells around the anchor, or `None` when there are none.
    fn composite_estimate(
        &self,
        merged: &Array3<f64>,
        x_axis: &Array1<f64>,
        y_axis: &Array1<f64>,
        calib_x: f64,
        calib_y: f64,
        center: usize,
    ) -> ReconResult<Option<f64>> {
        let mut points = Vec::new();
        let mut values = Vec::new();
        for (r, &y) in y_axis.iter().enumerate() {
            for (c, &x) in x_axis.iter().enumerate() {
                let p = merged[[r, c, center]];
                if p.is_finite() {
                    points.push([x, y]);
                    values.push(p);
                }
            }
        }
        self.weighted_estimate(&points, &values, calib_x, calib_y)
    }

    /// Fallback when the composite has no valid cell at the center bin:
    /// anchor against the reference scan's own measured cells.
    fn reference_estimate(
        &self,
        first: &Sifast,
        phase_ref: &Array3<f64>,
        calib_x: f64,
        calib_y: f64,
        center: usize,
    ) -> ReconResult<Option<f64>> {
        let mut points = Vec::new();
        let mut values = Vec::new();
        for r in 0..first.fiber.number_y {
            for c in 0..first.fiber.number_x {
                if first.time_interval[[r, c]].is_finite() {
                    points.push([first.fiber.x_grid[[r, c]], first.fiber.y_grid[[r, c]]]);
                    values.push(phase_ref[[r, c, center]]);
                }
            }
        }
        self.weighted_estimate(&points, &values, calib_x, calib_y)
    }

    fn weighted_estimate(
        &self,
        points: &[[f64; 2]],
        values: &[f64],
        calib_x: f64,
        calib_y: f64,
    ) -> ReconResult<Option<f64>> {
        if points.is_empty() {
            return Ok(None);
        }
        let tree = KdTree2::build(points)?;
        let neighbors = tree.nearest([calib_x, calib_y], self.n_neighbors);

        let mut weight_sum = 0.0;
        let mut acc = 0.0;
        for (distance, index) in neighbors {
            let w = 1.0 / (distance + WEIGHT_EPSILON);
            weight_sum += w;
            acc += w * values[index];
        }
        Ok(Some(acc / weight_sum))
    }
}

/// Sorted union of coordinate axes with tolerance-based deduplication.
fn union_axis<'a>(axes: impl Iterator<Item = &'a Array1<f64>>) -> Array1<f64> {
    let mut all: Vec<f64> = axes.flat_map(|a| a.iter().copied()).collect();
    all.sort_by(f64::total_cmp);
    all.dedup_by(|a, b| (*a - *b).abs() < COORD_TOLERANCE);
    Array1::from_vec(all)
}

/// Index of a coordinate on a union axis it is known to belong to.
fn axis_index(axis: &Array1<f64>, value: f64) -> usize {
    let slice = axis.as_slice().unwrap_or(&[]);
    slice.partition_point(|&v| v < value - COORD_TOLERANCE)
}

fn scatter_phase(
    merged: &mut Array3<f64>,
    pulse: &Sifast,
    phase: &Array3<f64>,
    x_axis: &Array1<f64>,
    y_axis: &Array1<f64>,
    offset: f64,
) {
    for r in 0..pulse.fiber.number_y {
        for c in 0..pulse.fiber.number_x {
            let yi = axis_index(y_axis, pulse.fiber.y_axis[r]);
            let xi = axis_index(x_axis, pulse.fiber.x_axis[c]);
            for k in 0..phase.dim().2 {
                merged[[yi, xi, k]] = phase[[r, c, k]] + offset;
            }
        }
    }
}

/// Resolve the calibration anchor to a position on the scan's grid.
fn calibration_position(pulse: &Sifast, calibration: CalibrationPoint) -> ReconResult<(f64, f64)> {
    match calibration {
        CalibrationPoint::Index { row, col } => {
            if row >= pulse.fiber.number_y || col >= pulse.fiber.number_x {
                return Err(ReconError::CalibrationOutsideGrid { row, col });
            }
            Ok((pulse.fiber.x_grid[[row, col]], pulse.fiber.y_grid[[row, col]]))
        }
        CalibrationPoint::Coordinate { x, y } => {
            let snap = |axis: &Array1<f64>, target: f64| {
                axis.iter()
                    .copied()
                    .min_by(|a, b| (a - target).abs().total_cmp(&(b - target).abs()))
                    .unwrap_or(target)
            };
            Ok((snap(&pulse.fiber.x_axis, x), snap(&pulse.fiber.y_axis, y)))
        }
        CalibrationPoint::Center => Ok((
            pulse.fiber.x_axis[pulse.fiber.number_x / 2],
            pulse.fiber.y_axis[pulse.fiber.number_y / 2],
        )),
    }
}

/// Cell of the scan grid closest to a position.
fn nearest_cell(pulse: &Sifast, x: f64, y: f64) -> (usize, usize) {
    let mut best = (0, 0);
    let mut best_dist = f64::INFINITY;
    for r in 0..pulse.fiber.number_y {
        for c in 0..pulse.fiber.number_x {
            let dx = pulse.fiber.x_grid[[r, c]] - x;
            let dy = pulse.fiber.y_grid[[r, c]] - y;
            let d = dx * dx + dy * dy;
            if d < best_dist {
                best_dist = d;
                best = (r, c);
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positions::FiberPositionMap;
    use lib_types::{FiberArray, FiberArrayConfig};

    fn mini_sifast(dx: f64, phase_value: f64) -> Sifast {
        let n_omega = 16;
        let fiber = FiberArray::new(&FiberArrayConfig::square(2, 1.1, "test"), dx, 0.0);
        let mut grid = SpectralGrid::new(793.0, n_omega, 32);
        grid.axes.set_omega(Array1::linspace(-0.1, 0.1, n_omega));
        grid.set_time_axis().unwrap();

        let phase = Array3::from_elem((2, 2, n_omega), phase_value);
        Sifast {
            grid,
            positions: FiberPositionMap {
                row: vec![0, 0, 1, 1],
                col: vec![0, 1, 0, 1],
                pixel: vec![0, 1, 2, 3],
            },
            sw_interference: Array3::zeros((2, 2, n_omega)),
            sw_unknown: Array3::ones((2, 2, n_omega)),
            sw_reference: None,
            phase_diff_with_sphere: phase.clone(),
            phase_diff: phase.clone(),
            phase,
            time_interval: Array2::from_elem((2, 2), 400.0),
            pulse_front: Array2::zeros((2, 2)),
            pulse_front_reference: Array2::zeros((2, 2)),
            geometry: ReferenceGeometry {
                x0: 0.0,
                y0: 0.0,
                length: 1000.0,
                tau0: 400.0,
            },
            params: ReconstructionParams {
                n_omega,
                n_fft: 32,
                ..Default::default()
            },
            fiber,
        }
    }

    #[test]
    fn test_identical_scans_merge_with_zero_offset() {
        let a = mini_sifast(0.0, 0.25);
        let b = mini_sifast(0.0, 0.25);
        let merger = ScanMerger::default();

        let merged = merger.merge(&[&a, &b], CalibrationPoint::Center).unwrap();

        // Same coordinates, so the composite grid equals the scan grid
        assert_eq!(merged.x_axis.len(), 2);
        assert_eq!(merged.y_axis.len(), 2);
        assert_eq!(merged.row.len(), 4);

        for r in 0..2 {
            for c in 0..2 {
                for k in 0..16 {
                    let p = merged.phase[[r, c, k]];
                    assert!(
                        (p - a.phase[[r, c, k]]).abs() < 1e-12,
                        "phase changed at ({r},{c},{k}): {p}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_offset_scan_is_recalibrated() {
        // Second scan sits half a pitch to the right and carries a
        // different carrier-phase origin; the merge must absorb it
        let a = mini_sifast(0.0, 0.2);
        let b = mini_sifast(0.55, 0.7);
        let merger = ScanMerger::default();

        let merged = merger.merge(&[&a, &b], CalibrationPoint::Center).unwrap();

        assert_eq!(merged.x_axis.len(), 4);
        assert_eq!(merged.y_axis.len(), 2);
        assert_eq!(merged.row.len(), 8);

        // Every cell of scan b now reads scan a's phase level
        for r in 0..2 {
            for c in 0..2 {
                let xi = axis_index(&merged.x_axis, b.fiber.x_axis[c]);
                let yi = axis_index(&merged.y_axis, b.fiber.y_axis[r]);
                let p = merged.phase[[yi, xi, 8]];
                assert!((p - 0.2).abs() < 1e-9, "recalibrated phase {p}");
            }
        }

        // Scan a's own cells are untouched
        let xi = axis_index(&merged.x_axis, a.fiber.x_axis[0]);
        let yi = axis_index(&merged.y_axis, a.fiber.y_axis[0]);
        assert!((merged.phase[[yi, xi, 8]] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_single_scan_rejected() {
        let a = mini_sifast(0.0, 0.0);
        let merger = ScanMerger::default();
        assert!(matches!(
            merger.merge(&[&a], CalibrationPoint::Center),
            Err(ReconError::MergeNeedsTwo(1))
        ));
    }

    #[test]
    fn test_grid_mismatch_rejected() {
        let a = mini_sifast(0.0, 0.0);
        let mut b = mini_sifast(0.0, 0.0);
        b.grid.n_omega = 8;
        let merger = ScanMerger::default();
        assert!(matches!(
            merger.merge(&[&a, &b], CalibrationPoint::Center),
            Err(ReconError::GridMismatch(_))
        ));
    }

    #[test]
    fn test_calibration_index_bounds() {
        let a = mini_sifast(0.0, 0.0);
        let b = mini_sifast(0.55, 0.0);
        let merger = ScanMerger::default();
        assert!(matches!(
            merger.merge(&[&a, &b], CalibrationPoint::Index { row: 5, col: 0 }),
            Err(ReconError::CalibrationOutsideGrid { row: 5, col: 0 })
        ));
    }

    #[test]
    fn test_merged_channels_scatter_verbatim() {
        let a = mini_sifast(0.0, 0.1);
        let mut b = mini_sifast(0.55, 0.1);
        b.time_interval.fill(410.0);
        let merger = ScanMerger::default();

        let merged = merger.merge(&[&a, &b], CalibrationPoint::Center).unwrap();

        let xi = axis_index(&merged.x_axis, b.fiber.x_axis[0]);
        let yi = axis_index(&merged.y_axis, b.fiber.y_axis[0]);
        assert!((merged.time_interval[[yi, xi]] - 410.0).abs() < 1e-12);

        let xi_a = axis_index(&merged.x_axis, a.fiber.x_axis[0]);
        assert!((merged.time_interval[[yi, xi_a]] - 400.0).abs() < 1e-12);
    }
}
