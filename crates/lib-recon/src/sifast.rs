//! Spatially resolved single-shot reconstruction over the fiber array.
//!
//! Each fiber cell samples the beam at one point and interferes it with
//! a common spherical reference wave. FTSI per cell yields a delay and
//! phase map; fitting (or loading) the reference-sphere geometry removes
//! the systematic geometric delay, leaving the pulse front and the
//! spatially resolved spectral phase of the unknown pulse.

use crate::error::{ReconError, ReconResult};
use crate::ftsi::{self, DEFAULT_FILTER_ORDER};
use crate::grid::SpectralGrid;
use crate::positions::{detect_positions, FiberPositionMap};
use crate::srsi::Srsi;
use lib_dsp::fft::TransformKernel;
use lib_dsp::fit::fit_sphere_delay;
use lib_dsp::interpolate::interp1d;
use lib_dsp::unwrap::wrap;
use lib_types::{
    AcquiredFrames, Complex64, FiberArray, FiberPositionSource, GeometrySource,
    ReconstructionParams, ReferenceGeometry, SPEED_OF_LIGHT_NM_FS,
};
use ndarray::{s, Array1, Array2, Array3};
use std::f64::consts::PI;

/// A completed spatial reconstruction.
#[derive(Clone, Debug)]
pub struct Sifast {
    pub grid: SpectralGrid,
    pub fiber: FiberArray,
    pub positions: FiberPositionMap,

    /// Resampled interference spectra, shape `(ny, nx, n_omega)`.
    pub sw_interference: Array3<f64>,

    /// Unknown spectral intensity (measured or FTSI-recovered).
    pub sw_unknown: Array3<f64>,

    /// Measured reference spectra, when acquired.
    pub sw_reference: Option<Array3<f64>>,

    /// FTSI phase before the spherical-wavefront correction.
    pub phase_diff_with_sphere: Array3<f64>,

    /// Phase difference after geometric correction, wrapped.
    pub phase_diff: Array3<f64>,

    /// Final phase (reference-compensated when an SRSI pulse was given).
    pub phase: Array3<f64>,

    /// Detected unknown-to-reference delay per cell, fs.
    pub time_interval: Array2<f64>,

    /// Arrival time of the unknown pulse per cell, fs.
    pub pulse_front: Array2<f64>,

    /// Arrival time of the spherical reference per cell, fs.
    pub pulse_front_reference: Array2<f64>,

    pub geometry: ReferenceGeometry,
    pub params: ReconstructionParams,
}

impl Sifast {
    /// Run the full spatial reconstruction pipeline.
    ///
    /// `reference` transfers an SRSI-retrieved spectral phase onto every
    /// active cell; without it the sphere-corrected phase difference is
    /// the final phase.
    pub fn reconstruct(
        frames: &AcquiredFrames,
        detector_wavelength: &Array1<f64>,
        fiber: FiberArray,
        position_source: &FiberPositionSource,
        geometry_source: &GeometrySource,
        reference: Option<&Srsi>,
        params: &ReconstructionParams,
    ) -> ReconResult<Self> {
        match Self::run(
            frames,
            detector_wavelength,
            fiber,
            position_source,
            geometry_source,
            reference,
            params,
        ) {
            Ok(sifast) => {
                tracing::info!(
                    active_cells = sifast.positions.len(),
                    n_omega = sifast.params.n_omega,
                    n_fft = sifast.params.n_fft,
                    wavelength_center = sifast.params.wavelength_center,
                    as_calibration = sifast.params.as_calibration,
                    "spatial reconstruction complete"
                );
                Ok(sifast)
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    wavelength_center = params.wavelength_center,
                    n_omega = params.n_omega,
                    n_fft = params.n_fft,
                    "spatial reconstruction failed"
                );
                Err(err)
            }
        }
    }

    fn run(
        frames: &AcquiredFrames,
        detector_wavelength: &Array1<f64>,
        fiber: FiberArray,
        position_source: &FiberPositionSource,
        geometry_source: &GeometrySource,
        reference: Option<&Srsi>,
        params: &ReconstructionParams,
    ) -> ReconResult<Self> {
        let mut params = params.clone();
        params.mode_acquire = frames.mode();
        params.as_calibration = matches!(geometry_source, GeometrySource::Fit);

        let interference = frames.interference();
        if interference.ncols() != detector_wavelength.len() {
            return Err(ReconError::ShapeMismatch {
                context: format!(
                    "frame has {} spectral channels, wavelength axis has {}",
                    interference.ncols(),
                    detector_wavelength.len()
                ),
            });
        }

        let positions = detect_positions(
            frames.detection_frame(),
            &fiber,
            position_source,
            params.gate_noise_intensity,
        )?;

        let mut grid = SpectralGrid::new(params.wavelength_center, params.n_omega, params.n_fft);
        let mut kernel = TransformKernel::new();

        let sw_interference = resample_frame(
            &mut grid,
            detector_wavelength,
            interference,
            fiber.shape(),
            &positions,
            &params,
        )?;
        let measured_unknown = match frames.unknown() {
            Some(unknown) => Some(resample_frame(
                &mut grid,
                detector_wavelength,
                unknown,
                fiber.shape(),
                &positions,
                &params,
            )?),
            None => None,
        };
        let sw_reference = match frames.reference() {
            Some(reference) => Some(resample_frame(
                &mut grid,
                detector_wavelength,
                reference,
                fiber.shape(),
                &positions,
                &params,
            )?),
            None => None,
        };

        let ftsi = ftsi::extract(
            &mut grid,
            &mut kernel,
            &sw_interference,
            &positions,
            params.delay_min,
            DEFAULT_FILTER_ORDER,
        )?;
        let phase_diff_with_sphere = ftsi.phase;
        let time_interval = ftsi.time_interval;
        // Only the unknown intensity is clamped; other channels keep
        // their background-subtracted excursions
        let sw_unknown = match measured_unknown {
            Some(measured) => measured.mapv(|v| v.max(0.0)),
            None => ftsi.sw_unknown,
        };

        let geometry = match geometry_source {
            GeometrySource::Provided(geometry) => *geometry,
            GeometrySource::Fit => {
                let x = flat(&fiber.x_grid);
                let y = flat(&fiber.y_grid);
                let delays = flat(&time_interval);
                fit_sphere_delay(&x, &y, &delays)?
            }
        };

        let (pulse_front_reference, pulse_front, phase_diff) = correct_for_sphere(
            &grid,
            &fiber,
            &geometry,
            &time_interval,
            &phase_diff_with_sphere,
            params.wavelength_center,
        )?;

        let phase = match reference {
            Some(srsi) => compensate_phase(&grid, &phase_diff, &positions, srsi, &params)?,
            None => phase_diff.clone(),
        };

        Ok(Self {
            grid,
            fiber,
            positions,
            sw_interference,
            sw_unknown,
            sw_reference,
            phase_diff_with_sphere,
            phase_diff,
            phase,
            time_interval,
            pulse_front,
            pulse_front_reference,
            geometry,
            params,
        })
    }

    /// Reconstructed 3-D time-domain field, `(ny, nx, n_fft)`.
    ///
    /// Cells without a reconstruction contribute zero.
    pub fn et(&self) -> ReconResult<Array3<Complex64>> {
        let (ny, nx) = self.fiber.shape();
        let mut ew = Array3::default((ny, nx, self.grid.n_omega));
        for r in 0..ny {
            for c in 0..nx {
                for k in 0..self.grid.n_omega {
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

fn flat(array: &Array2<f64>) -> Vec<f64> {
    array.iter().copied().collect()
}

/// Resample every active cell's detector spectrum; inactive cells stay
/// zero so the grid arrays keep the full bundle shape.
fn resample_frame(
    grid: &mut SpectralGrid,
    detector_wavelength: &Array1<f64>,
    frame: &Array2<f64>,
    bundle_shape: (usize, usize),
    positions: &FiberPositionMap,
    params: &ReconstructionParams,
) -> ReconResult<Array3<f64>> {
    let (ny, nx) = bundle_shape;
    let mut out = Array3::zeros((ny, nx, grid.n_omega));

    for (r, c, pixel) in positions.iter() {
        if pixel >= frame.nrows() {
            return Err(ReconError::ShapeMismatch {
                context: format!("pixel {pixel} outside the {}-row frame", frame.nrows()),
            });
        }
        let row: Vec<f64> = frame.slice(s![pixel, ..]).to_vec();
        let resampled = grid.resample_spectrum(
            detector_wavelength,
            &row,
            params.wavelength_center,
            params.wavelength_width,
            params.method,
        )?;
        out.slice_mut(s![r, c, ..]).assign(&resampled);
    }
    Ok(out)
}

/// Remove the spherical reference wavefront from the measured phase.
///
/// The reference reaches cell `(x, y)` later than the apex by the
/// sphere sagitta; its carrier also accumulates `2π·distance/λ_c` of
/// phase. Subtracting both converts the FTSI phase into the unknown
/// pulse's own spectral phase, wrapped to `(-π, π]`.
fn correct_for_sphere(
    grid: &SpectralGrid,
    fiber: &FiberArray,
    geometry: &ReferenceGeometry,
    time_interval: &Array2<f64>,
    phase_diff_with_sphere: &Array3<f64>,
    wavelength_center: f64,
) -> ReconResult<(Array2<f64>, Array2<f64>, Array3<f64>)> {
    let omega = grid.axes.omega()?;
    let (ny, nx, n_omega) = phase_diff_with_sphere.dim();

    let mut pulse_front_reference = Array2::zeros((ny, nx));
    let mut pulse_front = Array2::zeros((ny, nx));
    let mut phase_diff = Array3::zeros((ny, nx, n_omega));

    for r in 0..ny {
        for c in 0..nx {
            let (x, y) = (fiber.x_grid[[r, c]], fiber.y_grid[[r, c]]);
            let distance = geometry.distance_at(x, y);
            let reference_front = geometry.delay_at(x, y);
            pulse_front_reference[[r, c]] = reference_front;
            pulse_front[[r, c]] = reference_front - time_interval[[r, c]];

            // Carrier phase of the sphere, mm converted to nm
            let phase_sph = 2.0 * PI * distance / wavelength_center * 1e6;
            for k in 0..n_omega {
                phase_diff[[r, c, k]] = wrap(
                    phase_diff_with_sphere[[r, c, k]] + pulse_front[[r, c]] * omega[k] - phase_sph,
                );
            }
        }
    }
    Ok((pulse_front_reference, pulse_front, phase_diff))
}

/// Add the SRSI-retrieved reference phase, interpolated onto this grid,
/// to every active cell.
fn compensate_phase(
    grid: &SpectralGrid,
    phase_diff: &Array3<f64>,
    positions: &FiberPositionMap,
    srsi: &Srsi,
    params: &ReconstructionParams,
) -> ReconResult<Array3<f64>> {
    let omega = grid.axes.omega()?;
    let reference_omega = srsi.grid.axes.omega()?;

    let phase_reference = interp1d(
        reference_omega
            .as_slice()
            .map(|s| s.to_vec())
            .unwrap_or_else(|| reference_omega.to_vec())
            .as_slice(),
        srsi.phase
            .as_slice()
            .map(|s| s.to_vec())
            .unwrap_or_else(|| srsi.phase.to_vec())
            .as_slice(),
        omega
            .as_slice()
            .map(|s| s.to_vec())
            .unwrap_or_else(|| omega.to_vec())
            .as_slice(),
        params.method,
        0.0,
    )?;

    let mut phase = phase_diff.clone();
    for (r, c, _) in positions.iter() {
        for (k, &p_ref) in phase_reference.iter().enumerate() {
            phase[[r, c, k]] = wrap(phase[[r, c, k]] + p_ref);
        }
    }
    Ok(phase)
}

/// Carrier angular frequency for a center wavelength, rad/fs.
pub fn omega_center_of(wavelength_center: f64) -> f64 {
    2.0 * PI * SPEED_OF_LIGHT_NM_FS / wavelength_center
}
