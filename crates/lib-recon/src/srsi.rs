//! Self-referenced spectral interferometry.
//!
//! A single-point reconstruction: the unknown pulse interferes with a
//! reference derived from itself through a third-order nonlinearity
//! (XPW). FTSI supplies the phase difference and the unknown spectrum;
//! a fixed number of refinement rounds then makes the retrieved phase
//! self-consistent with the nonlinear reference it implies.

use crate::error::ReconResult;
use crate::ftsi::{self, DEFAULT_FILTER_ORDER};
use crate::grid::SpectralGrid;
use crate::positions::FiberPositionMap;
use lib_dsp::fft::TransformKernel;
use lib_dsp::unwrap::unwrapped;
use lib_types::{AcquiredSpectra, Complex64, ReconstructionParams};
use ndarray::{s, Array1, Array3};

/// A completed self-referenced reconstruction.
#[derive(Clone, Debug)]
pub struct Srsi {
    pub grid: SpectralGrid,

    /// Unknown spectral intensity on the retained band.
    pub sw_unknown: Array1<f64>,

    /// Measured reference spectrum, when acquired.
    pub sw_reference: Option<Array1<f64>>,

    /// Retrieved spectral phase.
    pub phase: Array1<f64>,

    /// FTSI phase difference between unknown and nonlinear reference.
    pub phase_diff: Array1<f64>,

    /// Detected unknown-to-reference delay, fs.
    pub time_interval: f64,

    /// Largest absolute phase update per refinement round, for
    /// convergence diagnostics.
    pub phase_delta_history: Vec<f64>,

    pub params: ReconstructionParams,
}

impl Srsi {
    /// Reconstruct a pulse from self-referenced spectra.
    pub fn reconstruct(
        spectra: &AcquiredSpectra,
        detector_wavelength: &Array1<f64>,
        params: &ReconstructionParams,
    ) -> ReconResult<Self> {
        let mut params = params.clone();
        params.mode_acquire = spectra.mode();

        let mut grid = SpectralGrid::new(params.wavelength_center, params.n_omega, params.n_fft);
        let mut kernel = TransformKernel::new();

        let resample = |grid: &mut SpectralGrid, spectrum: &Array1<f64>| {
            grid.resample_spectrum(
                detector_wavelength,
                spectrum
                    .as_slice()
                    .map(|s| s.to_vec())
                    .unwrap_or_else(|| spectrum.to_vec())
                    .as_slice(),
                params.wavelength_center,
                params.wavelength_width,
                params.method,
            )
        };

        let sw_interference = resample(&mut grid, spectra.interference())?;
        let measured_unknown = match spectra.unknown() {
            Some(unknown) => Some(resample(&mut grid, unknown)?),
            None => None,
        };
        let sw_reference = match spectra.reference() {
            Some(reference) => Some(resample(&mut grid, reference)?),
            None => None,
        };

        let positions = FiberPositionMap {
            row: vec![0],
            col: vec![0],
            pixel: vec![0],
        };
        let mut sw = Array3::zeros((1, 1, params.n_omega));
        sw.slice_mut(s![0, 0, ..]).assign(&sw_interference);

        let ftsi = ftsi::extract(
            &mut grid,
            &mut kernel,
            &sw,
            &positions,
            params.delay_min,
            DEFAULT_FILTER_ORDER,
        )?;

        let phase_diff = ftsi.phase.slice(s![0, 0, ..]).to_owned();
        let time_interval = ftsi.time_interval[[0, 0]];
        // Only the unknown intensity is clamped; other channels keep
        // their background-subtracted excursions
        let sw_unknown = match measured_unknown {
            Some(measured) => measured.mapv(|v| v.max(0.0)),
            None => ftsi.sw_unknown.slice(s![0, 0, ..]).to_owned(),
        };

        let (phase, phase_delta_history) = refine_phase(
            &mut kernel,
            &grid,
            &sw_unknown,
            &phase_diff,
            params.n_iteration,
        )?;

        tracing::info!(
            n_iteration = params.n_iteration,
            time_interval,
            final_delta = phase_delta_history.last().copied().unwrap_or(0.0),
            "self-referenced reconstruction complete"
        );

        Ok(Self {
            grid,
            sw_unknown,
            sw_reference,
            phase,
            phase_diff,
            time_interval,
            phase_delta_history,
            params,
        })
    }

    /// Reconstructed time-domain field on the working grid.
    pub fn et(&self) -> ReconResult<Vec<Complex64>> {
        let mut kernel = TransformKernel::new();
        let ew: Vec<Complex64> = self
            .sw_unknown
            .iter()
            .zip(self.phase.iter())
            .map(|(&su, &p)| field_sample(su, p))
            .collect();
        Ok(kernel.ift_row(&ew, self.grid.n_omega, self.grid.n_fft)?)
    }

    /// Fourier-transform-limited counterpart (spectral phase zeroed).
    pub fn et_ftl(&self) -> ReconResult<Vec<Complex64>> {
        let mut kernel = TransformKernel::new();
        let ew: Vec<Complex64> = self
            .sw_unknown
            .iter()
            .map(|&su| field_sample(su, 0.0))
            .collect();
        Ok(kernel.ift_row(&ew, self.grid.n_omega, self.grid.n_fft)?)
    }
}

#[inline]
fn field_sample(intensity: f64, phase: f64) -> Complex64 {
    if intensity.is_finite() && phase.is_finite() {
        Complex64::from_polar(intensity.max(0.0).sqrt(), -phase)
    } else {
        Complex64::default()
    }
}

/// Iterative phase refinement against the third-order self-reference.
///
/// Starts from the unwrapped FTSI phase difference re-zeroed at the
/// center bin; each round synthesizes the nonlinear reference field from
/// the current estimate and replaces the estimate with the reference
/// phase minus the measured difference. Runs exactly `n_iteration − 1`
/// rounds; there is no adaptive stop.
fn refine_phase(
    kernel: &mut TransformKernel,
    grid: &SpectralGrid,
    sw_unknown: &Array1<f64>,
    phase_diff: &Array1<f64>,
    n_iteration: usize,
) -> ReconResult<(Array1<f64>, Vec<f64>)> {
    let n_omega = grid.n_omega;
    let center = n_omega / 2;

    let mut phase = Array1::from_vec(unwrapped(
        phase_diff
            .as_slice()
            .map(|s| s.to_vec())
            .unwrap_or_else(|| phase_diff.to_vec())
            .as_slice(),
    ));
    let offset = phase[center];
    phase.mapv_inplace(|p| p - offset);

    let mut history = Vec::with_capacity(n_iteration.saturating_sub(1));

    for _ in 1..n_iteration {
        let ew: Vec<Complex64> = sw_unknown
            .iter()
            .zip(phase.iter())
            .map(|(&su, &p)| field_sample(su, p))
            .collect();
        let et = kernel.ift_row(&ew, n_omega, grid.n_fft)?;

        // Third-order self-reference: E·E·E*
        let et_reference: Vec<Complex64> = et.iter().map(|&e| e * e * e.conj()).collect();
        let ew_reference = kernel.ft_row(&et_reference, n_omega, grid.n_fft)?;

        let negated: Vec<f64> = ew_reference.iter().map(|v| -v.arg()).collect();
        let mut phase_reference = Array1::from_vec(unwrapped(&negated));
        let offset = phase_reference[center];
        phase_reference.mapv_inplace(|p| p - offset);

        let mut delta = 0.0f64;
        for k in 0..n_omega {
            let d = phase_reference[k] - phase_diff[k] - phase[k];
            if d.is_finite() {
                delta = delta.max(d.abs());
            }
        }
        history.push(delta);

        phase = &phase_reference - phase_diff;
    }

    Ok((phase, history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::{AcquireMode, InterpMethod};
    use std::f64::consts::PI;

    fn gaussian_spectrum(grid: &SpectralGrid, width: f64) -> Array1<f64> {
        grid.axes
            .omega()
            .unwrap()
            .mapv(|w| (-(w / width).powi(2)).exp())
    }

    fn grid_with_axis(n_omega: usize, n_fft: usize, delta_omega: f64) -> SpectralGrid {
        let mut grid = SpectralGrid::new(793.0, n_omega, n_fft);
        grid.axes
            .set_omega(Array1::linspace(-delta_omega, delta_omega, n_omega));
        grid
    }

    #[test]
    fn test_zero_phase_is_a_fixed_point() {
        // A transform-limited Gaussian pulse: its third-order reference
        // carries the same (zero) phase, so refinement must not move
        let mut kernel = TransformKernel::new();
        let grid = grid_with_axis(256, 1024, 0.3);
        let su = gaussian_spectrum(&grid, 0.08);
        let phase_diff = Array1::zeros(256);

        let (phase, history) = refine_phase(&mut kernel, &grid, &su, &phase_diff, 10).unwrap();

        assert_eq!(history.len(), 9);
        for &p in phase.iter() {
            assert!(p.abs() < 1e-6, "phase drifted to {p}");
        }
        for &d in history.iter() {
            assert!(d < 1e-6, "update of {d} on a fixed point");
        }
    }

    #[test]
    fn test_initial_phase_rezeroed_at_center() {
        let mut kernel = TransformKernel::new();
        let grid = grid_with_axis(256, 1024, 0.3);
        let su = gaussian_spectrum(&grid, 0.08);
        // One iteration means zero refinement rounds: the result is the
        // unwrapped difference re-zeroed at the center bin
        let phase_diff = Array1::from_elem(256, 0.7);

        let (phase, history) = refine_phase(&mut kernel, &grid, &su, &phase_diff, 1).unwrap();
        assert!(history.is_empty());
        assert!(phase[128].abs() < 1e-12, "center bin not re-zeroed");
        assert!(phase.iter().all(|&p| p.abs() < 1e-12));
    }

    #[test]
    fn test_triple_mode_retains_measured_channels() {
        let n_omega = 512;
        let wavelength = Array1::linspace(700.0, 900.0, 2500);
        let omega_center = 2.0 * PI * lib_types::SPEED_OF_LIGHT_NM_FS / 793.0;
        let envelope = |l: f64| (-(((l - 793.0) / 35.0) as f64).powi(2)).exp();

        let interference = wavelength.mapv(|l| {
            let w = 2.0 * PI * lib_types::SPEED_OF_LIGHT_NM_FS / l - omega_center;
            envelope(l) * (1.4 + 0.9 * (w * 420.0).cos() + 0.3 * (w * 260.0).cos()) + 0.2
        });
        let unknown = wavelength.mapv(envelope);
        let reference = wavelength.mapv(|l| 0.5 * envelope(l));

        let spectra = AcquiredSpectra::Triple {
            interference,
            unknown,
            reference,
        };
        let params = ReconstructionParams {
            n_omega,
            n_fft: 2048,
            n_iteration: 3,
            ..Default::default()
        };

        let srsi = Srsi::reconstruct(&spectra, &wavelength, &params).unwrap();

        assert_eq!(srsi.params.mode_acquire, AcquireMode::Triple);
        assert!(srsi.sw_unknown.iter().all(|&v| v >= 0.0));

        let sw_reference = srsi.sw_reference.as_ref().unwrap();
        assert_eq!(sw_reference.len(), n_omega);
        // Proportional inputs keep their 2:1 ratio through resampling
        assert!(
            (2.0 * sw_reference[n_omega / 2] - srsi.sw_unknown[n_omega / 2]).abs() < 1e-9,
            "reference {} vs unknown {}",
            sw_reference[n_omega / 2],
            srsi.sw_unknown[n_omega / 2]
        );
    }

    #[test]
    fn test_full_reconstruction_from_synthetic_beat() {
        let n_omega = 512;
        let wavelength = Array1::linspace(700.0, 900.0, 2500);
        let omega_center = 2.0 * PI * lib_types::SPEED_OF_LIGHT_NM_FS / 793.0;

        let tau0 = 420.0;
        let tau1 = 260.0;
        let interference = wavelength.mapv(|l| {
            let w = 2.0 * PI * lib_types::SPEED_OF_LIGHT_NM_FS / l - omega_center;
            let envelope = (-(((l - 793.0) / 35.0) as f64).powi(2)).exp();
            envelope * (1.4 + 0.9 * (w * tau0).cos() + 0.3 * (w * tau1).cos()) + 0.2
        });

        let spectra = AcquiredSpectra::Single { interference };
        let params = ReconstructionParams {
            wavelength_center: 793.0,
            wavelength_width: 100.0,
            n_omega,
            n_fft: 2048,
            n_iteration: 5,
            method: InterpMethod::Linear,
            ..Default::default()
        };

        let srsi = Srsi::reconstruct(&spectra, &wavelength, &params).unwrap();

        let t = srsi.grid.axes.time().unwrap();
        let dt = (t[1] - t[0]).abs();
        assert!(
            (srsi.time_interval - tau0).abs() <= dt,
            "delay {} vs {tau0}",
            srsi.time_interval
        );
        assert_eq!(srsi.phase_delta_history.len(), 4);
        assert_eq!(srsi.phase.len(), n_omega);
        // The measured phase difference of this real-valued beat is small,
        // so the retrieved phase stays small around the carrier
        assert!(srsi.phase[n_omega / 2].abs() < 0.5);

        let et = srsi.et().unwrap();
        assert_eq!(et.len(), 2048);
        assert!(et.iter().all(|v| v.norm().is_finite()));

        // The transform-limited field concentrates at t = 0
        let et_ftl = srsi.et_ftl().unwrap();
        let peak_idx = et_ftl
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .map(|(i, _)| i)
            .unwrap();
        assert!((t[peak_idx]).abs() < 20.0 * dt, "FTL peak at {} fs", t[peak_idx]);
    }
}
