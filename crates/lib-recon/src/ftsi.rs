//! Fourier-transform spectral interferometry.
//!
//! The interference spectrum of the unknown and reference pulses carries
//! a beat at their relative delay. Transforming to the time domain
//! separates the beat (AC) from the autocorrelation background (DC);
//! gating each with a super-Gaussian window and transforming back yields
//! the spectral phase difference and the unknown spectral intensity.

use crate::error::{ReconError, ReconResult};
use crate::grid::SpectralGrid;
use crate::positions::FiberPositionMap;
use lib_dsp::fft::TransformKernel;
use lib_dsp::filter::{supergaussian, width_for_delay};
use lib_dsp::peaks::{find_peaks, rescale, strongest};
use lib_dsp::DspError;
use lib_types::Complex64;
use ndarray::{s, Array1, Array2, Array3, ArrayView1};

/// Default apodization order of the DC/AC gates.
pub const DEFAULT_FILTER_ORDER: u32 = 8;

/// Minimum rescaled peak height treated as signal in the delay search.
const PEAK_HEIGHT_FLOOR: f64 = 0.01;

/// Per-cell delay map, spectral phase difference, and recovered unknown
/// spectrum. Cells where no delay could be established are NaN
/// throughout.
#[derive(Clone, Debug)]
pub struct FtsiOutput {
    /// Spectral phase difference with the delay ramp removed,
    /// shape `(ny, nx, n_omega)`.
    pub phase: Array3<f64>,

    /// Detected beat delay per cell, fs, shape `(ny, nx)`.
    pub time_interval: Array2<f64>,

    /// Recovered unknown spectral intensity, shape `(ny, nx, n_omega)`.
    pub sw_unknown: Array3<f64>,
}

/// Run FTSI over a grid of interference spectra.
///
/// Establishes the grid's time axis as a side effect. `delay_min`
/// restricts the search to times beyond the floor; unset searches the
/// positive half of the time axis.
pub fn extract(
    grid: &mut SpectralGrid,
    kernel: &mut TransformKernel,
    sw_interference: &Array3<f64>,
    positions: &FiberPositionMap,
    delay_min: Option<f64>,
    filter_order: u32,
) -> ReconResult<FtsiOutput> {
    if filter_order % 2 != 0 || filter_order == 0 {
        return Err(DspError::OddFilterOrder(filter_order).into());
    }
    let (ny, nx, n) = sw_interference.dim();
    if n != grid.n_omega {
        return Err(ReconError::ShapeMismatch {
            context: format!(
                "interference has {n} frequency samples, grid retains {}",
                grid.n_omega
            ),
        });
    }

    grid.set_time_axis()?;
    let t_axis = grid.axes.time()?.clone();
    let omega = grid.axes.omega()?.clone();
    let (n_omega, n_fft) = (grid.n_omega, grid.n_fft);

    // Search window: the causal half unless a floor is given; only
    // delays beyond the floor are eligible.
    let t_start = match delay_min {
        None => n_fft / 2,
        Some(floor) => t_axis
            .iter()
            .position(|&t| t > floor)
            .unwrap_or(n_fft),
    };

    let mut time_interval = Array2::from_elem((ny, nx), f64::NAN);
    let mut phase = Array3::from_elem((ny, nx, n_omega), f64::NAN);
    let mut sw_unknown = Array3::from_elem((ny, nx, n_omega), f64::NAN);

    let mut degraded = 0usize;
    for (r, c, _) in positions.iter() {
        let spectrum: Vec<Complex64> = sw_interference
            .slice(s![r, c, ..])
            .iter()
            .map(|&v| Complex64::new(v, 0.0))
            .collect();
        let st = kernel.ift_row(&spectrum, n_omega, n_fft)?;

        // The height floor counts against the whole trace, DC peak
        // included, so a weak beat stays noise even when it tops the
        // search window on its own
        let full: Vec<f64> = st.iter().map(|v| v.norm()).collect();
        let trace = rescale(&full);
        let trace = &trace[t_start..];
        let peaks = find_peaks(trace, Some(PEAK_HEIGHT_FLOOR), None);
        // A lone peak cannot be told apart from the autocorrelation tail
        if peaks.len() < 2 {
            degraded += 1;
            continue;
        }
        let delay = match strongest(&peaks) {
            Some(peak) => t_axis[t_start + peak.index],
            None => continue,
        };
        time_interval[[r, c]] = delay;

        let width = width_for_delay(delay, filter_order);
        let gate_ac = supergaussian(&t_axis, delay, width, filter_order)?;
        let gate_dc = supergaussian(&t_axis, 0.0, width, filter_order)?;

        let st_ac: Vec<Complex64> = st.iter().zip(gate_ac.iter()).map(|(&v, &g)| v * g).collect();
        let st_dc: Vec<Complex64> = st.iter().zip(gate_dc.iter()).map(|(&v, &g)| v * g).collect();
        let sw_ac = kernel.ft_row(&st_ac, n_omega, n_fft)?;
        let sw_dc = kernel.ft_row(&st_dc, n_omega, n_fft)?;

        for k in 0..n_omega {
            // Remove the linear delay ramp before reading the phase
            let ramp = Complex64::from_polar(1.0, omega[k] * delay);
            phase[[r, c, k]] = (sw_ac[k] * ramp).arg();

            let (dc, ac) = (sw_dc[k].norm(), sw_ac[k].norm());
            let residual = (dc - 2.0 * ac).max(0.0);
            sw_unknown[[r, c, k]] = (0.5 * ((dc + 2.0 * ac).sqrt() + residual.sqrt())).powi(2);
        }
    }

    if degraded > 0 {
        tracing::warn!(
            degraded,
            active = positions.len(),
            "cells with no resolvable beat left NaN"
        );
    }

    Ok(FtsiOutput {
        phase,
        time_interval,
        sw_unknown,
    })
}

/// Interference of two delayed replicas on the given frequency axis,
/// used by tests and the synthetic demo.
pub fn synthetic_interference(
    omega: &ArrayView1<f64>,
    delays_and_weights: &[(f64, f64)],
) -> Array1<f64> {
    omega.mapv(|w| {
        let mut s = 1.0;
        for &(tau, weight) in delays_and_weights {
            s += weight * (w * tau).cos();
        }
        s.max(0.0)
    })
}
