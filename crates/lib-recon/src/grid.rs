//! The spectral grid shared by both reconstruction pipelines.
//!
//! A grid fixes the carrier frequency, the retained band size `n_omega`
//! and the working FFT size `n_fft`, and owns the axis triple. Resampling
//! a detector spectrum establishes the frequency and wavelength axes;
//! interferometry establishes the conjugate time axis. Every channel of a
//! measurement must be resampled with identical parameters so they stay
//! co-registered on the same axes.

use crate::error::{ReconError, ReconResult};
use lib_dsp::interpolate::interp1d;
use lib_types::{
    relative_angular_frequency, wavelength_from_relative, InterpMethod, Nanometers, SpectralAxes,
};
use ndarray::Array1;
use std::f64::consts::PI;

/// Carrier frequency plus the retained/working grid sizes and axes.
#[derive(Clone, Debug)]
pub struct SpectralGrid {
    /// Carrier angular frequency `2πc/λ_center`, rad/fs.
    pub omega_center: f64,

    /// Retained frequency samples.
    pub n_omega: usize,

    /// Working FFT size.
    pub n_fft: usize,

    pub axes: SpectralAxes,
}

impl SpectralGrid {
    pub fn new(wavelength_center: f64, n_omega: usize, n_fft: usize) -> Self {
        Self {
            omega_center: Nanometers(wavelength_center).angular_frequency().0,
            n_omega,
            n_fft,
            axes: SpectralAxes::new(),
        }
    }

    /// Resample a detector spectrum onto the uniform frequency axis.
    ///
    /// Subtracts a flat background estimated from samples outside the
    /// requested half-width (zero when the detector covers no such
    /// samples), converts the detector wavelength axis to relative
    /// angular frequency, and interpolates onto a uniform `[-Δω, Δω]`
    /// axis of `n_omega` samples with zero fill. Negative excursions
    /// from the subtraction are kept; intensity channels clamp at their
    /// consumers.
    ///
    /// Overwrites this grid's frequency and wavelength axes.
    pub fn resample_spectrum(
        &mut self,
        detector_wavelength: &Array1<f64>,
        spectrum: &[f64],
        wavelength_center: f64,
        wavelength_width: f64,
        method: InterpMethod,
    ) -> ReconResult<Array1<f64>> {
        if detector_wavelength.len() != spectrum.len() {
            return Err(ReconError::ShapeMismatch {
                context: format!(
                    "wavelength axis has {} samples, spectrum has {}",
                    detector_wavelength.len(),
                    spectrum.len()
                ),
            });
        }

        let half_width = wavelength_width / 2.0;
        let mut background = 0.0;
        let mut n_background = 0usize;
        for (&lambda, &s) in detector_wavelength.iter().zip(spectrum.iter()) {
            if (lambda - wavelength_center).abs() > half_width {
                background += s;
                n_background += 1;
            }
        }
        if n_background > 0 {
            background /= n_background as f64;
        }

        let omega_detector: Vec<f64> = detector_wavelength
            .iter()
            .map(|&lambda| relative_angular_frequency(lambda, self.omega_center))
            .collect();
        let cleaned: Vec<f64> = spectrum.iter().map(|&s| s - background).collect();

        let delta_omega = relative_angular_frequency(
            wavelength_center - half_width,
            Nanometers(wavelength_center).angular_frequency().0,
        );
        let omega_axis = Array1::linspace(-delta_omega, delta_omega, self.n_omega);
        let wavelength_axis =
            omega_axis.mapv(|omega| wavelength_from_relative(omega, self.omega_center));

        let resampled = interp1d(
            &omega_detector,
            &cleaned,
            omega_axis.as_slice().ok_or_else(|| ReconError::ShapeMismatch {
                context: "frequency axis not contiguous".to_string(),
            })?,
            method,
            0.0,
        )?;

        self.axes.set_omega(omega_axis);
        self.axes.set_wavelength(wavelength_axis);

        Ok(Array1::from_vec(resampled))
    }

    /// Establish the time axis conjugate to the padded frequency axis.
    ///
    /// The working grid extends the retained band by `(n_fft − n_omega)/2`
    /// samples on each side, so the time step is set by the padded
    /// bandwidth: `t_k = (k − (n_fft−1)/2)/f_max` with
    /// `f_max = (ω_max + pad·|dω|)/π`.
    pub fn set_time_axis(&mut self) -> ReconResult<()> {
        let omega = self.axes.omega()?;
        let d_omega = (omega[1] - omega[0]).abs();
        let omega_max = omega.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let pad = (self.n_fft - self.n_omega) as f64 / 2.0;
        let f_max = (omega_max + pad * d_omega) / PI;

        let n_fft = self.n_fft;
        let t_axis = Array1::from_iter(
            (0..n_fft).map(|k| (k as f64 - (n_fft as f64 - 1.0) / 2.0) / f_max),
        );
        self.axes.set_time(t_axis);
        Ok(())
    }
}
