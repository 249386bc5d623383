//! Spectral axes with explicit initialization state.
//!
//! A pulse owns three 1-D axes: time (fs), angular frequency relative to
//! the carrier (rad/fs), and wavelength (nm). The axes are recomputed by
//! resampling and interferometry steps; until a step has run, the
//! corresponding axis simply does not exist. Accessors make that state
//! explicit instead of handing out sentinel values.

use ndarray::Array1;
use thiserror::Error;

/// Error for reading an axis before the pipeline has computed it.
#[derive(Debug, Error)]
pub enum AxisError {
    #[error("time axis not initialized")]
    TimeNotInitialized,

    #[error("frequency axis not initialized")]
    OmegaNotInitialized,

    #[error("wavelength axis not initialized")]
    WavelengthNotInitialized,
}

/// The time/frequency/wavelength axis triple shared by all pulse objects.
#[derive(Clone, Debug, Default)]
pub struct SpectralAxes {
    time: Option<Array1<f64>>,
    omega: Option<Array1<f64>>,
    wavelength: Option<Array1<f64>>,
}

impl SpectralAxes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time axis in fs.
    pub fn time(&self) -> Result<&Array1<f64>, AxisError> {
        self.time.as_ref().ok_or(AxisError::TimeNotInitialized)
    }

    /// Angular frequency axis in rad/fs, relative to the carrier.
    pub fn omega(&self) -> Result<&Array1<f64>, AxisError> {
        self.omega.as_ref().ok_or(AxisError::OmegaNotInitialized)
    }

    /// Wavelength axis in nm.
    pub fn wavelength(&self) -> Result<&Array1<f64>, AxisError> {
        self.wavelength
            .as_ref()
            .ok_or(AxisError::WavelengthNotInitialized)
    }

    pub fn set_time(&mut self, axis: Array1<f64>) {
        self.time = Some(axis);
    }

    pub fn set_omega(&mut self, axis: Array1<f64>) {
        self.omega = Some(axis);
    }

    pub fn set_wavelength(&mut self, axis: Array1<f64>) {
        self.wavelength = Some(axis);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_uninitialized_axes_fail() {
        let axes = SpectralAxes::new();
        assert!(matches!(axes.time(), Err(AxisError::TimeNotInitialized)));
        assert!(matches!(axes.omega(), Err(AxisError::OmegaNotInitialized)));
        assert!(matches!(
            axes.wavelength(),
            Err(AxisError::WavelengthNotInitialized)
        ));
    }

    #[test]
    fn test_set_then_get() {
        let mut axes = SpectralAxes::new();
        axes.set_omega(array![-1.0, 0.0, 1.0]);
        let omega = axes.omega().unwrap();
        assert_eq!(omega.len(), 3);
        assert!(axes.time().is_err(), "time axis stays uninitialized");
    }
}
